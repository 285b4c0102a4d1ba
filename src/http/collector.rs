use crate::http::event::HttpEvent;
use std::fmt;

const CONTENT_LENGTH: &str = "Content-Length";

/// An [`HttpEvent`] that copies every field into owned strings.
///
/// Values that are not UTF-8 are kept lossily. Header order and duplicates
/// are preserved, except that a second or non-numeric `Content-Length` is
/// rejected, which fails the parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderCollector {
    method: Option<String>,
    url: Option<String>,
    version: Option<String>,
    code: Option<String>,
    describe: Option<String>,
    headers: Vec<(String, String)>,
    content_length: Option<u64>,
    head_ended: bool,
    error: Option<String>,
}

impl HeaderCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Raw status code text of a response
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Numeric status code, if the code field is a valid one
    pub fn status_code(&self) -> Option<u16> {
        self.code.as_deref()?.parse().ok()
    }

    pub fn describe(&self) -> Option<&str> {
        self.describe.as_deref()
    }

    /// All headers in arrival order
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Get the first header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Whether the blank line ending the head was seen
    pub fn head_ended(&self) -> bool {
        self.head_ended
    }

    /// The message of the last failed parse
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn copy(value: &[u8]) -> Option<String> {
        Some(String::from_utf8_lossy(value).into_owned())
    }
}

impl HttpEvent for HeaderCollector {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn on_head_end(&mut self) -> bool {
        self.head_ended = true;
        true
    }

    fn on_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    fn on_method(&mut self, method: &[u8]) -> bool {
        self.method = Self::copy(method);
        true
    }

    fn on_url(&mut self, url: &[u8]) -> bool {
        self.url = Self::copy(url);
        true
    }

    fn on_version(&mut self, version: &[u8]) -> bool {
        self.version = Self::copy(version);
        true
    }

    fn on_code(&mut self, code: &[u8]) -> bool {
        self.code = Self::copy(code);
        true
    }

    fn on_describe(&mut self, describe: &[u8]) -> bool {
        self.describe = Self::copy(describe);
        true
    }

    fn on_name_value_pair(&mut self, name: &[u8], value: &[u8]) -> bool {
        let name = String::from_utf8_lossy(name).into_owned();
        let value = String::from_utf8_lossy(value).into_owned();

        if name.eq_ignore_ascii_case(CONTENT_LENGTH) {
            if self.content_length.is_some() {
                return false;
            }
            match value.trim().parse::<u64>() {
                Ok(length) => self.content_length = Some(length),
                Err(_) => return false,
            }
        }

        self.headers.push((name, value));
        true
    }
}

impl fmt::Display for HeaderCollector {
    /// One line per field, in the form used by the header echo server.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start_line = [
            ("method", &self.method),
            ("url", &self.url),
            ("version", &self.version),
            ("code", &self.code),
            ("describe", &self.describe),
        ];
        for (label, value) in start_line {
            if let Some(value) = value {
                writeln!(f, "{}: {}", label, value)?;
            }
        }
        for (name, value) in &self.headers {
            writeln!(f, "header: {}={}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::parser::{HttpParser, MessageKind, Progress};

    #[test]
    fn test_collects_request() {
        let mut collector = HeaderCollector::new();
        let mut parser = HttpParser::new(MessageKind::Request);
        parser.set_http_event(&mut collector);
        let progress = parser
            .parse(b"POST /submit HTTP/1.0\r\nHost: x\r\ncontent-length: 12\r\n\r\n")
            .unwrap();
        assert_eq!(progress, Progress::Finish);
        drop(parser);

        assert_eq!(collector.method(), Some("POST"));
        assert_eq!(collector.url(), Some("/submit"));
        assert_eq!(collector.version(), Some("HTTP/1.0"));
        assert_eq!(collector.header("HOST"), Some("x"));
        assert_eq!(collector.content_length(), Some(12));
        assert!(collector.head_ended());
    }

    #[test]
    fn test_collects_response() {
        let mut parser = HttpParser::new(MessageKind::Response);
        parser.set_http_event(HeaderCollector::new());
        parser
            .parse(b"HTTP/1.1 404 Not Found\r\nServer: mooon\r\n\r\n")
            .unwrap();

        let collector = parser.http_event().unwrap();
        assert_eq!(collector.status_code(), Some(404));
        assert_eq!(collector.describe(), Some("Not Found"));
        assert_eq!(collector.headers().len(), 1);
    }

    #[test]
    fn test_duplicate_content_length_fails_parse() {
        let mut parser = HttpParser::new(MessageKind::Request);
        parser.set_http_event(HeaderCollector::new());
        let result = parser.parse(
            b"GET / HTTP/1.1\r\nContent-Length: 1\r\nContent-Length: 2\r\n\r\n",
        );
        assert!(result.is_err());
        assert_eq!(
            parser.http_event().unwrap().error(),
            Some("NV pair rejected by event handler")
        );
    }

    #[test]
    fn test_invalid_content_length_fails_parse() {
        let mut parser = HttpParser::new(MessageKind::Request);
        parser.set_http_event(HeaderCollector::new());
        assert!(parser
            .parse(b"GET / HTTP/1.1\r\nContent-Length: ten\r\n\r\n")
            .is_err());
    }

    #[test]
    fn test_display_lists_fields() {
        let mut parser = HttpParser::new(MessageKind::Request);
        parser.set_http_event(HeaderCollector::new());
        parser.parse(b"GET /a HTTP/1.1\r\nA: b\r\n\r\n").unwrap();
        let text = parser.http_event().unwrap().to_string();
        assert_eq!(text, "method: GET\nurl: /a\nversion: HTTP/1.1\nheader: A=b\n");
    }
}
