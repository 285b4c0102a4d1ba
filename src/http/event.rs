/// Receives the fields of an HTTP header as the parser finds them.
///
/// Every slice borrows from the buffer passed to `parse()` (or from the
/// parser's carry buffer when a field spanned two calls) and is only valid
/// during the callback; copy whatever must outlive it. Returning `false`
/// rejects the field and fails the parse.
pub trait HttpEvent {
    /// Called by the parser's `reset()`.
    fn reset(&mut self) {}

    fn on_head_end(&mut self) -> bool {
        true
    }

    fn on_error(&mut self, _message: &str) {}

    fn on_method(&mut self, _method: &[u8]) -> bool {
        true
    }

    fn on_url(&mut self, _url: &[u8]) -> bool {
        true
    }

    /// Protocol version, such as `HTTP/1.1`.
    fn on_version(&mut self, _version: &[u8]) -> bool {
        true
    }

    /// Response status code, such as `200`.
    fn on_code(&mut self, _code: &[u8]) -> bool {
        true
    }

    /// Response reason phrase, such as `OK`.
    fn on_describe(&mut self, _describe: &[u8]) -> bool {
        true
    }

    fn on_name_value_pair(&mut self, _name: &[u8], _value: &[u8]) -> bool {
        true
    }
}

impl<E: HttpEvent + ?Sized> HttpEvent for &mut E {
    fn reset(&mut self) {
        (**self).reset()
    }

    fn on_head_end(&mut self) -> bool {
        (**self).on_head_end()
    }

    fn on_error(&mut self, message: &str) {
        (**self).on_error(message)
    }

    fn on_method(&mut self, method: &[u8]) -> bool {
        (**self).on_method(method)
    }

    fn on_url(&mut self, url: &[u8]) -> bool {
        (**self).on_url(url)
    }

    fn on_version(&mut self, version: &[u8]) -> bool {
        (**self).on_version(version)
    }

    fn on_code(&mut self, code: &[u8]) -> bool {
        (**self).on_code(code)
    }

    fn on_describe(&mut self, describe: &[u8]) -> bool {
        (**self).on_describe(describe)
    }

    fn on_name_value_pair(&mut self, name: &[u8], value: &[u8]) -> bool {
        (**self).on_name_value_pair(name, value)
    }
}

impl<E: HttpEvent + ?Sized> HttpEvent for Box<E> {
    fn reset(&mut self) {
        (**self).reset()
    }

    fn on_head_end(&mut self) -> bool {
        (**self).on_head_end()
    }

    fn on_error(&mut self, message: &str) {
        (**self).on_error(message)
    }

    fn on_method(&mut self, method: &[u8]) -> bool {
        (**self).on_method(method)
    }

    fn on_url(&mut self, url: &[u8]) -> bool {
        (**self).on_url(url)
    }

    fn on_version(&mut self, version: &[u8]) -> bool {
        (**self).on_version(version)
    }

    fn on_code(&mut self, code: &[u8]) -> bool {
        (**self).on_code(code)
    }

    fn on_describe(&mut self, describe: &[u8]) -> bool {
        (**self).on_describe(describe)
    }

    fn on_name_value_pair(&mut self, name: &[u8], value: &[u8]) -> bool {
        (**self).on_name_value_pair(name, value)
    }
}

/// A sink that accepts everything and records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEvent;

impl HttpEvent for NullEvent {}
