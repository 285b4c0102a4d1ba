// Common test utilities shared by the integration tests

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;

use mooon::application::config::Config;
use mooon::application::server::{HeaderServer, ShutdownHandle};
use mooon::http::HttpEvent;

/// Event sink that records every callback as a readable line
#[allow(dead_code)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Recorder {
    pub calls: Vec<String>,
    pub errors: usize,
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl HttpEvent for Recorder {
    fn reset(&mut self) {
        self.calls.clear();
        self.errors = 0;
    }

    fn on_head_end(&mut self) -> bool {
        self.calls.push("head_end".to_string());
        true
    }

    fn on_error(&mut self, message: &str) {
        self.calls.push(format!("error({})", message));
        self.errors += 1;
    }

    fn on_method(&mut self, method: &[u8]) -> bool {
        self.calls.push(format!("method({})", text(method)));
        true
    }

    fn on_url(&mut self, url: &[u8]) -> bool {
        self.calls.push(format!("url({})", text(url)));
        true
    }

    fn on_version(&mut self, version: &[u8]) -> bool {
        self.calls.push(format!("version({})", text(version)));
        true
    }

    fn on_code(&mut self, code: &[u8]) -> bool {
        self.calls.push(format!("code({})", text(code)));
        true
    }

    fn on_describe(&mut self, describe: &[u8]) -> bool {
        self.calls.push(format!("describe({})", text(describe)));
        true
    }

    fn on_name_value_pair(&mut self, name: &[u8], value: &[u8]) -> bool {
        self.calls
            .push(format!("pair({}, {})", text(name), text(value)));
        true
    }
}

/// Config bound to an ephemeral loopback port with a short wait timeout
#[allow(dead_code)]
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.server.listen = "127.0.0.1:0".parse().unwrap();
    config.reactor.wait_timeout_ms = 20;
    config
}

/// Start a header server in a background thread
#[allow(dead_code)]
pub fn start_test_server(
    config: Config,
) -> (SocketAddr, ShutdownHandle, thread::JoinHandle<mooon::Result<()>>) {
    let mut server = HeaderServer::bind(&config).unwrap();
    let addr = server.local_addr();
    let shutdown = server.shutdown_handle().unwrap();
    let handle = thread::spawn(move || server.run());
    (addr, shutdown, handle)
}

/// Send raw bytes and read until the server closes the connection
#[allow(dead_code)]
pub fn send_request(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).expect("Failed to connect to server");
    stream.write_all(request).unwrap();
    stream.flush().unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}
