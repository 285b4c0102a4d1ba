// Header server tests - end-to-end requests over loopback TCP

mod common;

use common::{create_test_config, send_request, start_test_server};
use std::io::Write;
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

#[test]
fn test_request_head_is_echoed() {
    let (addr, shutdown, handle) = start_test_server(create_test_config());

    let response = send_request(
        addr,
        b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nX-Thing: a:b:c\r\n\r\n",
    );
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("method: GET\n"));
    assert!(response.contains("url: /index.html\n"));
    assert!(response.contains("header: X-Thing=a:b:c\n"));

    shutdown.stop().unwrap();
    handle.join().unwrap().unwrap();
}

#[test]
fn test_malformed_head_gets_400() {
    let (addr, shutdown, handle) = start_test_server(create_test_config());

    let response = send_request(addr, b"GET /index.html HTTP/1.1\rX\n\r\n");
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(response.contains("NV pair not started with"));

    shutdown.stop().unwrap();
    handle.join().unwrap().unwrap();
}

#[test]
fn test_head_split_across_writes() {
    let mut config = create_test_config();
    config.server.recv_buffer_size = 4;
    let (addr, shutdown, handle) = start_test_server(config);

    let mut stream = TcpStream::connect(addr).unwrap();
    for part in [&b"GET /sl"[..], b"ow HTTP/1.1\r\nHo", b"st: a\r\n", b"\r\n"] {
        stream.write_all(part).unwrap();
        thread::sleep(Duration::from_millis(10));
    }
    let mut response = String::new();
    std::io::Read::read_to_string(&mut stream, &mut response).unwrap();
    assert!(response.contains("url: /slow\n"));
    assert!(response.contains("header: Host=a\n"));

    shutdown.stop().unwrap();
    handle.join().unwrap().unwrap();
}

#[test]
fn test_concurrent_clients() {
    let (addr, shutdown, handle) = start_test_server(create_test_config());

    let clients: Vec<_> = (0..16)
        .map(|i| {
            thread::spawn(move || {
                let request = format!("GET /client/{} HTTP/1.1\r\nHost: t\r\n\r\n", i);
                let response = send_request(addr, request.as_bytes());
                response.contains(&format!("url: /client/{}\n", i))
            })
        })
        .collect();

    let successful = clients
        .into_iter()
        .map(|client| client.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successful, 16);

    shutdown.stop().unwrap();
    handle.join().unwrap().unwrap();
}
