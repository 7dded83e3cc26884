#![allow(dead_code)]

use fiberserve::router::Router;
use fiberserve::sandbox::{HandlerRegistry, Sandbox};
use fiberserve::server::{AppService, HttpServer, ServerHandle};
use fiberserve::session::{SessionStore, SharedState};
use fiberserve::static_files::StaticFiles;
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

/// A running server plus handles on its shared state and document root.
pub struct TestServer {
    pub handle: ServerHandle,
    pub addr: SocketAddr,
    pub sessions: Arc<SessionStore>,
    pub shared: Arc<SharedState>,
    /// Outer directory; the served root is `<outer>/root`.
    pub dir: tempfile::TempDir,
}

impl TestServer {
    pub fn stop(self) {
        self.handle.stop();
    }
}

/// Start a server on an ephemeral port with a seeded document root:
/// `index.html`, `hello.txt`, and a `secret.txt` one level ABOVE the root.
pub fn start_service(configure: impl FnOnce(&mut HandlerRegistry)) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("index.html"), "<h1>home</h1>").unwrap();
    fs::write(root.join("hello.txt"), "Hello\n").unwrap();
    fs::write(dir.path().join("secret.txt"), "top secret").unwrap();

    let mut handlers = HandlerRegistry::new();
    configure(&mut handlers);

    let sessions = Arc::new(SessionStore::new());
    let shared = Arc::new(SharedState::new());
    let service = AppService::new(
        Router::new(handlers, StaticFiles::new(&root).unwrap()),
        Sandbox::new(Arc::clone(&sessions), Arc::clone(&shared)),
    );
    let handle = HttpServer(service).start("127.0.0.1:0").unwrap();
    handle.wait_ready().unwrap();
    let addr = handle.local_addr();
    TestServer {
        handle,
        addr,
        sessions,
        shared,
        dir,
    }
}

/// Write raw bytes to the server and collect the full response.
pub fn send_request(addr: &SocketAddr, req: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(req.as_bytes()).unwrap();
    // half-close so the server sees EOF even for incomplete requests
    let _ = stream.shutdown(std::net::Shutdown::Write);
    stream
        .set_read_timeout(Some(Duration::from_millis(2000)))
        .unwrap();
    let mut buf = Vec::new();
    loop {
        let mut tmp = [0u8; 1024];
        match stream.read(&mut tmp) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&tmp[..n]),
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                break
            }
            Err(e) => panic!("read error: {e:?}"),
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

pub fn get(addr: &SocketAddr, path: &str) -> String {
    send_request(addr, &format!("GET {path} HTTP/1.1\r\nHost: test\r\n\r\n"))
}

pub fn get_with_cookie(addr: &SocketAddr, path: &str, cookie: &str) -> String {
    send_request(
        addr,
        &format!("GET {path} HTTP/1.1\r\nHost: test\r\nCookie: {cookie}\r\n\r\n"),
    )
}

/// Split a raw response into (status, headers, body). Repeated header names
/// (Set-Cookie) keep the last value; use `set_cookie` for the session token.
pub fn parse_response(resp: &str) -> (u16, HashMap<String, String>, String) {
    let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
    let mut lines = head.lines();
    let status = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    (status, headers, body.to_string())
}

/// Extract the SESSIONID token from a response's Set-Cookie lines.
pub fn session_cookie(resp: &str) -> Option<String> {
    resp.lines().find_map(|line| {
        let value = line.strip_prefix("Set-Cookie: ")?;
        let token = value.strip_prefix("SESSIONID=")?;
        Some(token.split(';').next().unwrap_or("").to_string())
    })
}
