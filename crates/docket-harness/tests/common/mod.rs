#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use docket_server::protocol::Request;
use docket_server::{Server, Session};
use docket_store::MemoryStore;

pub struct TestServer {
    pub addr: String,
    shutdown: Arc<AtomicBool>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

pub fn start_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let server = Server::new(Arc::new(MemoryStore::new()), &addr);
    let shutdown = server.shutdown_handle();
    thread::spawn(move || {
        server.serve().unwrap();
    });

    thread::sleep(Duration::from_millis(50));

    TestServer { addr, shutdown }
}

/// A peer that accepts connections and never answers.
pub fn start_silent_peer() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            held.push(stream);
        }
    });
    addr
}

/// Serves `store` like `docket-server`, but holds back the reply to any
/// request matching `slow` for `delay`.
pub fn start_slow_server(
    store: Arc<MemoryStore>,
    slow: fn(&Request) -> bool,
    delay: Duration,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let session = Session::new(Arc::clone(&store));
            thread::spawn(move || {
                loop {
                    let mut len_buf = [0u8; 4];
                    if stream.read_exact(&mut len_buf).is_err() {
                        return;
                    }
                    let mut frame = vec![0u8; u32::from_be_bytes(len_buf) as usize];
                    if stream.read_exact(&mut frame).is_err() {
                        return;
                    }
                    let request: Request = rmp_serde::from_slice(&frame).unwrap();
                    if slow(&request) {
                        thread::sleep(delay);
                    }
                    let reply = rmp_serde::to_vec(&session.handle(request)).unwrap();
                    let _ = stream.write_all(&(reply.len() as u32).to_be_bytes());
                    let _ = stream.write_all(&reply);
                }
            });
        }
    });
    addr
}

pub fn demos_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/jstests")
}

pub fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(path).unwrap()
}

/// Write `files` (relative path, source) under a fresh temp dir.
pub fn script_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, source) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, source).unwrap();
    }
    dir
}
