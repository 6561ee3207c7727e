#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use docket_server::Server;
use docket_server::protocol::Response;
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

/// A peer that answers every frame with an empty `Records` response, the
/// first one only after `delay`.
pub fn start_late_peer(delay: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            thread::spawn(move || {
                let reply = rmp_serde::to_vec(&Response::Records(Vec::new())).unwrap();
                let mut first = true;
                loop {
                    let mut len_buf = [0u8; 4];
                    if stream.read_exact(&mut len_buf).is_err() {
                        return;
                    }
                    let mut frame = vec![0u8; u32::from_be_bytes(len_buf) as usize];
                    if stream.read_exact(&mut frame).is_err() {
                        return;
                    }
                    if first {
                        thread::sleep(delay);
                        first = false;
                    }
                    let _ = stream.write_all(&(reply.len() as u32).to_be_bytes());
                    let _ = stream.write_all(&reply);
                }
            });
        }
    });
    addr
}
