use std::collections::HashMap;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use docket_store::MemoryStore;
use signal_hook::consts::SIGTERM;
use signal_hook::flag;
use tracing::{debug, info, warn};

use crate::protocol::Request;
use crate::session::Session;

const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Read halves of the open client connections, keyed by connection id.
///
/// A handler removes its own entry when the client goes away; whatever is
/// left at shutdown is closed for reading to unblock its handler.
#[derive(Default)]
struct Connections {
    next_id: AtomicU64,
    open: Mutex<HashMap<u64, TcpStream>>,
}

impl Connections {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, TcpStream>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, stream: &TcpStream) -> std::io::Result<u64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, stream.try_clone()?);
        Ok(id)
    }

    fn release(&self, id: u64) {
        self.lock().remove(&id);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn close_all(&self) {
        for stream in self.lock().values() {
            let _ = stream.shutdown(Shutdown::Read);
        }
    }
}

pub struct Server {
    store: Arc<MemoryStore>,
    addr: String,
    shutdown: Arc<AtomicBool>,
    connections: Arc<Connections>,
}

impl Server {
    pub fn new(store: Arc<MemoryStore>, addr: impl Into<String>) -> Self {
        Self {
            store,
            addr: addr.into(),
            shutdown: Arc::new(AtomicBool::new(false)),
            connections: Arc::new(Connections::default()),
        }
    }

    /// Flag that stops `serve` when set. SIGTERM sets it too.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Number of client connections currently being served.
    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn serve(&self) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(&self.addr)?;
        info!(addr = %self.addr, "docket-server listening");

        flag::register(SIGTERM, Arc::clone(&self.shutdown))?;

        // Accept polls so the shutdown flag is observed between clients.
        listener.set_nonblocking(true)?;

        let mut handlers: Vec<JoinHandle<()>> = Vec::new();

        while !self.shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false)?;
                    let id = self.connections.register(&stream)?;
                    debug!(%peer, id, "accepted connection");

                    let store = Arc::clone(&self.store);
                    let connections = Arc::clone(&self.connections);
                    handlers.push(thread::spawn(move || {
                        if let Err(e) = handle_connection(stream, store) {
                            warn!(%peer, id, error = %e, "connection error");
                        }
                        connections.release(id);
                        debug!(%peer, id, "connection closed");
                    }));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => warn!(error = %e, "accept error"),
            }
            handlers.retain(|handler| !handler.is_finished());
        }

        info!(
            open = self.connections.len(),
            "shutdown requested, draining connections"
        );
        self.connections.close_all();
        for handler in handlers {
            let _ = handler.join();
        }

        info!("shutdown complete");
        Ok(())
    }
}

/// Serve one client until it disconnects: each frame is a 4-byte big-endian
/// length followed by a MessagePack `Request`, answered the same way.
fn handle_connection(
    stream: TcpStream,
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::new(store);
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    loop {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            // Client hung up, or the read half was shut down.
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let mut frame = vec![0u8; u32::from_be_bytes(len_buf) as usize];
        reader.read_exact(&mut frame)?;

        let request: Request = rmp_serde::from_slice(&frame)?;
        let reply = rmp_serde::to_vec(&session.handle(request))?;

        writer.write_all(&(reply.len() as u32).to_be_bytes())?;
        writer.write_all(&reply)?;
        writer.flush()?;
    }
}
