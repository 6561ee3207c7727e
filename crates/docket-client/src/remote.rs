use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::time::Duration;

use bson::Document;
use docket_server::protocol::{Request, Response};
use docket_store::{InsertResult, Namespace, OpReport, UpdateResult};
use tracing::warn;

use crate::client::DocumentClient;
use crate::error::ClientError;

struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Connection {
    /// One request/response exchange. Any error leaves the stream at an
    /// unknown frame boundary.
    fn exchange(&mut self, request: &Request) -> Result<Response, ClientError> {
        let bytes = rmp_serde::to_vec(request)?;
        self.writer.write_all(&(bytes.len() as u32).to_be_bytes())?;
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf)?;
        let mut frame = vec![0u8; u32::from_be_bytes(len_buf) as usize];
        self.reader.read_exact(&mut frame)?;

        Ok(rmp_serde::from_slice(&frame)?)
    }
}

/// TCP client for `docket-server`.
///
/// Calls take `&self`; the connection is serialized behind a mutex so one
/// request/response pair is on the wire at a time. A failed exchange closes
/// the connection and every later call fails with [`ClientError::Transport`].
pub struct RemoteClient {
    conn: Mutex<Option<Connection>>,
}

impl RemoteClient {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        Self::connect_with_timeout(addr, None)
    }

    /// Connect with a read/write timeout; a call that exceeds it fails with
    /// [`ClientError::Timeout`].
    pub fn connect_with_timeout(
        addr: impl ToSocketAddrs,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        let writer = BufWriter::new(stream);
        Ok(Self {
            conn: Mutex::new(Some(Connection { reader, writer })),
        })
    }

    fn request(&self, request: Request) -> Result<Response, ClientError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| ClientError::Transport(io::Error::other("connection lock poisoned")))?;
        let Some(conn) = guard.as_mut() else {
            return Err(ClientError::Transport(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection closed after an earlier failure",
            )));
        };

        let result = conn.exchange(&request);
        if let Err(e) = &result {
            warn!(error = %e, "closing connection");
            *guard = None;
        }
        result
    }

    /// Send `request` and unwrap the one response variant it should produce.
    fn call<T>(
        &self,
        request: Request,
        pick: impl FnOnce(Response) -> Result<T, Response>,
    ) -> Result<T, ClientError> {
        match self.request(request)? {
            Response::Error(e) => Err(ClientError::Store(e)),
            response => pick(response)
                .map_err(|other| ClientError::Protocol(format!("unexpected response: {other:?}"))),
        }
    }
}

impl DocumentClient for RemoteClient {
    fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<InsertResult, ClientError> {
        self.call(
            Request::InsertOne {
                ns: ns.clone(),
                doc,
            },
            |r| match r {
                Response::Insert(result) => Ok(result),
                other => Err(other),
            },
        )
    }

    fn find(
        &self,
        ns: &Namespace,
        filter: &Document,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, ClientError> {
        self.call(
            Request::Find {
                ns: ns.clone(),
                filter: filter.clone(),
                limit: limit.map(|n| n as u64),
            },
            |r| match r {
                Response::Records(docs) => Ok(docs),
                other => Err(other),
            },
        )
    }

    fn find_one(&self, ns: &Namespace, filter: &Document) -> Result<Option<Document>, ClientError> {
        self.call(
            Request::FindOne {
                ns: ns.clone(),
                filter: filter.clone(),
            },
            |r| match r {
                Response::Record(doc) => Ok(doc),
                other => Err(other),
            },
        )
    }

    fn count(&self, ns: &Namespace, filter: &Document) -> Result<u64, ClientError> {
        self.call(
            Request::Count {
                ns: ns.clone(),
                filter: filter.clone(),
            },
            |r| match r {
                Response::Count(n) => Ok(n),
                other => Err(other),
            },
        )
    }

    fn update_one(
        &self,
        ns: &Namespace,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateResult, ClientError> {
        self.call(
            Request::UpdateOne {
                ns: ns.clone(),
                filter: filter.clone(),
                update: update.clone(),
            },
            |r| match r {
                Response::Update(result) => Ok(result),
                other => Err(other),
            },
        )
    }

    fn replace_one(
        &self,
        ns: &Namespace,
        filter: &Document,
        replacement: Document,
    ) -> Result<UpdateResult, ClientError> {
        self.call(
            Request::ReplaceOne {
                ns: ns.clone(),
                filter: filter.clone(),
                replacement,
            },
            |r| match r {
                Response::Update(result) => Ok(result),
                other => Err(other),
            },
        )
    }

    fn drop_collection(&self, ns: &Namespace) -> Result<bool, ClientError> {
        self.call(Request::DropCollection { ns: ns.clone() }, |r| match r {
            Response::Dropped(existed) => Ok(existed),
            other => Err(other),
        })
    }

    fn drop_database(&self, db: &str) -> Result<u64, ClientError> {
        self.call(Request::DropDatabase { db: db.to_string() }, |r| match r {
            Response::DroppedCollections(n) => Ok(n),
            other => Err(other),
        })
    }

    fn list_collections(&self, db: &str) -> Result<Vec<String>, ClientError> {
        self.call(Request::ListCollections { db: db.to_string() }, |r| match r {
            Response::Collections(names) => Ok(names),
            other => Err(other),
        })
    }

    fn current_op(&self) -> Result<OpReport, ClientError> {
        self.call(Request::CurrentOp, |r| match r {
            Response::CurrentOp(report) => Ok(report),
            other => Err(other),
        })
    }
}
