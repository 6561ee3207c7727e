use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Insert,
    Query,
    Update,
    Command,
}

impl OpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Insert => "insert",
            OpKind::Query => "query",
            OpKind::Update => "update",
            OpKind::Command => "command",
        }
    }
}

/// One in-progress operation as reported by `currentOp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpDescriptor {
    pub opid: u64,
    pub op: OpKind,
    pub ns: String,
    pub active: bool,
    pub microsecs_running: u64,
}

impl OpDescriptor {
    pub fn to_document(&self) -> Document {
        let opid = self.opid as i64;
        let micros = self.microsecs_running as i64;
        doc! {
            "opid": opid,
            "active": self.active,
            "op": self.op.as_str(),
            "ns": self.ns.clone(),
            "microsecs_running": micros,
        }
    }
}

/// Point-in-time snapshot of in-progress operations.
///
/// `inprog` is always present; an idle store reports an empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpReport {
    pub inprog: Vec<OpDescriptor>,
}

impl OpReport {
    pub fn to_document(&self) -> Document {
        let inprog: Vec<Bson> = self
            .inprog
            .iter()
            .map(|op| Bson::Document(op.to_document()))
            .collect();
        doc! { "inprog": inprog, "ok": 1.0 }
    }
}

struct ActiveOp {
    op: OpKind,
    ns: String,
    started: Instant,
}

/// Registry of operations currently executing against the store.
///
/// Entries are advisory: a poisoned lock is recovered rather than surfaced.
pub(crate) struct OpRegistry {
    next_id: AtomicU64,
    active: Mutex<HashMap<u64, ActiveOp>>,
}

impl OpRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Register an operation; it stays visible until the guard drops.
    pub(crate) fn begin(&self, op: OpKind, ns: impl Into<String>) -> OpGuard<'_> {
        let opid = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                opid,
                ActiveOp {
                    op,
                    ns: ns.into(),
                    started: Instant::now(),
                },
            );
        OpGuard {
            registry: self,
            opid,
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<OpDescriptor> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ops: Vec<OpDescriptor> = active
            .iter()
            .map(|(opid, entry)| OpDescriptor {
                opid: *opid,
                op: entry.op,
                ns: entry.ns.clone(),
                active: true,
                microsecs_running: u64::try_from(entry.started.elapsed().as_micros())
                    .unwrap_or(u64::MAX),
            })
            .collect();
        ops.sort_by_key(|op| op.opid);
        ops
    }
}

pub(crate) struct OpGuard<'a> {
    registry: &'a OpRegistry,
    opid: u64,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.opid);
    }
}
