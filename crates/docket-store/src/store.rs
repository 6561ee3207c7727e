use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use arc_swap::ArcSwap;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use docket_query::{Expression, Update, matches, parse_filter, parse_update};
use tracing::debug;

use crate::collection::CollectionData;
use crate::current_op::{OpKind, OpRegistry, OpReport};
use crate::error::{ErrorCode, StoreError};
use crate::namespace::Namespace;
use crate::result::{InsertResult, UpdateResult};

type CollectionHandle = Arc<ArcSwap<CollectionData>>;

/// In-memory document store.
///
/// Readers load an immutable snapshot of a collection without locking.
/// Writers serialize on `write_lock`, copy the snapshot (cheap, structurally
/// shared), modify it and swap it in.
pub struct MemoryStore {
    collections: RwLock<HashMap<Namespace, CollectionHandle>>,
    write_lock: Mutex<()>,
    ops: OpRegistry,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
            ops: OpRegistry::new(),
        }
    }

    // ── Collections ─────────────────────────────────────────────

    /// Collection names in `db`, sorted.
    pub fn list_collections(&self, db: &str) -> Result<Vec<String>, StoreError> {
        let collections = self.read_map()?;
        let mut names: Vec<String> = collections
            .keys()
            .filter(|ns| ns.db == db)
            .map(|ns| ns.coll.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Remove a collection. Returns whether it existed; dropping a missing
    /// collection is not an error.
    pub fn drop_collection(&self, ns: &Namespace) -> Result<bool, StoreError> {
        let _op = self.ops.begin(OpKind::Command, ns.to_string());
        let _guard = self.lock_writes()?;
        let existed = self.write_map()?.remove(ns).is_some();
        debug!(%ns, existed, "dropped collection");
        Ok(existed)
    }

    /// Remove every collection of `db`. Returns how many were dropped.
    pub fn drop_database(&self, db: &str) -> Result<usize, StoreError> {
        let _op = self.ops.begin(OpKind::Command, format!("{db}.$cmd"));
        let _guard = self.lock_writes()?;
        let mut collections = self.write_map()?;
        let before = collections.len();
        collections.retain(|ns, _| ns.db != db);
        let dropped = before - collections.len();
        debug!(db, dropped, "dropped database");
        Ok(dropped)
    }

    // ── Writes ──────────────────────────────────────────────────

    /// Insert a document, assigning an `ObjectId` `_id` when absent.
    ///
    /// The assigned identifier is returned; the stored document carries it as
    /// its first field.
    pub fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<InsertResult, StoreError> {
        let _op = self.ops.begin(OpKind::Insert, ns.to_string());
        validate_for_insert(&doc)?;
        let (id, doc) = with_id(doc);

        let _guard = self.lock_writes()?;
        let handle = self.get_or_create(ns)?;
        let mut data = (**handle.load()).clone();
        if data.contains_id(&id) {
            return Err(StoreError::duplicate_key(ns, &id));
        }
        data.push(&id, doc);
        handle.store(Arc::new(data));

        debug!(%ns, %id, "inserted document");
        Ok(InsertResult { inserted_id: id })
    }

    /// Apply `update` to the first document matching `filter`.
    ///
    /// `update` is either an operator document or a full replacement. No match
    /// is reported as zero matched, not as an error.
    pub fn update_one(
        &self,
        ns: &Namespace,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateResult, StoreError> {
        let _op = self.ops.begin(OpKind::Update, ns.to_string());
        let expr = parse_filter(filter)?;
        let update = parse_update(update)?;
        if let Update::Replacement(replacement) = &update {
            validate_field_names(replacement)?;
        }
        self.apply_first(ns, &expr, &update)
    }

    /// Replace the first document matching `filter`, keeping its `_id`.
    pub fn replace_one(
        &self,
        ns: &Namespace,
        filter: &Document,
        replacement: Document,
    ) -> Result<UpdateResult, StoreError> {
        let _op = self.ops.begin(OpKind::Update, ns.to_string());
        let expr = parse_filter(filter)?;
        if replacement.keys().any(|k| k.starts_with('$')) {
            return Err(StoreError::write(
                ErrorCode::FailedToParse,
                "replacement document must not contain update operators",
            ));
        }
        self.apply_first(ns, &expr, &Update::Replacement(replacement))
    }

    fn apply_first(
        &self,
        ns: &Namespace,
        expr: &Expression,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        let _guard = self.lock_writes()?;
        let Some(handle) = self.existing(ns)? else {
            return Ok(UpdateResult::default());
        };
        let mut data = (**handle.load()).clone();
        let Some((seq, current)) = data.find_first(expr) else {
            return Ok(UpdateResult::default());
        };

        let result = match update.apply(current)? {
            Some(updated) => {
                data.replace(seq, updated);
                handle.store(Arc::new(data));
                UpdateResult {
                    matched_count: 1,
                    modified_count: 1,
                }
            }
            None => UpdateResult {
                matched_count: 1,
                modified_count: 0,
            },
        };
        debug!(%ns, modified = result.modified_count, "updated document");
        Ok(result)
    }

    // ── Reads ───────────────────────────────────────────────────

    /// Documents matching `filter` in natural order, at most `limit` of them.
    pub fn find(
        &self,
        ns: &Namespace,
        filter: &Document,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        let _op = self.ops.begin(OpKind::Query, ns.to_string());
        let expr = parse_filter(filter)?;
        let Some(handle) = self.existing(ns)? else {
            return Ok(Vec::new());
        };
        let data = handle.load_full();
        Ok(data
            .iter()
            .filter(|doc| matches(doc, &expr))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    /// First document matching `filter` in natural order.
    pub fn find_one(
        &self,
        ns: &Namespace,
        filter: &Document,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.find(ns, filter, Some(1))?.into_iter().next())
    }

    pub fn count(&self, ns: &Namespace, filter: &Document) -> Result<u64, StoreError> {
        let _op = self.ops.begin(OpKind::Query, ns.to_string());
        let expr = parse_filter(filter)?;
        let Some(handle) = self.existing(ns)? else {
            return Ok(0);
        };
        let data = handle.load_full();
        if filter.is_empty() {
            return Ok(data.len() as u64);
        }
        Ok(data.iter().filter(|doc| matches(doc, &expr)).count() as u64)
    }

    // ── Diagnostics ─────────────────────────────────────────────

    /// Snapshot of in-progress operations, including this request itself.
    pub fn current_op(&self) -> OpReport {
        let _op = self.ops.begin(OpKind::Command, "admin.$cmd");
        OpReport {
            inprog: self.ops.snapshot(),
        }
    }

    // ── Internals ───────────────────────────────────────────────

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))
    }

    fn read_map(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Namespace, CollectionHandle>>, StoreError>
    {
        self.collections
            .read()
            .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))
    }

    fn write_map(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<Namespace, CollectionHandle>>, StoreError>
    {
        self.collections
            .write()
            .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))
    }

    fn existing(&self, ns: &Namespace) -> Result<Option<CollectionHandle>, StoreError> {
        Ok(self.read_map()?.get(ns).cloned())
    }

    /// Collections are created implicitly on first write.
    fn get_or_create(&self, ns: &Namespace) -> Result<CollectionHandle, StoreError> {
        if let Some(handle) = self.existing(ns)? {
            return Ok(handle);
        }
        let mut collections = self.write_map()?;
        let handle = collections
            .entry(ns.clone())
            .or_insert_with(|| Arc::new(ArcSwap::from_pointee(CollectionData::default())));
        debug!(%ns, "created collection");
        Ok(Arc::clone(handle))
    }
}

/// Return the document's `_id` (generated when absent) and the document with
/// `_id` moved to the front.
fn with_id(mut doc: Document) -> (Bson, Document) {
    let id = doc
        .remove("_id")
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
    let mut stored = Document::new();
    stored.insert("_id", id.clone());
    stored.extend(doc);
    (id, stored)
}

fn validate_for_insert(doc: &Document) -> Result<(), StoreError> {
    validate_field_names(doc)?;
    if let Some(Bson::Array(_)) = doc.get("_id") {
        return Err(StoreError::write(
            ErrorCode::BadValue,
            "can't use an array for _id",
        ));
    }
    Ok(())
}

fn validate_field_names(doc: &Document) -> Result<(), StoreError> {
    match doc.keys().find(|k| k.starts_with('$')) {
        Some(key) => Err(StoreError::write(
            ErrorCode::BadValue,
            format!("Document can't have $ prefixed field names: {key}"),
        )),
        None => Ok(()),
    }
}
