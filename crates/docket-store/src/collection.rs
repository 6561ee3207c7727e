use bson::{Bson, Document, RawDocumentBuf, doc};
use docket_query::{Expression, matches};
use imbl::OrdMap;

/// Hashable, ordered form of an `_id` value for the uniqueness index.
///
/// Integral numbers collapse to one key regardless of BSON number type, so
/// `1`, `NumberLong(1)` and `1.0` collide the way a unique index would.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum IdKey {
    Int(i64),
    Float(u64),
    Bool(bool),
    String(String),
    ObjectId([u8; 12]),
    Encoded(Vec<u8>),
}

impl IdKey {
    pub(crate) fn new(id: &Bson) -> Self {
        match id {
            Bson::Int32(n) => IdKey::Int(i64::from(*n)),
            Bson::Int64(n) => IdKey::Int(*n),
            Bson::Double(d) if d.fract() == 0.0 && d.abs() < 9.0e15 => IdKey::Int(*d as i64),
            Bson::Double(d) => IdKey::Float(d.to_bits()),
            Bson::Boolean(b) => IdKey::Bool(*b),
            Bson::String(s) => IdKey::String(s.clone()),
            Bson::ObjectId(oid) => IdKey::ObjectId(oid.bytes()),
            other => {
                let wrapped = doc! { "v": other.clone() };
                let bytes = RawDocumentBuf::try_from(&wrapped)
                    .map(|raw| raw.as_bytes().to_vec())
                    .unwrap_or_else(|_| other.to_string().into_bytes());
                IdKey::Encoded(bytes)
            }
        }
    }
}

/// The documents of one collection, in insertion order.
///
/// Cloning is cheap (`imbl` structural sharing), which is what lets writers
/// copy-modify-swap while readers keep their snapshot.
#[derive(Debug, Clone, Default)]
pub(crate) struct CollectionData {
    docs: OrdMap<u64, Document>,
    ids: OrdMap<IdKey, u64>,
    next_seq: u64,
}

impl CollectionData {
    pub(crate) fn len(&self) -> usize {
        self.docs.len()
    }

    /// Documents in natural (insertion) order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    pub(crate) fn contains_id(&self, id: &Bson) -> bool {
        self.ids.contains_key(&IdKey::new(id))
    }

    /// Append a document that already carries a unique `_id`.
    pub(crate) fn push(&mut self, id: &Bson, doc: Document) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.ids.insert(IdKey::new(id), seq);
        self.docs.insert(seq, doc);
    }

    /// First document in natural order matching `expr`.
    pub(crate) fn find_first(&self, expr: &Expression) -> Option<(u64, &Document)> {
        self.docs
            .iter()
            .find(|(_, doc)| matches(doc, expr))
            .map(|(seq, doc)| (*seq, doc))
    }

    /// Swap the document at `seq`, keeping its position. The `_id` must not change.
    pub(crate) fn replace(&mut self, seq: u64, doc: Document) {
        self.docs.insert(seq, doc);
    }
}
