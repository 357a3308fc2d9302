//! Attribute values carried by replicant tuples.
//!
//! Every attribute in a dumped record is one of a small set of primitive
//! values. Two variants are placeholders rather than data: `Reference` and
//! `ReferenceList` name records on the dumping side and are rewritten to the
//! loading side's ids as the stream is replayed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a record within its type: a primary key on either side of a
/// transfer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

impl RecordId {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            RecordId::Int(i) => Some(*i),
            RecordId::Str(_) => None,
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<i32> for RecordId {
    fn from(value: i32) -> Self {
        RecordId::Int(value as i64)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Str(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Str(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(i) => write!(f, "{}", i),
            RecordId::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Values that can appear in a tuple's attribute map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    /// Ordered sequence of values. A resolved `ReferenceList` becomes one.
    List(Vec<AttributeValue>),
    /// Foreign key placeholder: `[REF, type, remote id]`.
    Reference(String, RecordId),
    /// Foreign key list placeholder: `[REF_LIST, type, [remote id, ...]]`.
    ReferenceList(String, Vec<RecordId>),
}

impl AttributeValue {
    /// Build a single reference to a record of `target_type`.
    pub fn reference(target_type: impl Into<String>, target_id: impl Into<RecordId>) -> Self {
        AttributeValue::Reference(target_type.into(), target_id.into())
    }

    /// Build an ordered reference list. All targets share one type name.
    pub fn reference_list<I, T>(target_type: impl Into<String>, target_ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<RecordId>,
    {
        AttributeValue::ReferenceList(
            target_type.into(),
            target_ids.into_iter().map(Into::into).collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Whether this value still has to be translated through a keymap
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            AttributeValue::Reference(..) | AttributeValue::ReferenceList(..)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<RecordId> for AttributeValue {
    fn from(id: RecordId) -> Self {
        match id {
            RecordId::Int(i) => AttributeValue::Int(i),
            RecordId::Str(s) => AttributeValue::String(s),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(value as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        AttributeValue::Bytes(value)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        AttributeValue::DateTime(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(AttributeValue::Null, Into::into)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(x) => write!(f, "{}", x),
            AttributeValue::String(s) => write!(f, "{:?}", s),
            AttributeValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            AttributeValue::DateTime(t) => write!(f, "{}", t.to_rfc3339()),
            AttributeValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            AttributeValue::Reference(t, id) => write!(f, "ref({}:{})", t, id),
            AttributeValue::ReferenceList(t, ids) => {
                write!(f, "refs({}:", t)?;
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", id)?;
                }
                write!(f, ")")
            }
        }
    }
}
