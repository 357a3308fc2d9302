use crate::value::{AttributeValue, RecordId};
use indexmap::IndexMap;
use std::fmt;

/// Attribute name to value mapping, kept in insertion order
pub type Attributes = IndexMap<String, AttributeValue>;

/// Address of a record in a dump: its type name plus its id on the
/// dumping side.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TupleKey {
    pub type_name: String,
    pub id: RecordId,
}

impl TupleKey {
    pub fn new(type_name: impl Into<String>, id: impl Into<RecordId>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }
}

impl<T: Into<String>, I: Into<RecordId>> From<(T, I)> for TupleKey {
    fn from((type_name, id): (T, I)) -> Self {
        TupleKey::new(type_name, id)
    }
}

impl fmt::Display for TupleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.id)
    }
}

/// One record snapshot moving through a replicant stream
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    pub type_name: String,
    pub id: RecordId,
    pub attributes: Attributes,
}

impl Tuple {
    pub fn new(type_name: impl Into<String>, id: impl Into<RecordId>, attributes: Attributes) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
            attributes,
        }
    }

    pub fn key(&self) -> TupleKey {
        TupleKey::new(self.type_name.clone(), self.id.clone())
    }
}

/// Build an `Attributes` map from name/value pairs, keeping their order.
pub fn attributes<K, V, I>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<AttributeValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
