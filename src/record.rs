//! Generic in-memory entities and store.
//!
//! `Record` is a schema-less entity that knows how to dump itself and the
//! records it is linked to. `MemoryStore` is a load capability that keeps
//! loaded records in memory, assigning sequential ids per type. Together they
//! stand in for a real persistence layer in tests and in the `check` command.

use crate::dumper::{DumpOptions, Dumper, Replicant};
use crate::error::Result;
use crate::registry::{LoadReplicant, Loaded};
use crate::tuple::{Attributes, TupleKey};
use crate::value::{AttributeValue, RecordId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Schema-less entity with links to other records.
///
/// Links are held weakly so cyclic graphs can be built without leaking; the
/// caller keeps the records alive for the duration of a dump.
pub struct Record {
    type_name: String,
    id: RecordId,
    attributes: RefCell<Attributes>,
    /// Records referenced by this one, dumped before it.
    prerequisites: RefCell<Vec<Weak<Record>>>,
    /// Records owned one-to-one, always dumped after it.
    owned: RefCell<Vec<Weak<Record>>>,
    /// Named one-to-many associations, dumped after it on request.
    collections: RefCell<Vec<(String, Vec<Weak<Record>>)>>,
}

impl Record {
    pub fn new(type_name: impl Into<String>, id: impl Into<RecordId>, attributes: Attributes) -> Rc<Self> {
        Rc::new(Self {
            type_name: type_name.into(),
            id: id.into(),
            attributes: RefCell::new(attributes),
            prerequisites: RefCell::new(Vec::new()),
            owned: RefCell::new(Vec::new()),
            collections: RefCell::new(Vec::new()),
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn get(&self, name: &str) -> Option<AttributeValue> {
        self.attributes.borrow().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.borrow_mut().insert(name.into(), value.into());
    }

    pub fn attributes(&self) -> Attributes {
        self.attributes.borrow().clone()
    }

    /// Point `attribute` at `target`; the target is dumped first.
    ///
    /// Two records must not belong to each other: the back edge of a cycle
    /// goes through [`Record::has_one`] or [`Record::has_many`].
    pub fn belongs_to(&self, attribute: impl Into<String>, target: &Rc<Record>) {
        self.set(
            attribute,
            AttributeValue::reference(target.type_name.clone(), target.id.clone()),
        );
        self.prerequisites.borrow_mut().push(Rc::downgrade(target));
    }

    /// Point `attribute` at an ordered list of `target_type` records; all of
    /// them are dumped first.
    pub fn references(&self, attribute: impl Into<String>, target_type: &str, targets: &[Rc<Record>]) {
        let ids: Vec<RecordId> = targets.iter().map(|t| t.id.clone()).collect();
        self.set(attribute, AttributeValue::reference_list(target_type, ids));
        self.prerequisites
            .borrow_mut()
            .extend(targets.iter().map(Rc::downgrade));
    }

    /// Own `target` one-to-one; it is dumped right after this record.
    pub fn has_one(&self, target: &Rc<Record>) {
        self.owned.borrow_mut().push(Rc::downgrade(target));
    }

    /// Add a named one-to-many association. It is only traversed when the
    /// dump options name it.
    pub fn has_many(&self, name: impl Into<String>, targets: &[Rc<Record>]) {
        let targets = targets.iter().map(Rc::downgrade).collect();
        self.collections.borrow_mut().push((name.into(), targets));
    }

    fn dump_linked(&self, links: &[Weak<Record>], dumper: &mut Dumper, options: &DumpOptions) -> Result<()> {
        for link in links {
            match link.upgrade() {
                Some(record) => dumper.dump(&*record, options)?,
                None => log::debug!("{}:{} links to a dropped record", self.type_name, self.id),
            }
        }
        Ok(())
    }
}

impl Replicant for Record {
    fn replicant_id(&self) -> TupleKey {
        TupleKey::new(self.type_name.clone(), self.id.clone())
    }

    fn dump_replicant(&self, dumper: &mut Dumper, options: &DumpOptions) -> Result<()> {
        let prerequisites = self.prerequisites.borrow().clone();
        self.dump_linked(&prerequisites, dumper, options)?;

        let mut attributes = self.attributes();
        attributes.retain(|name, _| !options.omits(name));
        dumper.write(&self.type_name, self.id.clone(), attributes, self)?;

        let owned = self.owned.borrow().clone();
        self.dump_linked(&owned, dumper, options)?;

        let collections = self.collections.borrow().clone();
        for (name, targets) in &collections {
            if options.includes_association(name) {
                self.dump_linked(targets, dumper, options)?;
            }
        }
        Ok(())
    }
}

/// A record as stored by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub type_name: String,
    pub local_id: RecordId,
    pub remote_id: RecordId,
    pub attributes: Attributes,
}

#[derive(Default)]
struct StoreInner {
    next_ids: HashMap<String, i64>,
    records: Vec<StoredRecord>,
    natural_keys: HashMap<String, String>,
}

/// In-memory destination store.
///
/// Cloning yields another handle to the same store, so one handle can be
/// registered with a loader while another inspects the results.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find-or-create records of `type_name` by the value of `attribute`
    /// instead of always creating new ones.
    pub fn with_natural_key(self, type_name: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.inner
            .borrow_mut()
            .natural_keys
            .insert(type_name.into(), attribute.into());
        self
    }

    pub fn get(&self, type_name: &str, local_id: &RecordId) -> Option<StoredRecord> {
        self.inner
            .borrow()
            .records
            .iter()
            .find(|r| r.type_name == type_name && &r.local_id == local_id)
            .cloned()
    }

    /// Stored records of one type in load order
    pub fn records(&self, type_name: &str) -> Vec<StoredRecord> {
        self.inner
            .borrow()
            .records
            .iter()
            .filter(|r| r.type_name == type_name)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LoadReplicant for MemoryStore {
    fn load_replicant(
        &mut self,
        type_name: &str,
        id: &RecordId,
        attributes: &Attributes,
    ) -> anyhow::Result<Loaded> {
        let mut inner = self.inner.borrow_mut();

        let natural_key = inner
            .natural_keys
            .get(type_name)
            .and_then(|attribute| attributes.get(attribute))
            .cloned();
        if let Some(key) = natural_key.filter(|key| !key.is_null()) {
            let attribute = inner.natural_keys[type_name].clone();
            if let Some(existing) = inner
                .records
                .iter_mut()
                .find(|r| r.type_name == type_name && r.attributes.get(&attribute) == Some(&key))
            {
                existing.attributes = attributes.clone();
                return Ok(Loaded::new(existing.local_id.clone(), existing.clone()));
            }
        }

        let next = inner.next_ids.entry(type_name.to_string()).or_insert(0);
        *next += 1;
        let record = StoredRecord {
            type_name: type_name.to_string(),
            local_id: RecordId::Int(*next),
            remote_id: id.clone(),
            attributes: attributes.clone(),
        };
        inner.records.push(record.clone());
        Ok(Loaded::new(record.local_id.clone(), record))
    }
}
