//! Streaming replicant dumper.
//!
//! The dumper takes domain entities and asks each of them to dump itself.
//! An entity's dump handler decides which related entities to dump and in
//! which order, and calls [`Dumper::write`] for its own tuple at the point it
//! chooses (usually after the records it references and before the records
//! that reference it). The dumper guarantees each `(type, id)` is written at
//! most once per session, which also makes cyclic object graphs terminate.
//!
//! ```ignore
//! let mut dumper = Dumper::new();
//! dumper.listen(StreamWriter::new(std::io::stdout()));
//! dumper.dump(&user, &DumpOptions::default())?;
//! dumper.complete()?;
//! ```

use crate::emitter::{Emitter, Listener};
use crate::error::{ReplicateError, Result};
use crate::registry::TypeRegistry;
use crate::stats::Stats;
use crate::tuple::{Attributes, TupleKey};
use crate::value::RecordId;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Dump capability of a domain entity
pub trait Replicant {
    /// Type name and id identifying this entity in the stream.
    fn replicant_id(&self) -> TupleKey;

    /// Dump this entity and whatever it depends on through `dumper`. Types
    /// that can only be loaded keep the default, which fails.
    fn dump_replicant(&self, dumper: &mut Dumper, options: &DumpOptions) -> Result<()> {
        let _ = (dumper, options);
        Err(ReplicateError::MissingCapability {
            type_name: self.replicant_id().type_name,
        })
    }
}

/// Hints handed through to dump handlers. The dumper itself never reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpOptions {
    /// Additional association names to traverse.
    pub associations: Vec<String>,
    /// Attribute names to leave out of written tuples.
    pub omit: Vec<String>,
}

impl DumpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_association(mut self, name: impl Into<String>) -> Self {
        self.associations.push(name.into());
        self
    }

    pub fn omitting(mut self, attribute: impl Into<String>) -> Self {
        self.omit.push(attribute.into());
        self
    }

    pub fn includes_association(&self, name: &str) -> bool {
        self.associations.iter().any(|a| a == name)
    }

    pub fn omits(&self, attribute: &str) -> bool {
        self.omit.iter().any(|a| a == attribute)
    }
}

/// Writes each distinct entity of an object graph exactly once
#[derive(Default)]
pub struct Dumper {
    emitter: Emitter,
    dumped: HashMap<String, HashSet<RecordId>>,
    registry: Option<TypeRegistry>,
}

impl Dumper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dumper that can dump entities given only by `(type, id)`,
    /// using the finders in `registry`.
    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self {
            registry: Some(registry),
            ..Self::default()
        }
    }

    pub fn listen<L: Listener + 'static>(&mut self, listener: L) {
        self.emitter.listen(listener);
    }

    pub fn listen_fn<F>(&mut self, f: F)
    where
        F: FnMut(&str, &RecordId, &mut Attributes, &dyn Any) -> Result<()> + 'static,
    {
        self.emitter.listen_fn(f);
    }

    pub fn listen_shared<L: Listener + 'static>(&mut self, listener: Rc<RefCell<L>>) {
        self.emitter.listen_shared(listener);
    }

    /// Dump one entity unless it was already written this session.
    pub fn dump<R: Replicant + ?Sized>(&mut self, entity: &R, options: &DumpOptions) -> Result<()> {
        let key = entity.replicant_id();
        if self.is_dumped(&key) {
            log::debug!("skipping {}: already dumped", key);
            return Ok(());
        }
        entity.dump_replicant(self, options)
    }

    /// Dump a sequence of entities. `None` entries are skipped.
    pub fn dump_all<'a, R, I>(&mut self, entities: I, options: &DumpOptions) -> Result<()>
    where
        R: Replicant + ?Sized + 'a,
        I: IntoIterator<Item = Option<&'a R>>,
    {
        for entity in entities.into_iter().flatten() {
            self.dump(entity, options)?;
        }
        Ok(())
    }

    /// Dump the entity addressed by a literal `(type, id)` pair, fetching it
    /// through the registry's finder for the type.
    pub fn dump_key(&mut self, key: &TupleKey, options: &DumpOptions) -> Result<()> {
        if self.is_dumped(key) {
            return Ok(());
        }
        let finder = self
            .registry
            .as_ref()
            .and_then(|registry| registry.finder(&key.type_name))
            .ok_or_else(|| ReplicateError::MissingCapability {
                type_name: key.type_name.clone(),
            })?;
        let entity = finder(&key.id).map_err(|source| ReplicateError::Load {
            type_name: key.type_name.clone(),
            id: key.id.clone(),
            source,
        })?;
        match entity {
            Some(entity) => self.dump(&*entity, options),
            None => {
                log::debug!("skipping {}: not found", key);
                Ok(())
            }
        }
    }

    /// Whether `(type, id)` has been written this session
    pub fn is_dumped(&self, key: &TupleKey) -> bool {
        self.dumped
            .get(&key.type_name)
            .is_some_and(|ids| ids.contains(&key.id))
    }

    /// Write one tuple. Called by dump handlers exactly where the entity's
    /// own record belongs in the stream; repeated calls for the same
    /// `(type, id)` are ignored.
    pub fn write(
        &mut self,
        type_name: &str,
        id: impl Into<RecordId>,
        mut attributes: Attributes,
        object: &dyn Any,
    ) -> Result<()> {
        let id = id.into();
        // Marked before emitting: a listener or handler that reaches this
        // record again while it is being written must see it as dumped.
        if !self
            .dumped
            .entry(type_name.to_string())
            .or_default()
            .insert(id.clone())
        {
            return Ok(());
        }
        self.emitter.emit(type_name, &id, &mut attributes, object)?;
        Ok(())
    }

    /// Tuples written per type
    pub fn stats(&self) -> Stats {
        let mut stats = Stats::new();
        for (type_name, ids) in &self.dumped {
            stats.set(type_name.clone(), ids.len());
        }
        stats
    }

    /// End the session: run every listener's completion hook.
    pub fn complete(&mut self) -> Result<()> {
        let stats = self.stats();
        self.emitter.complete(&stats)
    }
}
