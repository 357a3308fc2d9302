//! Streaming replicant loader.
//!
//! The loader consumes `(type, id, attributes)` tuples one at a time and
//! creates the corresponding records through the load capability registered
//! for each type. Tuples must arrive so that a referenced record precedes
//! every record referencing it: the loader keeps a keymap from remote ids to
//! the ids assigned locally and rewrites each reference placeholder through
//! it before handing the attributes to the loader capability. Nothing is
//! looked ahead or revisited.

use crate::emitter::{Emitter, Listener};
use crate::error::{ReplicateError, Result};
use crate::keymap::Keymap;
use crate::registry::TypeRegistry;
use crate::stats::Stats;
use crate::tuple::Attributes;
use crate::value::{AttributeValue, RecordId};
use crate::wire::StreamReader;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::io::Read;
use std::rc::Rc;
use std::str::FromStr;

/// What to do when a reference names a record missing from the keymap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum UnresolvedPolicy {
    /// Log a warning, substitute null and keep loading.
    #[default]
    WarnAndNull,
    /// Abort the load with `ReplicateError::UnresolvedReference`.
    Fail,
}

impl FromStr for UnresolvedPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "warn-and-null" => Ok(UnresolvedPolicy::WarnAndNull),
            "fail" => Ok(UnresolvedPolicy::Fail),
            other => Err(format!("Unknown unresolved reference policy: {}", other)),
        }
    }
}

impl fmt::Display for UnresolvedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedPolicy::WarnAndNull => write!(f, "warn-and-null"),
            UnresolvedPolicy::Fail => write!(f, "fail"),
        }
    }
}

/// Loader configuration.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Handling of references that cannot be resolved.
    pub on_unresolved_reference: UnresolvedPolicy,
}

/// Loads replicant tuples into the destination store
pub struct Loader {
    emitter: Emitter,
    registry: TypeRegistry,
    keymap: Keymap,
    stats: Stats,
    config: LoaderConfig,
    unresolved: usize,
}

impl Loader {
    pub fn new(registry: TypeRegistry) -> Self {
        Self::with_config(registry, LoaderConfig::default())
    }

    pub fn with_config(registry: TypeRegistry, config: LoaderConfig) -> Self {
        Self {
            emitter: Emitter::new(),
            registry,
            keymap: Keymap::new(),
            stats: Stats::new(),
            config,
            unresolved: 0,
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

    /// Load a single tuple and return the instance it was loaded into.
    pub fn feed(
        &mut self,
        type_name: &str,
        id: impl Into<RecordId>,
        mut attributes: Attributes,
    ) -> Result<Box<dyn Any>> {
        let id = id.into();
        if !self.registry.can_load(type_name) {
            return Err(ReplicateError::UnknownType(type_name.to_string()));
        }

        self.translate_ids(type_name, &id, &mut attributes)?;

        let loaded = {
            let loader = self
                .registry
                .loader_mut(type_name)
                .ok_or_else(|| ReplicateError::UnknownType(type_name.to_string()))?;
            match loader.load_replicant(type_name, &id, &attributes) {
                Ok(loaded) => loaded,
                Err(source) => {
                    log::error!("loading {} {}: {:#}", type_name, id, source);
                    return Err(ReplicateError::Load {
                        type_name: type_name.to_string(),
                        id,
                        source,
                    });
                }
            }
        };

        self.register_id(type_name, &id, &loaded.local_id);
        self.stats.increment(type_name);
        self.emitter
            .emit(type_name, &id, &mut attributes, &*loaded.instance)?;
        Ok(loaded.instance)
    }

    /// Feed every tuple from a replicant stream. A clean end of stream ends
    /// the loop; returns the number of tuples fed.
    pub fn read<R: Read>(&mut self, reader: R) -> Result<usize> {
        let mut count = 0;
        for tuple in StreamReader::new(reader) {
            let tuple = tuple?;
            self.feed(&tuple.type_name, tuple.id, tuple.attributes)?;
            count += 1;
        }
        Ok(count)
    }

    /// End the session: run every listener's completion hook.
    pub fn complete(&mut self) -> Result<()> {
        self.emitter.complete(&self.stats)
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// References that could not be resolved so far
    pub fn unresolved(&self) -> usize {
        self.unresolved
    }

    /// Rewrite reference placeholders in `attributes` to local ids.
    fn translate_ids(&mut self, type_name: &str, id: &RecordId, attributes: &mut Attributes) -> Result<()> {
        for (name, value) in attributes.iter_mut() {
            let translated = match value {
                AttributeValue::Reference(target_type, remote_id) => {
                    self.resolve(type_name, id, name, target_type, remote_id)?
                }
                AttributeValue::ReferenceList(target_type, remote_ids) => {
                    let mut local_ids = Vec::with_capacity(remote_ids.len());
                    for remote_id in remote_ids.iter() {
                        local_ids.push(self.resolve(type_name, id, name, target_type, remote_id)?);
                    }
                    AttributeValue::List(local_ids)
                }
                _ => continue,
            };
            *value = translated;
        }
        Ok(())
    }

    fn resolve(
        &mut self,
        type_name: &str,
        id: &RecordId,
        attribute: &str,
        target_type: &str,
        remote_id: &RecordId,
    ) -> Result<AttributeValue> {
        if let Some(local_id) = self.keymap.resolve(target_type, remote_id) {
            return Ok(local_id.clone().into());
        }

        self.unresolved += 1;
        match self.config.on_unresolved_reference {
            UnresolvedPolicy::WarnAndNull => {
                log::warn!(
                    "{} {} {} references {} {} missing from keymap",
                    type_name,
                    id,
                    attribute,
                    target_type,
                    remote_id
                );
                Ok(AttributeValue::Null)
            }
            UnresolvedPolicy::Fail => Err(ReplicateError::UnresolvedReference {
                type_name: target_type.to_string(),
                id: remote_id.clone(),
            }),
        }
    }

    /// Register a loaded id under its own type name and every alias of the
    /// type.
    fn register_id(&mut self, type_name: &str, remote_id: &RecordId, local_id: &RecordId) {
        self.keymap.register(type_name, remote_id, local_id);
        for alias in self.registry.aliases(type_name) {
            self.keymap.register(alias, remote_id, local_id);
        }
    }
}
