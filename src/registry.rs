//! Type name to capability table.
//!
//! Replicant streams name record types by string. The registry is filled once
//! at startup and maps each name to what the core needs from the surrounding
//! persistence layer: a load capability, the alias names a loaded id is also
//! registered under, and optionally a finder used to dump a record given only
//! its `(type, id)` pair.

use crate::dumper::Replicant;
use crate::tuple::Attributes;
use crate::value::RecordId;
use std::any::Any;
use std::collections::HashMap;

/// Outcome of loading one tuple into the destination store
pub struct Loaded {
    /// Id assigned (or found) on the loading side.
    pub local_id: RecordId,
    /// The created or updated instance, handed to listeners.
    pub instance: Box<dyn Any>,
}

impl Loaded {
    pub fn new<T: Any>(local_id: impl Into<RecordId>, instance: T) -> Self {
        Self {
            local_id: local_id.into(),
            instance: Box::new(instance),
        }
    }
}

/// Type-level load capability.
///
/// Implementations decide between creating and updating (for instance via a
/// natural-key lookup) and how to persist. `attributes` arrive with all
/// references already translated to local ids.
pub trait LoadReplicant {
    fn load_replicant(
        &mut self,
        type_name: &str,
        id: &RecordId,
        attributes: &Attributes,
    ) -> anyhow::Result<Loaded>;
}

/// Load capability backed by a closure, see [`load_fn`].
pub struct FnLoader<F>(F);

impl<F> LoadReplicant for FnLoader<F>
where
    F: FnMut(&str, &RecordId, &Attributes) -> anyhow::Result<Loaded>,
{
    fn load_replicant(
        &mut self,
        type_name: &str,
        id: &RecordId,
        attributes: &Attributes,
    ) -> anyhow::Result<Loaded> {
        (self.0)(type_name, id, attributes)
    }
}

/// Wrap a closure as a load capability.
pub fn load_fn<F>(f: F) -> FnLoader<F>
where
    F: FnMut(&str, &RecordId, &Attributes) -> anyhow::Result<Loaded>,
{
    FnLoader(f)
}

/// Fetches an entity on the dumping side by id.
pub type Finder = Box<dyn Fn(&RecordId) -> anyhow::Result<Option<Box<dyn Replicant>>>>;

#[derive(Default)]
struct TypeEntry {
    aliases: Vec<String>,
    loader: Option<Box<dyn LoadReplicant>>,
    finder: Option<Finder>,
}

/// Registry of replicant types by name
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeEntry>,
    fallback: Option<Box<dyn LoadReplicant>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the load capability for a type.
    pub fn register<L: LoadReplicant + 'static>(
        &mut self,
        type_name: impl Into<String>,
        loader: L,
    ) -> &mut Self {
        self.register_with_aliases(type_name, Vec::<String>::new(), loader)
    }

    /// Register the load capability for a type along with the names its
    /// loaded ids should also be reachable under, typically supertypes.
    pub fn register_with_aliases<L, I, S>(
        &mut self,
        type_name: impl Into<String>,
        aliases: I,
        loader: L,
    ) -> &mut Self
    where
        L: LoadReplicant + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.types.entry(type_name.into()).or_default();
        entry.aliases = aliases.into_iter().map(Into::into).collect();
        entry.loader = Some(Box::new(loader));
        self
    }

    /// Register how to fetch a dumpable entity of this type by id.
    pub fn register_finder<F>(&mut self, type_name: impl Into<String>, finder: F) -> &mut Self
    where
        F: Fn(&RecordId) -> anyhow::Result<Option<Box<dyn Replicant>>> + 'static,
    {
        let entry = self.types.entry(type_name.into()).or_default();
        entry.finder = Some(Box::new(finder));
        self
    }

    /// Load capability used for type names with no registered loader.
    pub fn set_fallback<L: LoadReplicant + 'static>(&mut self, loader: L) -> &mut Self {
        self.fallback = Some(Box::new(loader));
        self
    }

    /// Whether a load capability exists for `type_name`, explicitly or via
    /// the fallback.
    pub fn can_load(&self, type_name: &str) -> bool {
        self.types
            .get(type_name)
            .is_some_and(|entry| entry.loader.is_some())
            || self.fallback.is_some()
    }

    /// Alias names registered for a type
    pub fn aliases(&self, type_name: &str) -> &[String] {
        self.types
            .get(type_name)
            .map(|entry| entry.aliases.as_slice())
            .unwrap_or(&[])
    }

    pub fn loader_mut(&mut self, type_name: &str) -> Option<&mut (dyn LoadReplicant + 'static)> {
        match self.types.get_mut(type_name).and_then(|e| e.loader.as_mut()) {
            Some(loader) => Some(&mut **loader),
            None => self.fallback.as_deref_mut(),
        }
    }

    pub fn finder(&self, type_name: &str) -> Option<&Finder> {
        self.types.get(type_name).and_then(|e| e.finder.as_ref())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
