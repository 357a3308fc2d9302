//! Remote to local identity map built while loading.

use crate::value::RecordId;
use std::collections::HashMap;

/// Append-only mapping from `(type, remote id)` to local id.
///
/// Entries are never overwritten: the first local id registered for a key
/// wins for the rest of the session.
#[derive(Debug, Default)]
pub struct Keymap {
    map: HashMap<String, HashMap<RecordId, RecordId>>,
    len: usize,
}

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `remote_id` of `type_name` is `local_id` here. Returns
    /// false, leaving the existing entry untouched, when the key is already
    /// mapped.
    pub fn register(&mut self, type_name: &str, remote_id: &RecordId, local_id: &RecordId) -> bool {
        let ids = self.map.entry(type_name.to_string()).or_default();
        if let Some(existing) = ids.get(remote_id) {
            if existing != local_id {
                log::debug!(
                    "keymap already maps {}:{} to {}, ignoring {}",
                    type_name,
                    remote_id,
                    existing,
                    local_id
                );
            }
            return false;
        }
        ids.insert(remote_id.clone(), local_id.clone());
        self.len += 1;
        true
    }

    /// Local id for a remote `(type, id)`, if it has been loaded
    pub fn resolve(&self, type_name: &str, remote_id: &RecordId) -> Option<&RecordId> {
        self.map.get(type_name).and_then(|ids| ids.get(remote_id))
    }

    pub fn contains(&self, type_name: &str, remote_id: &RecordId) -> bool {
        self.resolve(type_name, remote_id).is_some()
    }

    /// Number of `(type, remote id)` entries, aliases included
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
