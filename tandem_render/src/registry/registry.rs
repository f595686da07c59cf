/// Registry - generational table mapping handles to owned resources
///
/// `register` hands back a handle, `get` resolves it, `release` removes the
/// resource in place. Other handles are unaffected by a release, and the freed
/// slot is recycled with a bumped generation.

use slotmap::{Key, SlotMap};

use crate::error::Result;
use crate::render_invalid;

pub struct Registry<K: Key, V> {
    /// Resource kind used in diagnostics ("buffer", "pipeline", ...)
    kind: &'static str,
    slots: SlotMap<K, V>,
}

impl<K: Key, V> Registry<K, V> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: SlotMap::with_key(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn register(&mut self, resource: V) -> K {
        self.slots.insert(resource)
    }

    pub fn get(&self, handle: K) -> Result<&V> {
        if handle.is_null() {
            return Err(render_invalid!("tandem::registry", "Null {} handle", self.kind));
        }
        self.slots.get(handle).ok_or_else(|| {
            render_invalid!(
                "tandem::registry",
                "{} handle {:?} is not live (released or never created)",
                self.kind, handle
            )
        })
    }

    pub fn get_mut(&mut self, handle: K) -> Result<&mut V> {
        let kind = self.kind;
        if handle.is_null() {
            return Err(render_invalid!("tandem::registry", "Null {} handle", kind));
        }
        self.slots.get_mut(handle).ok_or_else(|| {
            render_invalid!(
                "tandem::registry",
                "{} handle {:?} is not live (released or never created)",
                kind, handle
            )
        })
    }

    /// Remove a resource and hand ownership back to the caller
    pub fn release(&mut self, handle: K) -> Result<V> {
        if handle.is_null() {
            return Err(render_invalid!("tandem::registry", "Cannot release a null {} handle", self.kind));
        }
        self.slots.remove(handle).ok_or_else(|| {
            render_invalid!(
                "tandem::registry",
                "{} handle {:?} released twice or never created",
                self.kind, handle
            )
        })
    }

    pub fn contains(&self, handle: K) -> bool {
        self.slots.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots ever allocated (live + free). Stays flat under create/destroy churn.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.slots.iter()
    }

    /// Release every resource matching `predicate`, returning them
    pub fn release_where(&mut self, mut predicate: impl FnMut(&V) -> bool) -> Vec<V> {
        let doomed: Vec<K> = self
            .slots
            .iter()
            .filter(|(_, v)| predicate(v))
            .map(|(k, _)| k)
            .collect();
        doomed
            .into_iter()
            .filter_map(|k| self.slots.remove(k))
            .collect()
    }

    /// Release everything (teardown)
    pub fn drain(&mut self) -> Vec<V> {
        self.slots.drain().map(|(_, v)| v).collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
