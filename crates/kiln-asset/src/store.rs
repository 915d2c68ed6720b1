//! In-memory content store

use crate::object::Object;
use kiln_core::ObjectHandle;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Slot {
    /// Claimed by an import in progress; addressable but not readable yet
    Reserved { path: String, type_tag: String },
    Committed(Object),
    Released { path: String },
}

/// Arena owning every materialized object, indexed by object path.
///
/// A path maps to one handle for the lifetime of the store, so
/// re-importing an object overwrites it in place.
#[derive(Debug, Default)]
pub struct ContentStore {
    slots: Vec<Slot>,
    by_path: HashMap<String, ObjectHandle>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a handle for `path` before its object exists. A committed
    /// object stays readable until it is overwritten.
    pub fn reserve(&mut self, path: &str, type_tag: &str) -> ObjectHandle {
        if let Some(&handle) = self.by_path.get(path) {
            let slot = &mut self.slots[handle.index()];
            if !matches!(slot, Slot::Committed(_)) {
                *slot = Slot::Reserved {
                    path: path.to_string(),
                    type_tag: type_tag.to_string(),
                };
            }
            return handle;
        }
        let handle = ObjectHandle::from_index(self.slots.len());
        self.slots.push(Slot::Reserved {
            path: path.to_string(),
            type_tag: type_tag.to_string(),
        });
        self.by_path.insert(path.to_string(), handle);
        handle
    }

    /// Store `object` in a reserved (or previously committed) slot
    pub fn commit(&mut self, handle: ObjectHandle, object: Object) {
        if let Some(slot) = self.slots.get_mut(handle.index()) {
            tracing::debug!(path = %object.path, %handle, "committed object");
            *slot = Slot::Committed(object);
        }
    }

    /// Give up a reservation. Committed objects are left alone.
    pub fn release(&mut self, handle: ObjectHandle) {
        if let Some(slot) = self.slots.get_mut(handle.index()) {
            if let Slot::Reserved { path, .. } = slot {
                let path = std::mem::take(path);
                *slot = Slot::Released { path };
            }
        }
    }

    /// Reserve and commit in one step
    pub fn insert(&mut self, object: Object) -> ObjectHandle {
        let handle = self.reserve(&object.path, &object.type_tag);
        self.commit(handle, object);
        handle
    }

    /// Handle of a committed object
    pub fn find(&self, path: &str) -> Option<ObjectHandle> {
        self.by_path
            .get(path)
            .copied()
            .filter(|h| matches!(self.slots[h.index()], Slot::Committed(_)))
    }

    /// Handle of a reserved or committed object
    pub fn find_live(&self, path: &str) -> Option<ObjectHandle> {
        self.by_path
            .get(path)
            .copied()
            .filter(|h| !matches!(self.slots[h.index()], Slot::Released { .. }))
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&Object> {
        match self.slots.get(handle.index()) {
            Some(Slot::Committed(object)) => Some(object),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut Object> {
        match self.slots.get_mut(handle.index()) {
            Some(Slot::Committed(object)) => Some(object),
            _ => None,
        }
    }

    pub fn get_by_path(&self, path: &str) -> Option<&Object> {
        self.find(path).and_then(|h| self.get(h))
    }

    pub fn is_reserved(&self, handle: ObjectHandle) -> bool {
        matches!(self.slots.get(handle.index()), Some(Slot::Reserved { .. }))
    }

    /// Path a handle was issued for, whatever its state
    pub fn path_of(&self, handle: ObjectHandle) -> Option<&str> {
        match self.slots.get(handle.index())? {
            Slot::Reserved { path, .. } | Slot::Released { path } => Some(path),
            Slot::Committed(object) => Some(&object.path),
        }
    }

    /// Type a reserved or committed slot was claimed for
    pub fn type_of(&self, handle: ObjectHandle) -> Option<&str> {
        match self.slots.get(handle.index())? {
            Slot::Reserved { type_tag, .. } => Some(type_tag),
            Slot::Committed(object) => Some(&object.type_tag),
            Slot::Released { .. } => None,
        }
    }

    /// Committed object paths, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.iter().map(|(_, o)| o.path.as_str()).collect();
        paths.sort_unstable();
        paths
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, &Object)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Committed(object) => Some((ObjectHandle::from_index(i), object)),
            _ => None,
        })
    }

    /// Number of committed objects
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
