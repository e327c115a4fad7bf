//! Object store with snapshots for undo and redo.
//!
//! Every stored object is the head of a chain of versions. A version records
//! the undo level at which it was created. Before an object created at a lower
//! level is changed, [`UndoableObjects::save_for_undo`] clones the current
//! state into the chain, so that [`UndoableObjects::undo`] can restore it.
//!
//! Deleted versions which must reappear on undo are kept in one ledger per
//! undo level.

use std::collections::BTreeMap;
use std::fmt;

use slotmap::{new_key_type, SlotMap};

use crate::error::UndoError;

/// Objects which can be stored in [`UndoableObjects`].
///
/// The key identifies an object across all its versions and must not change
/// when the object is modified.
pub trait Storable: Clone {
    type Key: Ord + Clone + fmt::Debug;

    fn key(&self) -> Self::Key;
}

new_key_type! {
    struct VersionId;
}

#[derive(Debug, Clone)]
struct VersionNode<T> {
    object: T,
    /// Undo level at which this version was created.
    level: u32,
    /// The version this one superseded.
    undo: Option<VersionId>,
    /// The version which superseded this one.
    redo: Option<VersionId>,
}

/// Objects which disappeared and reappeared during an undo or redo.
#[derive(Debug, Clone)]
pub struct Changes<T> {
    pub cancelled: Vec<T>,
    pub restored: Vec<T>,
}

impl<T> Changes<T> {
    fn new() -> Self {
        Self {
            cancelled: Vec::new(),
            restored: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cancelled.is_empty() && self.restored.is_empty()
    }
}

pub struct UndoableObjects<T: Storable> {
    /// Current version of each key. May contain versions above the current
    /// level, which stay invisible until they are redone.
    objects: BTreeMap<T::Key, VersionId>,
    versions: SlotMap<VersionId, VersionNode<T>>,
    stack_level: u32,
    /// Entry `i` holds the versions to restore when undoing level `i + 1`.
    deleted_objects_stack: Vec<Vec<VersionId>>,
    redo_possible: bool,
}

impl<T: Storable + fmt::Debug> fmt::Debug for UndoableObjects<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoableObjects")
            .field("objects", &self.len())
            .field("versions", &self.versions.len())
            .field("stack_level", &self.stack_level)
            .field("redo_possible", &self.redo_possible)
            .finish()
    }
}

impl<T: Storable> Default for UndoableObjects<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Storable> UndoableObjects<T> {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            versions: SlotMap::with_key(),
            stack_level: 0,
            deleted_objects_stack: Vec::new(),
            redo_possible: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Returns the visible version of the object with this key.
    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.visible_node(key).map(|node| &node.object)
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.visible_node(key).is_some()
    }

    /// Iterates the visible objects in key order. Objects which exist only on
    /// a redo level are skipped.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.objects
            .values()
            .map(|id| self.node(*id))
            .filter(|node| node.level <= self.stack_level)
            .map(|node| &node.object)
    }

    /// Number of visible objects.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn undo_level(&self) -> u32 {
        self.stack_level
    }

    pub fn can_undo(&self) -> bool {
        self.stack_level > 0
    }

    pub fn can_redo(&self) -> bool {
        (self.stack_level as usize) < self.deleted_objects_stack.len()
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Adds an object at the current level.
    ///
    /// An object with the same key which is still visible is replaced, with
    /// its old state saved for undo. An object with the same key deleted at
    /// the current level comes back as a modification of the deleted version.
    pub fn insert(&mut self, object: T) {
        self.disable_redo();
        let key = object.key();
        if let Some(id) = self.visible_id(&key) {
            log::warn!("UndoableObjects.insert: {key:?} is already stored, replacing it");
            self.save_version(id);
            self.node_mut(id).object = object;
            return;
        }
        let undo = self.take_deleted(self.stack_level, &key);
        let id = self.versions.insert(VersionNode {
            object,
            level: self.stack_level,
            undo,
            redo: None,
        });
        if let Some(undo) = undo {
            self.node_mut(undo).redo = Some(id);
        }
        if let Some(old) = self.objects.insert(key, id) {
            // an invisible leftover of a discarded redo level
            self.release(old);
        }
    }

    /// Removes the object with this key. Returns false if it is not stored.
    pub fn delete(&mut self, key: &T::Key) -> bool {
        self.disable_redo();
        if !self.contains(key) {
            return false;
        }
        let Some(id) = self.objects.remove(key) else {
            return false;
        };
        let VersionNode { level, undo, .. } = *self.node(id);
        let ledger_index = self.stack_level as usize;
        if ledger_index > 0 && level < self.stack_level {
            // the version must be restored on undo
            self.deleted_objects_stack[ledger_index - 1].push(id);
            return true;
        }
        if let Some(undo) = undo {
            // restore the version before the last snapshot on undo
            self.node_mut(undo).redo = None;
            self.deleted_objects_stack[ledger_index - 1].push(undo);
        }
        self.release(id);
        true
    }

    /// Starts a new undo level. A following [`UndoableObjects::undo`] restores
    /// the situation at this point.
    pub fn generate_snapshot(&mut self) {
        self.disable_redo();
        self.deleted_objects_stack.push(Vec::new());
        self.stack_level += 1;
    }

    /// Saves the current state of the object with this key, so that it can be
    /// restored on undo. Must be called before an object created at a lower
    /// level is changed for the first time at the current level.
    pub fn save_for_undo(&mut self, key: &T::Key) -> Result<(), UndoError> {
        self.disable_redo();
        let Some(id) = self.visible_id(key) else {
            log::warn!("UndoableObjects.save_for_undo: {key:?} not found");
            return Err(UndoError::UnknownObject(format!("{key:?}")));
        };
        self.save_version(id);
        Ok(())
    }

    /// Clones the version `id` into its chain unless it was created at the
    /// current level.
    fn save_version(&mut self, id: VersionId) {
        let stack_level = self.stack_level;
        let node = self.node(id);
        if node.level == stack_level {
            // already saved at this level
            return;
        }
        let old_node = VersionNode {
            object: node.object.clone(),
            level: node.level,
            undo: node.undo,
            redo: Some(id),
        };
        let prev = old_node.undo;
        let old_id = self.versions.insert(old_node);
        if let Some(prev) = prev {
            self.node_mut(prev).redo = Some(old_id);
        }
        let node = self.node_mut(id);
        node.undo = Some(old_id);
        node.level = stack_level;
    }

    /// Mutable access to an object created at the current level. The key of
    /// the object must not be changed.
    ///
    /// Returns `None` for objects from lower levels, which must be saved for
    /// undo first; use [`UndoableObjects::modify`] for those.
    pub fn get_mut(&mut self, key: &T::Key) -> Option<&mut T> {
        let id = *self.objects.get(key)?;
        if self.node(id).level != self.stack_level {
            return None;
        }
        self.disable_redo();
        self.current_node_mut(key).map(|node| &mut node.object)
    }

    /// Saves the object for undo and applies `f` to it.
    ///
    /// # Panics
    ///
    /// Panics if `f` changes the key of the object.
    pub fn modify<R>(&mut self, key: &T::Key, f: impl FnOnce(&mut T) -> R) -> Result<R, UndoError> {
        self.save_for_undo(key)?;
        let node = self
            .current_node_mut(key)
            .ok_or_else(|| UndoError::UnknownObject(format!("{key:?}")))?;
        let result = f(&mut node.object);
        assert!(node.object.key() == *key, "UndoableObjects.modify changed the key of {key:?}");
        Ok(result)
    }

    // ── Undo / redo ──────────────────────────────────────────────────

    /// Restores the situation before the last snapshot.
    ///
    /// Returns the objects which were cancelled and restored, or `None` if no
    /// more undo is possible.
    pub fn undo(&mut self) -> Option<Changes<T>> {
        if self.stack_level == 0 {
            log::debug!("UndoableObjects.undo: already at the bottom level");
            return None;
        }
        let mut changes = Changes::new();
        let mut replacements = Vec::new();
        for (key, id) in &self.objects {
            let node = self.node(*id);
            if node.level != self.stack_level {
                continue;
            }
            changes.cancelled.push(node.object.clone());
            // objects without predecessor stay in the map for a redo
            if let Some(undo) = node.undo {
                changes.restored.push(self.node(undo).object.clone());
                replacements.push((key.clone(), *id, undo));
            }
        }
        for (key, id, undo) in replacements {
            self.node_mut(undo).redo = Some(id);
            self.objects.insert(key, undo);
        }

        let ledger = self.deleted_objects_stack[self.stack_level as usize - 1].clone();
        for id in ledger {
            let object = self.node(id).object.clone();
            // a version created again on a higher level is kept for redo
            let displaced = self.objects.insert(object.key(), id);
            self.node_mut(id).redo = displaced;
            changes.restored.push(object);
        }
        self.stack_level -= 1;
        self.redo_possible = true;
        Some(changes)
    }

    /// Restores the situation before the last undo.
    ///
    /// Returns the objects which were cancelled and restored, or `None` if no
    /// more redo is possible.
    pub fn redo(&mut self) -> Option<Changes<T>> {
        if !self.can_redo() {
            log::debug!("UndoableObjects.redo: already at the top level");
            return None;
        }
        self.stack_level += 1;
        let mut changes = Changes::new();
        let mut replacements = Vec::new();
        for (key, id) in &self.objects {
            let node = self.node(*id);
            match node.redo {
                Some(redo) if self.node(redo).level == self.stack_level => {
                    // changed on this level
                    changes.cancelled.push(node.object.clone());
                    changes.restored.push(self.node(redo).object.clone());
                    replacements.push((key.clone(), redo));
                }
                _ if node.level == self.stack_level => {
                    // created on this level
                    changes.restored.push(node.object.clone());
                }
                _ => {}
            }
        }
        for (key, redo) in replacements {
            self.objects.insert(key, redo);
        }

        // delete the objects deleted on this level again
        let ledger = self.deleted_objects_stack[self.stack_level as usize - 1].clone();
        for deleted in ledger {
            let key = self.node(deleted).object.key();
            let Some(current) = self.objects.remove(&key) else {
                log::warn!("UndoableObjects.redo: deleted object {key:?} not found");
                continue;
            };
            if let Some(later) = self.node(current).redo {
                if self.node(later).level > self.stack_level {
                    self.objects.insert(key.clone(), later);
                }
            }
            match changes.restored.iter().position(|object| object.key() == key) {
                Some(pos) => {
                    changes.restored.remove(pos);
                }
                None => changes.cancelled.push(self.node(current).object.clone()),
            }
        }
        Some(changes)
    }

    /// Removes the top snapshot, so that the situation before it cannot be
    /// restored any more. The changes since that snapshot become part of the
    /// level below. Returns false at the bottom level.
    pub fn pop_snapshot(&mut self) -> bool {
        self.disable_redo();
        if self.stack_level == 0 {
            return false;
        }
        let lower = self.stack_level - 1;

        let top_level: Vec<VersionId> = self
            .objects
            .values()
            .copied()
            .filter(|id| self.node(*id).level == self.stack_level)
            .collect();
        for id in top_level {
            self.node_mut(id).level = lower;
            let Some(undo) = self.node(id).undo else {
                // created again after a deletion on the level which becomes the top
                let key = self.node(id).object.key();
                if let Some(deleted) = self.take_deleted(lower, &key) {
                    self.node_mut(id).undo = Some(deleted);
                    self.node_mut(deleted).redo = Some(id);
                }
                continue;
            };
            // merge with a version saved on the level which becomes the top
            if self.node(undo).level < lower {
                continue;
            }
            let before = self.node(undo).undo;
            if let Some(before) = before {
                self.node_mut(before).redo = Some(id);
            }
            self.node_mut(id).undo = before;
            self.versions.remove(undo);
        }

        let from_delete_list = self.deleted_objects_stack.pop().unwrap_or_default();
        for deleted in from_delete_list {
            let VersionNode { level, undo, .. } = *self.node(deleted);
            if level < lower {
                self.push_deleted(lower, deleted);
                continue;
            }
            // created on the level which becomes the top
            if let Some(undo) = undo {
                self.node_mut(undo).redo = None;
                self.push_deleted(lower, undo);
            }
            self.release(deleted);
        }
        self.stack_level = lower;
        true
    }

    /// Discards the redo branch. Called by every mutation except undo and redo.
    fn disable_redo(&mut self) {
        if !self.redo_possible {
            return;
        }
        self.redo_possible = false;
        self.deleted_objects_stack.truncate(self.stack_level as usize);

        let stack_level = self.stack_level;
        let mut discarded = Vec::new();
        let mut redo_chains = Vec::new();
        self.objects.retain(|_, id| {
            let Some(node) = self.versions.get_mut(*id) else {
                return false;
            };
            if node.level > stack_level {
                discarded.push(*id);
                return false;
            }
            if let Some(redo) = node.redo.take() {
                redo_chains.push(redo);
            }
            true
        });
        // deleted versions may link across the deletion into the discarded levels
        for id in self.deleted_objects_stack.iter().flatten() {
            self.versions[*id].redo = None;
        }
        for id in discarded.into_iter().chain(redo_chains) {
            self.release(id);
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn visible_node(&self, key: &T::Key) -> Option<&VersionNode<T>> {
        self.visible_id(key).map(|id| self.node(id))
    }

    fn visible_id(&self, key: &T::Key) -> Option<VersionId> {
        let id = *self.objects.get(key)?;
        (self.node(id).level <= self.stack_level).then_some(id)
    }

    fn current_node_mut(&mut self, key: &T::Key) -> Option<&mut VersionNode<T>> {
        let id = *self.objects.get(key)?;
        self.versions.get_mut(id)
    }

    /// Removes a version deleted at `level` from its ledger and returns it, so
    /// that a new object with its key continues its chain.
    fn take_deleted(&mut self, level: u32, key: &T::Key) -> Option<VersionId> {
        let index = (level as usize).checked_sub(1)?;
        let ledger = &self.deleted_objects_stack[index];
        let pos = ledger
            .iter()
            .position(|id| self.node(*id).object.key() == *key)?;
        Some(self.deleted_objects_stack[index].remove(pos))
    }

    fn push_deleted(&mut self, level: u32, id: VersionId) {
        match (level as usize).checked_sub(1) {
            Some(index) => self.deleted_objects_stack[index].push(id),
            // nothing to restore below level 0
            None => self.release(id),
        }
    }

    /// Releases a version together with the newer versions of its redo chain.
    fn release(&mut self, id: VersionId) {
        let mut next = Some(id);
        while let Some(curr) = next {
            debug_assert!(
                !self.objects.values().any(|live| *live == curr),
                "UndoableObjects: releasing a live version"
            );
            next = self.versions.remove(curr).and_then(|node| node.redo);
        }
    }

    fn node(&self, id: VersionId) -> &VersionNode<T> {
        self.versions
            .get(id)
            .expect("UndoableObjects: dangling version link")
    }

    fn node_mut(&mut self, id: VersionId) -> &mut VersionNode<T> {
        self.versions
            .get_mut(id)
            .expect("UndoableObjects: dangling version link")
    }
}
