//! Property-based tests for the undoable object store.
//!
//! Random edit sequences are applied both to the store and to a model that
//! keeps a full copy of the visible objects per snapshot. After every step
//! the visible objects of the store must equal the model, and the changes
//! reported by undo and redo must turn the previous objects into the new ones.
//!
//! Few keys make deletions and re-insertions of one key on different levels
//! frequent.

use std::collections::BTreeMap;

use pcbroute_core::undo::{Changes, Storable, UndoableObjects};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    key: u8,
    value: i32,
}

impl Storable for Entry {
    type Key = u8;

    fn key(&self) -> u8 {
        self.key
    }
}

#[derive(Debug, Clone)]
enum Op {
    Insert(u8, i32),
    Delete(u8),
    Modify(u8, i32),
    SaveAndSet(u8, i32),
    Snapshot,
    PopSnapshot,
    Undo,
    Redo,
}

const KEYS: u8 = 4;

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..KEYS, any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        2 => (0..KEYS).prop_map(Op::Delete),
        3 => (0..KEYS, any::<i32>()).prop_map(|(k, v)| Op::Modify(k, v)),
        2 => (0..KEYS, any::<i32>()).prop_map(|(k, v)| Op::SaveAndSet(k, v)),
        2 => Just(Op::Snapshot),
        1 => Just(Op::PopSnapshot),
        2 => Just(Op::Undo),
        2 => Just(Op::Redo),
    ]
}

type State = BTreeMap<u8, i32>;

#[derive(Default)]
struct Model {
    current: State,
    snapshots: Vec<State>,
    redo: Vec<State>,
}

impl Model {
    fn edit(&mut self) {
        self.redo.clear();
    }
}

fn visible(store: &UndoableObjects<Entry>) -> State {
    store.iter().map(|e| (e.key, e.value)).collect()
}

/// Applies `changes` to `state` the way a dependent index would.
fn apply(state: &mut State, changes: &Changes<Entry>) -> Result<(), TestCaseError> {
    for e in &changes.cancelled {
        prop_assert_eq!(state.remove(&e.key), Some(e.value), "cancelled {:?}", e);
    }
    for e in &changes.restored {
        prop_assert!(state.insert(e.key, e.value).is_none(), "restored twice {:?}", e);
    }
    Ok(())
}

// ═════════════════════════════════════════════════════════════════════════
// Store matches the snapshot model
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(6000))]

    #[test]
    fn store_matches_model(ops in proptest::collection::vec(op(), 1..120)) {
        let mut store = UndoableObjects::new();
        let mut model = Model::default();
        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    store.insert(Entry { key, value });
                    model.edit();
                    model.current.insert(key, value);
                }
                Op::Delete(key) => {
                    let deleted = store.delete(&key);
                    model.edit();
                    prop_assert_eq!(deleted, model.current.remove(&key).is_some());
                }
                Op::Modify(key, value) => {
                    let result = store.modify(&key, |e| e.value = value);
                    model.edit();
                    match model.current.get_mut(&key) {
                        Some(v) => {
                            prop_assert!(result.is_ok());
                            *v = value;
                        }
                        None => prop_assert!(result.is_err()),
                    }
                }
                Op::SaveAndSet(key, value) => {
                    let saved = store.save_for_undo(&key);
                    model.edit();
                    match model.current.get_mut(&key) {
                        Some(v) => {
                            prop_assert!(saved.is_ok());
                            let entry = store.get_mut(&key);
                            prop_assert!(entry.is_some());
                            if let Some(entry) = entry {
                                entry.value = value;
                            }
                            *v = value;
                        }
                        None => prop_assert!(saved.is_err()),
                    }
                }
                Op::Snapshot => {
                    store.generate_snapshot();
                    model.edit();
                    model.snapshots.push(model.current.clone());
                }
                Op::PopSnapshot => {
                    let popped = store.pop_snapshot();
                    model.edit();
                    prop_assert_eq!(popped, model.snapshots.pop().is_some());
                }
                Op::Undo => {
                    let mut mirror = visible(&store);
                    let changes = store.undo();
                    match model.snapshots.pop() {
                        Some(previous) => {
                            prop_assert!(changes.is_some());
                            if let Some(changes) = &changes {
                                apply(&mut mirror, changes)?;
                            }
                            prop_assert_eq!(&mirror, &previous);
                            model.redo.push(std::mem::replace(&mut model.current, previous));
                        }
                        None => prop_assert!(changes.is_none()),
                    }
                }
                Op::Redo => {
                    let mut mirror = visible(&store);
                    let changes = store.redo();
                    match model.redo.pop() {
                        Some(next) => {
                            prop_assert!(changes.is_some());
                            if let Some(changes) = &changes {
                                apply(&mut mirror, changes)?;
                            }
                            prop_assert_eq!(&mirror, &next);
                            model.snapshots.push(std::mem::replace(&mut model.current, next));
                        }
                        None => prop_assert!(changes.is_none()),
                    }
                }
            }
            prop_assert_eq!(visible(&store), model.current.clone());
            prop_assert_eq!(store.undo_level() as usize, model.snapshots.len());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Undo to the bottom restores the base state
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn undo_all_restores_base(
        base in proptest::collection::btree_map(0u8..16, any::<i32>(), 0..16),
        edits in proptest::collection::vec((0u8..16, any::<i32>(), any::<bool>()), 1..40),
    ) {
        let mut store = UndoableObjects::new();
        for (&key, &value) in &base {
            store.insert(Entry { key, value });
        }
        for (key, value, delete) in edits {
            store.generate_snapshot();
            if delete {
                store.delete(&key);
            } else if store.contains(&key) {
                store.modify(&key, |e| e.value = value).unwrap();
            } else {
                store.insert(Entry { key, value });
            }
        }
        while store.undo().is_some() {}
        prop_assert_eq!(visible(&store), base);
        prop_assert!(!store.can_undo());
    }
}
