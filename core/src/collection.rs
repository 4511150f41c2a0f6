//! Ordered entity collections.
//!
//! A [`Collection`] is the in-memory authoritative list for one entity type.
//! Every mutation bumps its revision, and mutations that can be undone return
//! an [`Undo`] record so a tentative change can be rolled back to the exact
//! prior state.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// An entity kept in a domain store
///
/// Entities are identified by an id assigned by the backend. Before the
/// backend has answered, an optimistic store shows a provisional entity built
/// from the draft with [`Entity::provisional_id`].
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    /// Identifier type
    type Id: Clone + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Fields needed to create the entity, everything except the id
    type Draft: Clone + fmt::Debug + Send + Sync + 'static;

    /// The entity's id
    fn id(&self) -> &Self::Id;

    /// Build the entity from a draft once an id is known
    fn from_draft(id: Self::Id, draft: Self::Draft) -> Self;

    /// Id shown for a tentatively created entity
    fn provisional_id(sequence: u64) -> Self::Id;
}

/// How to revert a single mutation
#[derive(Clone, Debug)]
pub enum Undo<T: Entity> {
    /// The mutation inserted a new entity; remove it
    Remove {
        /// Id of the inserted entity
        id: T::Id,
    },
    /// The mutation replaced an entity; put the previous value back
    Restore {
        /// Position the entity occupied
        index: usize,
        /// Previous value
        entity: T,
    },
    /// The mutation removed an entity; insert it again
    Reinsert {
        /// Position the entity occupied
        index: usize,
        /// Removed value
        entity: T,
    },
}

impl<T: Entity> Undo<T> {
    /// Id of the entity the mutation touched
    #[must_use]
    pub fn id(&self) -> &T::Id {
        match self {
            Self::Remove { id } => id,
            Self::Restore { entity, .. } | Self::Reinsert { entity, .. } => entity.id(),
        }
    }

    /// The same prior state, restorable whatever the entity looks like now
    ///
    /// A `Reinsert` only acts when the entity is absent. Once a later
    /// mutation takes over the record, the entity may be present again with
    /// another value, so the prior value has to overwrite it.
    #[must_use]
    pub fn into_restore(self) -> Self {
        match self {
            Self::Reinsert { index, entity } => Self::Restore { index, entity },
            other => other,
        }
    }
}

/// Ordered, revisioned list of entities
#[derive(Clone, Debug)]
pub struct Collection<T: Entity> {
    items: Vec<T>,
    revision: u64,
    loaded: bool,
}

impl<T: Entity> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Collection<T> {
    /// Create an empty collection that has never been loaded
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            revision: 0,
            loaded: false,
        }
    }

    /// Current items in order
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of entities
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection holds no entities
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Revision counter, bumped on every effective mutation
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether a full collection has been installed at least once
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Find an entity by id
    #[must_use]
    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Position of an entity by id
    #[must_use]
    pub fn position(&self, id: &T::Id) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    /// Replace the whole collection; no merging with previous content
    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items = items;
        self.loaded = true;
        self.bump();
    }

    /// Insert or replace by id
    ///
    /// An existing entity is replaced at its position, leaving the order of
    /// every other entity untouched. A new entity is appended.
    pub fn upsert(&mut self, item: T) -> Undo<T> {
        let undo = match self.position(item.id()) {
            Some(index) => {
                let previous = std::mem::replace(&mut self.items[index], item);
                Undo::Restore {
                    index,
                    entity: previous,
                }
            },
            None => {
                let id = item.id().clone();
                self.items.push(item);
                Undo::Remove { id }
            },
        };
        self.bump();
        undo
    }

    /// Remove by id
    ///
    /// Returns `None` and leaves the revision untouched when the id is absent.
    pub fn remove(&mut self, id: &T::Id) -> Option<Undo<T>> {
        let index = self.position(id)?;
        let entity = self.items.remove(index);
        self.bump();
        Some(Undo::Reinsert { index, entity })
    }

    /// Swap the entity identified by `id` for `entity`, keeping its position
    ///
    /// Used when a provisional entity is confirmed under its backend id. If
    /// the backend id is already present (a refresh delivered it first), the
    /// provisional entry is dropped and the existing one updated. If `id` is
    /// gone, this is a plain upsert.
    pub fn swap(&mut self, id: &T::Id, entity: T) {
        let Some(index) = self.position(id) else {
            self.upsert(entity);
            return;
        };

        match self.position(entity.id()) {
            Some(existing) if existing != index => {
                self.items.remove(index);
                let existing = if existing > index { existing - 1 } else { existing };
                self.items[existing] = entity;
            },
            _ => self.items[index] = entity,
        }
        self.bump();
    }

    /// Revert a mutation recorded by [`Collection::upsert`] or [`Collection::remove`]
    ///
    /// Positions are clamped to the current length, since other mutations may
    /// have shrunk the collection in the meantime.
    pub fn rollback(&mut self, undo: Undo<T>) {
        match undo {
            Undo::Remove { id } => {
                self.remove(&id);
            },
            Undo::Restore { index, entity } => match self.position(entity.id()) {
                Some(current) => {
                    self.items[current] = entity;
                    self.bump();
                },
                None => self.insert_at(index, entity),
            },
            Undo::Reinsert { index, entity } => {
                if self.position(entity.id()).is_none() {
                    self.insert_at(index, entity);
                }
            },
        }
    }

    /// Immutable snapshot of the current content
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            items: Arc::from(self.items.clone()),
            revision: self.revision,
            loaded: self.loaded,
        }
    }

    fn insert_at(&mut self, index: usize, entity: T) {
        let index = index.min(self.items.len());
        self.items.insert(index, entity);
        self.bump();
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

/// The full collection content at one point in time
///
/// Cheap to clone; dereferences to a slice of entities.
#[derive(Clone, Debug)]
pub struct Snapshot<T> {
    items: Arc<[T]>,
    revision: u64,
    loaded: bool,
}

impl<T> Snapshot<T> {
    /// Empty, not-yet-loaded snapshot
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Arc::from(Vec::new()),
            revision: 0,
            loaded: false,
        }
    }

    /// Revision of the collection this snapshot was taken from
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the store had been loaded when this snapshot was taken
    ///
    /// Subscribers use this to tell "nothing fetched yet" from "fetched, empty".
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Items as a slice
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }
}

impl<T: Entity> Snapshot<T> {
    /// Find an entity by id
    #[must_use]
    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Ids in order
    #[must_use]
    pub fn ids(&self) -> Vec<T::Id> {
        self.items.iter().map(|item| item.id().clone()).collect()
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Deref for Snapshot<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests can unwrap

    use super::*;
    use proptest::prelude::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Item {
        id: String,
        label: String,
    }

    impl Entity for Item {
        type Id = String;
        type Draft = String;

        fn id(&self) -> &String {
            &self.id
        }

        fn from_draft(id: String, label: String) -> Self {
            Self { id, label }
        }

        fn provisional_id(sequence: u64) -> String {
            format!("pending-{sequence}")
        }
    }

    fn item(id: &str, label: &str) -> Item {
        Item::from_draft(id.to_string(), label.to_string())
    }

    fn ids(collection: &Collection<Item>) -> Vec<&str> {
        collection.items().iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn new_collection_is_empty_and_unloaded() {
        let collection = Collection::<Item>::new();
        assert!(collection.is_empty());
        assert!(!collection.is_loaded());
        assert_eq!(collection.revision(), 0);
        assert!(!collection.snapshot().is_loaded());
    }

    #[test]
    fn replace_all_marks_loaded_even_when_empty() {
        let mut collection = Collection::<Item>::new();
        collection.replace_all(Vec::new());
        assert!(collection.is_loaded());
        assert_eq!(collection.revision(), 1);
    }

    #[test]
    fn upsert_existing_replaces_in_place() {
        let mut collection = Collection::new();
        collection.replace_all(vec![item("a", "1"), item("b", "2"), item("c", "3")]);

        collection.upsert(item("b", "changed"));

        assert_eq!(ids(&collection), vec!["a", "b", "c"]);
        assert_eq!(collection.get(&"b".to_string()).map(|i| i.label.as_str()), Some("changed"));
    }

    #[test]
    fn upsert_new_appends() {
        let mut collection = Collection::new();
        collection.replace_all(vec![item("a", "1")]);
        collection.upsert(item("z", "2"));
        assert_eq!(ids(&collection), vec!["a", "z"]);
    }

    #[test]
    fn removing_absent_id_leaves_revision() {
        let mut collection = Collection::new();
        collection.replace_all(vec![item("a", "1")]);
        let revision = collection.revision();

        assert!(collection.remove(&"missing".to_string()).is_none());
        assert_eq!(collection.revision(), revision);
    }

    #[test]
    fn rollback_of_remove_restores_position() {
        let mut collection = Collection::new();
        collection.replace_all(vec![item("a", "1"), item("b", "2"), item("c", "3")]);

        let undo = collection.remove(&"b".to_string());
        assert_eq!(ids(&collection), vec!["a", "c"]);

        collection.rollback(undo.unwrap_or(Undo::Remove { id: String::new() }));
        assert_eq!(ids(&collection), vec!["a", "b", "c"]);
    }

    #[test]
    fn rollback_of_upsert_restores_previous_value() {
        let mut collection = Collection::new();
        collection.replace_all(vec![item("a", "1"), item("b", "2")]);

        let undo = collection.upsert(item("a", "edited"));
        collection.rollback(undo);

        assert_eq!(collection.items(), &[item("a", "1"), item("b", "2")]);
    }

    #[test]
    fn rollback_of_insert_removes_it() {
        let mut collection = Collection::new();
        collection.replace_all(vec![item("a", "1")]);

        let undo = collection.upsert(item("pending-1", "new"));
        collection.rollback(undo);

        assert_eq!(ids(&collection), vec!["a"]);
    }

    #[test]
    fn reinsert_is_clamped_after_shrink() {
        let mut collection = Collection::new();
        collection.replace_all(vec![item("a", "1"), item("b", "2"), item("c", "3")]);

        let undo = collection.remove(&"c".to_string());
        collection.replace_all(vec![item("a", "1")]);
        if let Some(undo) = undo {
            collection.rollback(undo);
        }

        assert_eq!(ids(&collection), vec!["a", "c"]);
    }

    #[test]
    fn restored_removal_overwrites_a_reappeared_entity() {
        let mut collection = Collection::new();
        collection.replace_all(vec![item("a", "1"), item("b", "2")]);

        let undo = collection.remove(&"a".to_string()).unwrap();
        collection.upsert(item("a", "later"));
        assert_eq!(undo.id(), "a");

        collection.rollback(undo.clone());
        assert_eq!(collection.get(&"a".to_string()), Some(&item("a", "later")));

        collection.rollback(undo.into_restore());
        assert_eq!(collection.get(&"a".to_string()), Some(&item("a", "1")));
    }

    #[test]
    fn swap_keeps_position() {
        let mut collection = Collection::new();
        collection.replace_all(vec![item("a", "1")]);
        collection.upsert(item("pending-1", "new"));
        collection.upsert(item("b", "2"));

        collection.swap(&"pending-1".to_string(), item("b42", "new"));

        assert_eq!(ids(&collection), vec!["a", "b42", "b"]);
    }

    #[test]
    fn swap_drops_provisional_when_real_id_already_present() {
        let mut collection = Collection::new();
        collection.replace_all(vec![item("pending-1", "new"), item("b42", "stale")]);

        collection.swap(&"pending-1".to_string(), item("b42", "fresh"));

        assert_eq!(collection.items(), &[item("b42", "fresh")]);
    }

    #[test]
    fn swap_of_missing_provisional_upserts() {
        let mut collection = Collection::new();
        collection.replace_all(vec![item("a", "1")]);

        collection.swap(&"pending-9".to_string(), item("b42", "new"));

        assert_eq!(ids(&collection), vec!["a", "b42"]);
    }

    #[test]
    fn snapshot_is_detached_from_later_mutations() {
        let mut collection = Collection::new();
        collection.replace_all(vec![item("a", "1")]);
        let snapshot = collection.snapshot();

        collection.upsert(item("b", "2"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.ids(), vec!["a".to_string()]);
        assert_eq!(collection.snapshot().revision(), snapshot.revision() + 1);
    }

    fn arb_items() -> impl Strategy<Value = Vec<Item>> {
        prop::collection::vec(("[a-f]{1,3}", "[a-z]{0,4}"), 0..8).prop_map(|pairs| {
            let mut seen = std::collections::HashSet::new();
            pairs
                .into_iter()
                .filter(|(id, _)| seen.insert(id.clone()))
                .map(|(id, label)| Item { id, label })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn replace_all_installs_exactly_the_last_argument(batches in prop::collection::vec(arb_items(), 1..6)) {
            let mut collection = Collection::new();
            for batch in &batches {
                collection.replace_all(batch.clone());
                prop_assert_eq!(collection.items(), batch.as_slice());
            }
            prop_assert_eq!(collection.revision(), batches.len() as u64);
        }

        #[test]
        fn upsert_preserves_order_of_others(items in arb_items(), pick in any::<prop::sample::Index>()) {
            prop_assume!(!items.is_empty());
            let mut collection = Collection::new();
            collection.replace_all(items.clone());

            let index = pick.index(items.len());
            let mut replacement = items[index].clone();
            replacement.label.push('!');
            collection.upsert(replacement.clone());

            let mut expected = items;
            expected[index] = replacement;
            prop_assert_eq!(collection.items(), expected.as_slice());
        }
    }
}
