//! In-memory replica store
//!
//! Storage applies whatever the coordinator decides: `update` overwrites
//! unconditionally, version numbers are chosen upstream. The only place
//! versions are compared here is `merge`, used when a departing peer
//! forwards its items.

use crate::node::item::{Item, Key, Version};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Default, Clone)]
pub struct Storage {
    items: HashMap<Key, Item>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: Key) -> Option<&Item> {
        self.items.get(&key)
    }

    /// Overwrite (or create) the item at `key`.
    pub fn update(&mut self, key: Key, value: impl Into<String>, version: Version) {
        self.items.insert(key, Item::new(key, value, version));
    }

    /// Every stored item not present in `exclude`.
    pub fn retrieve_all(&self, exclude: &[Item]) -> Vec<Item> {
        let exclude: HashSet<&Item> = exclude.iter().collect();
        let mut items: Vec<Item> = self
            .items
            .values()
            .filter(|item| !exclude.contains(item))
            .cloned()
            .collect();
        items.sort_by_key(|item| item.key);
        items
    }

    /// Drop the given items after handing them off.
    pub fn lose_responsibility_of(&mut self, items: &[Item]) {
        for item in items {
            self.items.remove(&item.key);
        }
    }

    /// Take over items received in a handoff.
    pub fn acquire_responsibility_of(&mut self, items: Vec<Item>) {
        for item in items {
            self.items.insert(item.key, item);
        }
    }

    /// Insert items whose version is newer than the local copy (or that are
    /// missing locally). Returns how many items changed.
    pub fn merge(&mut self, items: impl IntoIterator<Item = Item>) -> usize {
        let mut changed = 0;
        for item in items {
            let newer = self
                .items
                .get(&item.key)
                .map_or(true, |local| item.version > local.version);
            if newer {
                self.items.insert(item.key, item);
                changed += 1;
            }
        }
        changed
    }

    /// All items, ordered by key.
    pub fn items(&self) -> Vec<Item> {
        self.retrieve_all(&[])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, item) in self.items().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_with(items: &[(Key, &str, Version)]) -> Storage {
        let mut storage = Storage::new();
        for (key, value, version) in items {
            storage.update(*key, *value, *version);
        }
        storage
    }

    #[test]
    fn test_update_overwrites_unconditionally() {
        let mut storage = storage_with(&[(5, "a", 3)]);
        storage.update(5, "b", 1);

        let item = storage.get(5).unwrap();
        assert_eq!(item.value, "b");
        assert_eq!(item.version, 1);
        assert!(storage.get(6).is_none());
    }

    #[test]
    fn test_retrieve_all_excludes_known_items() {
        let storage = storage_with(&[(1, "a", 1), (2, "b", 1), (3, "c", 2)]);

        let all = storage.retrieve_all(&[]);
        assert_eq!(all.len(), 3);

        let rest = storage.retrieve_all(&[Item::new(2, "b", 1)]);
        assert_eq!(rest, vec![Item::new(1, "a", 1), Item::new(3, "c", 2)]);

        // A different version of the same key is not the same item
        let rest = storage.retrieve_all(&[Item::new(3, "c", 1)]);
        assert_eq!(rest.len(), 3);
    }

    #[test]
    fn test_handoff_moves_items() {
        let mut from = storage_with(&[(1, "a", 1), (2, "b", 4)]);
        let mut to = Storage::new();

        let handoff = from.retrieve_all(&to.items());
        from.lose_responsibility_of(&handoff);
        to.acquire_responsibility_of(handoff);

        assert!(from.is_empty());
        assert_eq!(to.len(), 2);
        assert_eq!(to.get(2).unwrap().version, 4);
    }

    #[test]
    fn test_merge_keeps_highest_version() {
        let mut storage = storage_with(&[(1, "old", 2), (2, "mine", 5)]);

        let changed = storage.merge(vec![
            Item::new(1, "new", 3),
            Item::new(2, "stale", 4),
            Item::new(3, "fresh", 1),
        ]);

        assert_eq!(changed, 2);
        assert_eq!(storage.get(1).unwrap().value, "new");
        assert_eq!(storage.get(2).unwrap().value, "mine");
        assert_eq!(storage.get(3).unwrap().value, "fresh");
    }

    #[test]
    fn test_display() {
        let storage = storage_with(&[(2, "b", 1), (1, "a", 3)]);
        assert_eq!(storage.to_string(), "[1=\"a\"@v3, 2=\"b\"@v1]");
    }
}
