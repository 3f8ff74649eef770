//! Property-based tests for the persistent hash trie.
//!
//! A `BTreeMap` serves as the model; every sequence of updates must leave the
//! trie with exactly the model's contents, and older handles must keep theirs.

use std::collections::BTreeMap;

use proptest::prelude::*;
use tracejit::{PersistentMap, TrieError};

#[derive(Debug, Clone)]
enum Update {
    Set(u16, i32),
    Delete(u16),
}

fn update() -> impl Strategy<Value = Update> {
    // small key space so deletes hit existing keys often
    prop_oneof![
        (0u16..64, any::<i32>()).prop_map(|(k, v)| Update::Set(k, v)),
        (0u16..64).prop_map(Update::Delete),
    ]
}

fn sorted(map: &PersistentMap<u16, i32>) -> Vec<(u16, i32)> {
    let mut entries: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
    entries.sort_unstable();
    entries
}

proptest! {
    /// The trie agrees with a model map after any update sequence.
    #[test]
    fn prop_matches_model(updates in prop::collection::vec(update(), 0..200)) {
        let mut map = PersistentMap::new();
        let mut model = BTreeMap::new();

        for update in updates {
            match update {
                Update::Set(k, v) => {
                    map = map.set(k, v);
                    model.insert(k, v);
                }
                Update::Delete(k) => match map.delete(&k) {
                    Ok(next) => {
                        prop_assert!(model.remove(&k).is_some());
                        map = next;
                    }
                    Err(err) => {
                        prop_assert_eq!(err, TrieError::KeyNotFound);
                        prop_assert!(!model.contains_key(&k));
                    }
                },
            }
            prop_assert_eq!(map.len(), model.len());
        }

        let expected: Vec<_> = model.into_iter().collect();
        prop_assert_eq!(sorted(&map), expected);
    }

    /// Updates never change what an older handle sees.
    #[test]
    fn prop_old_handles_unchanged(
        base in prop::collection::btree_map(0u16..512, any::<i32>(), 0..100),
        updates in prop::collection::vec(update(), 1..50),
    ) {
        let original: PersistentMap<u16, i32> = base.iter().map(|(k, v)| (*k, *v)).collect();
        let mut current = original.clone();
        for update in updates {
            current = match update {
                Update::Set(k, v) => current.set(k, v),
                Update::Delete(k) => current.delete(&k).unwrap_or(current),
            };
        }

        let expected: Vec<_> = base.into_iter().collect();
        prop_assert_eq!(sorted(&original), expected);
    }

    /// Setting then deleting a fresh key restores equality with the original.
    #[test]
    fn prop_set_delete_inverse(
        base in prop::collection::btree_map(0u16..512, any::<i32>(), 0..100),
        key in 512u16..1024,
        value in any::<i32>(),
    ) {
        let map: PersistentMap<u16, i32> = base.into_iter().collect();
        let grown = map.set(key, value);
        prop_assert_eq!(grown.get(&key), Ok(&value));

        let shrunk = grown.delete(&key).unwrap();
        prop_assert_eq!(shrunk.len(), map.len());
        prop_assert!(shrunk == map);
    }

    /// Iteration visits every entry exactly once and is repeatable.
    #[test]
    fn prop_iteration_is_stable(keys in prop::collection::btree_set(any::<u16>(), 0..300)) {
        let map: PersistentMap<u16, i32> = keys.iter().map(|&k| (k, i32::from(k))).collect();
        let first: Vec<_> = map.keys().copied().collect();
        let second: Vec<_> = map.keys().copied().collect();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(map.iter().len(), keys.len());

        let mut visited = first;
        visited.sort_unstable();
        let expected: Vec<_> = keys.into_iter().collect();
        prop_assert_eq!(visited, expected);
    }
}
