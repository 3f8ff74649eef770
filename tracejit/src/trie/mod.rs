//! Persistent Hash Trie
//!
//! An immutable key → value map with structural sharing. Every `set` and
//! `delete` returns a new handle; handles obtained earlier keep observing
//! exactly the bindings they were created with.
//!
//! # Layout
//!
//! The 64-bit hash of a key is consumed five bits at a time, one chunk per
//! level, giving 32-way branching and at most 13 levels:
//!
//! ```text
//! Branch(bitmap, [child...])   sparse slot array, one slot per 5-bit chunk
//! Leaf(hash, key, value)
//! Collision(hash, [(key, value)...])   distinct keys with identical hashes
//! ```
//!
//! An empty map has no root node. Keys are compared by `Eq`; the hash only
//! routes the descent, so keys that share a hash prefix (or a full hash)
//! with a present key are still reported as absent.
//!
//! Nodes live behind `Arc`, so a map is `Send + Sync` whenever its keys and
//! values are, and readers of different versions never need to synchronize.

mod iter;
mod node;

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use rustc_hash::FxBuildHasher;

pub use iter::{Iter, Keys, Values};

use crate::error::TrieError;
use node::{Node, Removal};

/// Immutable hash map with structural sharing
pub struct PersistentMap<K, V, S = FxBuildHasher> {
    root: Option<Arc<Node<K, V>>>,
    len: usize,
    hasher: S,
}

impl<K, V> PersistentMap<K, V> {
    /// Create an empty map using the default (deterministic) hasher
    pub fn new() -> Self {
        Self::with_hasher(FxBuildHasher)
    }
}

impl<K, V, S> PersistentMap<K, V, S> {
    /// Create an empty map routing keys with `hasher`
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            root: None,
            len: 0,
            hasher,
        }
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over `(key, value)` pairs in trie order.
    ///
    /// The order is a deterministic function of the trie's shape; it is
    /// not insertion order in general.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.root, self.len)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Whether two handles share the same root node
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> PersistentMap<K, V, S> {
    /// Look up the value bound to `key`, or `None` if it is absent
    pub fn find<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let root = self.root.as_ref()?;
        root.get(self.hasher.hash_one(key), key)
    }

    /// Look up the value bound to `key`
    pub fn get<Q>(&self, key: &Q) -> Result<&V, TrieError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).ok_or(TrieError::KeyNotFound)
    }

    /// Look up the value bound to `key`, falling back to `default`
    pub fn get_or<'a, Q>(&'a self, key: &Q, default: &'a V) -> &'a V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).unwrap_or(default)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).is_some()
    }
}

impl<K, V, S> PersistentMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Return a new map with `key` bound to `value`
    #[must_use]
    pub fn set(&self, key: K, value: V) -> Self {
        let hash = self.hasher.hash_one(&key);
        let (root, added) = match &self.root {
            Some(root) => root.insert(0, hash, key, value),
            None => (Node::leaf(hash, key, value), true),
        };
        Self {
            root: Some(root),
            len: self.len + usize::from(added),
            hasher: self.hasher.clone(),
        }
    }

    /// Return a new map without `key`
    pub fn delete<Q>(&self, key: &Q) -> Result<Self, TrieError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let root = self.root.as_ref().ok_or(TrieError::KeyNotFound)?;
        let root = match root.remove(0, self.hasher.hash_one(key), key) {
            Removal::NotFound => return Err(TrieError::KeyNotFound),
            Removal::Emptied => None,
            Removal::Replaced(node) => Some(node),
        };
        Ok(Self {
            root,
            len: self.len - 1,
            hasher: self.hasher.clone(),
        })
    }
}

impl<K, V> Default for PersistentMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S: Clone> Clone for PersistentMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            len: self.len,
            hasher: self.hasher.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for PersistentMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> PartialEq for PersistentMap<K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && (self.ptr_eq(other) || self.iter().all(|(k, v)| other.find(k) == Some(v)))
    }
}

impl<K, V> FromIterator<(K, V)> for PersistentMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), |map, (k, v)| map.set(k, v))
    }
}

impl<'a, K, V, S> IntoIterator for &'a PersistentMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::Hasher;

    /// Key whose hash code is chosen by the test and whose equality only
    /// looks at `value`.
    #[derive(Debug, Clone)]
    struct HashKey {
        hash: u64,
        value: &'static str,
    }

    fn hk(hash: u64, value: &'static str) -> HashKey {
        HashKey { hash, value }
    }

    impl Hash for HashKey {
        fn hash<H: Hasher>(&self, state: &mut H) {
            state.write_u64(self.hash);
        }
    }

    impl PartialEq for HashKey {
        fn eq(&self, other: &Self) -> bool {
            self.value == other.value
        }
    }

    impl Eq for HashKey {}

    /// Passes `write_u64` through unchanged so tests control the hash code
    #[derive(Default)]
    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            for b in bytes {
                self.0 = self.0.rotate_left(8) ^ u64::from(*b);
            }
        }

        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }
    }

    #[derive(Clone, Default)]
    struct IdentityState;

    impl BuildHasher for IdentityState {
        type Hasher = IdentityHasher;

        fn build_hasher(&self) -> IdentityHasher {
            IdentityHasher::default()
        }
    }

    fn identity_map<V>() -> PersistentMap<HashKey, V, IdentityState> {
        PersistentMap::with_hasher(IdentityState)
    }

    #[test]
    fn test_empty() {
        let pd: PersistentMap<&str, i32> = PersistentMap::new();
        assert!(pd.is_empty());
        assert_eq!(pd.len(), 0);
        assert_eq!(pd.iter().next(), None);
    }

    #[test]
    fn test_set_and_get() {
        let pd = PersistentMap::new().set("abc", 3);
        assert_eq!(pd.get("abc"), Ok(&3));
        assert!(!pd.is_empty());
    }

    #[test]
    fn test_set_same_key_replaces() {
        let pd = PersistentMap::new().set("abc", 3).set("abc", 10);
        assert_eq!(pd.get("abc"), Ok(&10));
        assert_eq!(pd.len(), 1);

        let same = PersistentMap::new().set("abc", 3).set("abc", 3);
        assert_eq!(same.get("abc"), Ok(&3));
        assert_eq!(same.len(), 1);
    }

    #[test]
    fn test_matching_hash_keys_are_independent() {
        let pd = identity_map()
            .set(hk(0, "a"), 10)
            .set(hk(0, "b"), 20)
            .set(hk(0, "c"), 30);
        assert_eq!(pd.len(), 3);
        assert_eq!(pd.get(&hk(0, "a")), Ok(&10));
        assert_eq!(pd.get(&hk(0, "b")), Ok(&20));
        assert_eq!(pd.get(&hk(0, "c")), Ok(&30));
        assert_eq!(pd.get(&hk(0, "d")), Err(TrieError::KeyNotFound));

        let without_b = pd.delete(&hk(0, "b")).unwrap();
        assert_eq!(without_b.len(), 2);
        assert!(!without_b.contains_key(&hk(0, "b")));
        assert_eq!(without_b.get(&hk(0, "c")), Ok(&30));

        let emptied = without_b
            .delete(&hk(0, "a"))
            .and_then(|m| m.delete(&hk(0, "c")))
            .unwrap();
        assert_eq!(emptied.len(), 0);
        assert!(emptied.is_empty());
        assert_eq!(pd.len(), 3);
    }

    #[test]
    fn test_shared_low_chunk_keys() {
        // 0x17 and 0x37 agree on bits 0-4 and differ in bit 5
        let pd = identity_map().set(hk(0x17, "x"), 1).set(hk(0x37, "y"), 2);
        assert_eq!(pd.get(&hk(0x17, "x")), Ok(&1));
        assert_eq!(pd.get(&hk(0x37, "y")), Ok(&2));

        // absent key in the same low chunk, under both prefixes
        assert!(!pd.contains_key(&hk(0x17, "z")));
        assert!(!pd.contains_key(&hk(0x37, "z")));
        assert!(!pd.contains_key(&hk(0x57, "z")));
        assert_eq!(pd.delete(&hk(0x37, "z")).unwrap_err(), TrieError::KeyNotFound);
    }

    #[test]
    fn test_many_keys() {
        let mut pd = PersistentMap::new();
        for i in 0..25 {
            pd = pd.set(i, i);
        }
        for i in 0..25 {
            assert!(pd.contains_key(&i));
        }
        assert_eq!(pd.len(), 25);
    }

    #[test]
    fn test_get_missing() {
        let pd: PersistentMap<&str, i32> = PersistentMap::new();
        assert_eq!(pd.get("abc"), Err(TrieError::KeyNotFound));
        let pd = pd.set("abc", 10);
        assert_eq!(pd.get("def"), Err(TrieError::KeyNotFound));
    }

    #[test]
    fn test_none_key() {
        let pd: PersistentMap<Option<&str>, i32> = PersistentMap::new();
        assert_eq!(pd.get(&None::<&str>), Err(TrieError::KeyNotFound));
        let pd = pd.set(None, 3);
        assert_eq!(pd.get(&None::<&str>), Ok(&3));
        let pd = pd.set(None, 3).set(Some("a"), 4);
        assert_eq!(pd.get(&None::<&str>), Ok(&3));
        assert_eq!(pd.len(), 2);
        assert_eq!(pd.delete(&None::<&str>).unwrap().len(), 1);
    }

    #[test]
    fn test_get_or_and_find() {
        let pd = PersistentMap::new().set("a", 1);
        assert_eq!(pd.get_or("a", &0), &1);
        assert_eq!(pd.get_or("c", &3), &3);
        assert_eq!(pd.find("b"), None);
    }

    #[test]
    fn test_delete_missing() {
        let empty: PersistentMap<&str, i32> = PersistentMap::new();
        assert_eq!(empty.delete("a").unwrap_err(), TrieError::KeyNotFound);

        let pd = identity_map().set(hk(5, "present"), 1);
        // same full hash, unequal key
        assert_eq!(pd.delete(&hk(5, "absent")).unwrap_err(), TrieError::KeyNotFound);
        // same first chunk, different hash
        assert_eq!(pd.delete(&hk(5 | 1 << 5, "absent")).unwrap_err(), TrieError::KeyNotFound);
    }

    #[test]
    fn test_persistence() {
        let v1 = PersistentMap::new().set("a", 1);
        let v2 = v1.set("b", 2);
        let v3 = v2.delete("a").unwrap();

        assert_eq!(v1.len(), 1);
        assert!(!v1.contains_key("b"));
        assert_eq!(v2.get("a"), Ok(&1));
        assert_eq!(v2.get("b"), Ok(&2));
        assert!(!v3.contains_key("a"));
        assert_eq!(v3.get("b"), Ok(&2));
    }

    #[test]
    fn test_iteration_order_follows_slots() {
        let pd = identity_map().set(hk(2, "b"), 4).set(hk(1, "a"), 3);
        let items: Vec<_> = pd.iter().map(|(k, v)| (k.value, *v)).collect();
        assert_eq!(items, vec![("a", 3), ("b", 4)]);

        // collision chains iterate oldest first
        let chain = identity_map().set(hk(7, "z"), 1).set(hk(7, "y"), 2).set(hk(7, "x"), 3);
        let keys: Vec<_> = chain.keys().map(|k| k.value).collect();
        assert_eq!(keys, vec!["z", "y", "x"]);
        let values: Vec<_> = chain.values().copied().collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let pd: PersistentMap<u32, u32> = (0..100).map(|i| (i, i * 2)).collect();
        let iter = pd.iter();
        assert_eq!(iter.len(), 100);
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        assert_eq!(first, second);
        assert_eq!(pd.iter().collect::<Vec<_>>(), first);
    }

    #[test]
    fn test_delete_collapses_without_ghosts() {
        let pd = identity_map()
            .set(hk(0x01, "a"), 1)
            .set(hk(0x21, "b"), 2)
            .set(hk(0x41, "c"), 3);
        let pd = pd.delete(&hk(0x21, "b")).unwrap().delete(&hk(0x41, "c")).unwrap();
        assert_eq!(pd.len(), 1);
        assert!(!pd.contains_key(&hk(0x21, "b")));
        assert_eq!(pd.get(&hk(0x01, "a")), Ok(&1));
        let pd = pd.delete(&hk(0x01, "a")).unwrap();
        assert!(pd.is_empty());
        assert_eq!(pd.iter().count(), 0);
    }

    #[test]
    fn test_equality_by_contents() {
        let a = PersistentMap::new().set(1, "one").set(2, "two");
        let b = PersistentMap::new().set(2, "two").set(1, "one");
        assert_eq!(a, b);
        assert_ne!(a, b.set(3, "three"));
        assert_eq!(format!("{:?}", PersistentMap::new().set(1, 2)), "{1: 2}");
    }
}
