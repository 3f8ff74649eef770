//! Trie nodes and the path-copying algorithms over them
//!
//! Nodes are never mutated after construction. Every insertion or removal
//! rebuilds only the nodes on the path from the root to the affected leaf;
//! all other subtrees are shared with the previous version through `Arc`.

use std::borrow::Borrow;
use std::sync::Arc;

/// Bits of hash consumed per level
pub(crate) const BITS: u32 = 5;
const MASK: u64 = (1 << BITS) - 1;

pub(crate) enum Node<K, V> {
    Leaf {
        hash: u64,
        key: K,
        value: V,
    },
    /// Entries sharing one full hash code, oldest first
    Collision {
        hash: u64,
        entries: Vec<(K, V)>,
    },
    /// Sparse 32-slot array: bit `i` of `bitmap` is set iff slot `i` is
    /// occupied, and `children` holds the occupied slots in ascending order
    Branch {
        bitmap: u32,
        children: Vec<Arc<Node<K, V>>>,
    },
}

/// Outcome of removing a key from a subtree
pub(crate) enum Removal<K, V> {
    NotFound,
    /// The subtree held only the removed key
    Emptied,
    Replaced(Arc<Node<K, V>>),
}

/// Slot index selected by `hash` at the level starting at bit `shift`
fn chunk(hash: u64, shift: u32) -> u32 {
    (hash.checked_shr(shift).unwrap_or(0) & MASK) as u32
}

/// Position of slot `bit` inside a compressed children array
fn position(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

impl<K, V> Node<K, V> {
    fn is_branch(&self) -> bool {
        matches!(self, Node::Branch { .. })
    }

    pub(crate) fn get<Q>(&self, hash: u64, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut node = self;
        let mut shift = 0;
        loop {
            match node {
                Node::Leaf { hash: h, key: k, value } => {
                    return (*h == hash && k.borrow() == key).then_some(value);
                }
                Node::Collision { hash: h, entries } => {
                    if *h != hash {
                        return None;
                    }
                    return entries.iter().find(|(k, _)| k.borrow() == key).map(|(_, v)| v);
                }
                Node::Branch { bitmap, children } => {
                    let bit: u32 = 1 << chunk(hash, shift);
                    if bitmap & bit == 0 {
                        return None;
                    }
                    node = &children[position(*bitmap, bit)];
                    shift += BITS;
                }
            }
        }
    }
}

impl<K: Eq + Clone, V: Clone> Node<K, V> {
    pub(crate) fn leaf(hash: u64, key: K, value: V) -> Arc<Self> {
        Arc::new(Node::Leaf { hash, key, value })
    }

    /// Insert below a node reached at depth `shift`.
    /// Returns the rebuilt node and whether the key was new.
    pub(crate) fn insert(
        self: &Arc<Self>,
        shift: u32,
        hash: u64,
        key: K,
        value: V,
    ) -> (Arc<Self>, bool) {
        match self.as_ref() {
            Node::Leaf { hash: h, key: k, value: v } => {
                if *h != hash {
                    let leaf = Node::leaf(hash, key, value);
                    return (Node::join(shift, Arc::clone(self), *h, leaf, hash), true);
                }
                if *k == key {
                    return (Node::leaf(hash, key, value), false);
                }
                let entries = vec![(k.clone(), v.clone()), (key, value)];
                (Arc::new(Node::Collision { hash, entries }), true)
            }
            Node::Collision { hash: h, entries } => {
                if *h != hash {
                    let leaf = Node::leaf(hash, key, value);
                    return (Node::join(shift, Arc::clone(self), *h, leaf, hash), true);
                }
                let mut entries = entries.clone();
                let added = match entries.iter().position(|(k, _)| *k == key) {
                    Some(i) => {
                        entries[i].1 = value;
                        false
                    }
                    None => {
                        entries.push((key, value));
                        true
                    }
                };
                (Arc::new(Node::Collision { hash, entries }), added)
            }
            Node::Branch { bitmap, children } => {
                let bit: u32 = 1 << chunk(hash, shift);
                let pos = position(*bitmap, bit);
                let mut children = children.clone();
                let added = if bitmap & bit != 0 {
                    let (child, added) = children[pos].insert(shift + BITS, hash, key, value);
                    children[pos] = child;
                    added
                } else {
                    children.insert(pos, Node::leaf(hash, key, value));
                    true
                };
                let bitmap = bitmap | bit;
                (Arc::new(Node::Branch { bitmap, children }), added)
            }
        }
    }

    /// Build the smallest subtree at depth `shift` holding two leaf-like
    /// nodes with different hashes that agree on every chunk above `shift`.
    fn join(shift: u32, a: Arc<Self>, a_hash: u64, b: Arc<Self>, b_hash: u64) -> Arc<Self> {
        let (ca, cb) = (chunk(a_hash, shift), chunk(b_hash, shift));
        if ca == cb {
            let child = Node::join(shift + BITS, a, a_hash, b, b_hash);
            return Arc::new(Node::Branch {
                bitmap: 1 << ca,
                children: vec![child],
            });
        }
        let children = if ca < cb { vec![a, b] } else { vec![b, a] };
        Arc::new(Node::Branch {
            bitmap: (1 << ca) | (1 << cb),
            children,
        })
    }

    pub(crate) fn remove<Q>(&self, shift: u32, hash: u64, key: &Q) -> Removal<K, V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match self {
            Node::Leaf { hash: h, key: k, .. } => {
                if *h == hash && k.borrow() == key {
                    Removal::Emptied
                } else {
                    Removal::NotFound
                }
            }
            Node::Collision { hash: h, entries } => {
                if *h != hash {
                    return Removal::NotFound;
                }
                let Some(pos) = entries.iter().position(|(k, _)| k.borrow() == key) else {
                    return Removal::NotFound;
                };
                let mut rest = entries.clone();
                rest.remove(pos);
                if rest.len() == 1 {
                    let (k, v) = rest.swap_remove(0);
                    return Removal::Replaced(Node::leaf(*h, k, v));
                }
                Removal::Replaced(Arc::new(Node::Collision { hash: *h, entries: rest }))
            }
            Node::Branch { bitmap, children } => {
                let bit: u32 = 1 << chunk(hash, shift);
                if bitmap & bit == 0 {
                    return Removal::NotFound;
                }
                let pos = position(*bitmap, bit);
                match children[pos].remove(shift + BITS, hash, key) {
                    Removal::NotFound => Removal::NotFound,
                    Removal::Emptied => {
                        if children.len() == 1 {
                            return Removal::Emptied;
                        }
                        let mut rest = children.clone();
                        rest.remove(pos);
                        Removal::Replaced(Node::collapse(bitmap & !bit, rest))
                    }
                    Removal::Replaced(child) => {
                        let mut rest = children.clone();
                        rest[pos] = child;
                        Removal::Replaced(Node::collapse(*bitmap, rest))
                    }
                }
            }
        }
    }

    /// A branch whose only child is a leaf or collision node is replaced by
    /// that child; such nodes carry their full hash and are position-independent.
    fn collapse(bitmap: u32, mut children: Vec<Arc<Self>>) -> Arc<Self> {
        if children.len() == 1 && !children[0].is_branch() {
            return children.swap_remove(0);
        }
        Arc::new(Node::Branch { bitmap, children })
    }
}
