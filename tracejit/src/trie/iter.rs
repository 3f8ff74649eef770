//! Lazy depth-first iteration over a trie
//!
//! Branch slots are visited in ascending index order and collision entries
//! oldest first, so the order depends only on the shape of the trie.

use std::iter::FusedIterator;
use std::slice;
use std::sync::Arc;

use super::node::Node;

enum Frame<'a, K, V> {
    Children(slice::Iter<'a, Arc<Node<K, V>>>),
    Entries(slice::Iter<'a, (K, V)>),
}

impl<K, V> Clone for Frame<'_, K, V> {
    fn clone(&self) -> Self {
        match self {
            Frame::Children(it) => Frame::Children(it.clone()),
            Frame::Entries(it) => Frame::Entries(it.clone()),
        }
    }
}

/// Iterator over `(&K, &V)` pairs of a [`super::PersistentMap`]
pub struct Iter<'a, K, V> {
    stack: Vec<Frame<'a, K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(root: &'a Option<Arc<Node<K, V>>>, len: usize) -> Self {
        Self {
            stack: vec![Frame::Children(root.as_slice().iter())],
            remaining: len,
        }
    }
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let child = match self.stack.last_mut()? {
                Frame::Entries(entries) => match entries.next() {
                    Some((k, v)) => {
                        self.remaining -= 1;
                        return Some((k, v));
                    }
                    None => None,
                },
                Frame::Children(children) => children.next(),
            };

            match child.map(Arc::as_ref) {
                None => {
                    self.stack.pop();
                }
                Some(Node::Leaf { key, value, .. }) => {
                    self.remaining -= 1;
                    return Some((key, value));
                }
                Some(Node::Collision { entries, .. }) => {
                    self.stack.push(Frame::Entries(entries.iter()));
                }
                Some(Node::Branch { children, .. }) => {
                    self.stack.push(Frame::Children(children.iter()));
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over the keys of a [`super::PersistentMap`]
pub struct Keys<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<K, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// Iterator over the values of a [`super::PersistentMap`]
pub struct Values<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<K, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
