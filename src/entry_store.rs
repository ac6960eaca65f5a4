//! EntryStore: ordered, doubly-linked sequence of entries backed by a
//! generational arena.
//!
//! Nodes live in a `SlotMap`; links are `Position` keys rather than
//! pointers, so a position stays valid while *other* nodes are inserted or
//! removed and becomes dead (never aliased) once its own node is removed.

use crate::error::ValidationError;
use core::iter::FusedIterator;
use slotmap::{new_key_type, SecondaryMap, SlotMap};

new_key_type! {
    /// Stable position of a node inside an `EntryStore`.
    pub(crate) struct Position;
}

#[derive(Clone, Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    /// Hash computed once at insertion; rebuilds never call `K: Hash`.
    pub(crate) hash: u64,
    prev: Option<Position>,
    next: Option<Position>,
}

impl<K, V> Node<K, V> {
    pub(crate) fn into_parts(self) -> (K, V, u64) {
        (self.key, self.value, self.hash)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct EntryStore<K, V> {
    nodes: SlotMap<Position, Node<K, V>>,
    head: Option<Position>,
    tail: Option<Position>,
}

impl<K, V> Default for EntryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> EntryStore<K, V> {
    pub(crate) fn new() -> Self {
        Self::with_capacity(0)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: SlotMap::with_capacity_and_key(capacity),
            head: None,
            tail: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn head(&self) -> Option<Position> {
        self.head
    }

    pub(crate) fn contains(&self, pos: Position) -> bool {
        self.nodes.contains_key(pos)
    }

    pub(crate) fn get(&self, pos: Position) -> Option<&Node<K, V>> {
        self.nodes.get(pos)
    }

    pub(crate) fn get_mut(&mut self, pos: Position) -> Option<&mut Node<K, V>> {
        self.nodes.get_mut(pos)
    }

    pub(crate) fn next(&self, pos: Position) -> Option<Position> {
        self.nodes.get(pos)?.next
    }

    pub(crate) fn prev(&self, pos: Position) -> Option<Position> {
        self.nodes.get(pos)?.prev
    }

    /// Splice a new node immediately before `before`, or append it when
    /// `before` is `None`. `before` must be live.
    pub(crate) fn insert_before(
        &mut self,
        before: Option<Position>,
        key: K,
        value: V,
        hash: u64,
    ) -> Position {
        let prev = match before {
            Some(b) => self.nodes[b].prev,
            None => self.tail,
        };
        let pos = self.nodes.insert(Node {
            key,
            value,
            hash,
            prev,
            next: before,
        });
        match prev {
            Some(p) => self.nodes[p].next = Some(pos),
            None => self.head = Some(pos),
        }
        match before {
            Some(b) => self.nodes[b].prev = Some(pos),
            None => self.tail = Some(pos),
        }
        pos
    }

    /// Unlink and return the node at `pos`. Neighbours keep their positions.
    pub(crate) fn remove(&mut self, pos: Position) -> Option<Node<K, V>> {
        let node = self.nodes.remove(pos)?;
        match node.prev {
            Some(p) => self.nodes[p].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(n) => self.nodes[n].prev = node.prev,
            None => self.tail = node.prev,
        }
        Some(node)
    }

    pub(crate) fn pop_front(&mut self) -> Option<(Position, Node<K, V>)> {
        let pos = self.head?;
        self.remove(pos).map(|node| (pos, node))
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    pub(crate) fn positions(&self) -> Positions<'_, K, V> {
        Positions {
            store: self,
            cursor: self.head,
        }
    }

    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: &self.nodes,
            cursor: self.head,
            remaining: self.nodes.len(),
        }
    }

    /// Mutable traversal in list order.
    ///
    /// The arena only hands out disjoint `&mut` borrows in slot order, so the
    /// borrows are collected once and then replayed in link order. Each call
    /// therefore allocates O(len) scratch space (the link order, a
    /// `SecondaryMap` of borrows and the reordered list) before yielding the
    /// first item.
    pub(crate) fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let order: Vec<Position> = self.positions().collect();
        let mut pending: SecondaryMap<Position, (&K, &mut V)> = self
            .nodes
            .iter_mut()
            .map(|(pos, node)| (pos, (&node.key, &mut node.value)))
            .collect();
        let ordered: Vec<(&K, &mut V)> = order
            .into_iter()
            .filter_map(|pos| pending.remove(pos))
            .collect();
        IterMut {
            inner: ordered.into_iter(),
        }
    }

    /// Walk the links from `head`, checking both directions and the count.
    pub(crate) fn validate_links(&self) -> Result<(), ValidationError> {
        let mut walked = 0usize;
        let mut prev: Option<Position> = None;
        let mut cursor = self.head;
        while let Some(pos) = cursor {
            let Some(node) = self.nodes.get(pos) else {
                return Err(ValidationError::Links(format!(
                    "link after {walked} nodes points at a dead position"
                )));
            };
            if node.prev != prev {
                return Err(ValidationError::Links(format!(
                    "node {walked} has a back link that does not match its predecessor"
                )));
            }
            walked += 1;
            if walked > self.nodes.len() {
                return Err(ValidationError::Links("cycle in forward links".to_string()));
            }
            prev = Some(pos);
            cursor = node.next;
        }
        if self.tail != prev {
            return Err(ValidationError::Links(
                "tail does not match the last reachable node".to_string(),
            ));
        }
        if walked != self.nodes.len() {
            return Err(ValidationError::SizeMismatch {
                counter: self.nodes.len(),
                stored: walked,
            });
        }
        Ok(())
    }
}

/// Positions in list order.
pub(crate) struct Positions<'a, K, V> {
    store: &'a EntryStore<K, V>,
    cursor: Option<Position>,
}

impl<K, V> Iterator for Positions<'_, K, V> {
    type Item = Position;

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.cursor?;
        self.cursor = self.store.next(pos);
        Some(pos)
    }
}

/// Shared entries in list order.
pub(crate) struct Iter<'a, K, V> {
    nodes: &'a SlotMap<Position, Node<K, V>>,
    cursor: Option<Position>,
    remaining: usize,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes,
            cursor: self.cursor,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Position, &'a Node<K, V>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.cursor?;
        let node = self.nodes.get(pos)?;
        self.cursor = node.next;
        self.remaining -= 1;
        Some((pos, node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

pub(crate) struct IterMut<'a, K, V> {
    inner: std::vec::IntoIter<(&'a K, &'a mut V)>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// Owning traversal that unlinks from the front.
pub(crate) struct IntoIter<K, V> {
    store: EntryStore<K, V>,
}

impl<K, V> IntoIterator for EntryStore<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { store: self }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.store
            .pop_front()
            .map(|(_, node)| (node.key, node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.store.len(), Some(self.store.len()))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}
