//! BucketDirectory: one slot per hash residue, each naming the contiguous
//! segment of the entry store that hashes there.
//!
//! Segment invariant: all entries whose `hash % capacity` equals a slot's
//! index sit next to each other in the entry store, between the slot's
//! `first` and `last` positions inclusive. The splice and unlink helpers below
//! are the only code that moves segment boundaries.

use crate::entry_store::{EntryStore, Node, Position};
use crate::error::ValidationError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Slot {
    Empty,
    Segment { first: Position, last: Position },
}

#[derive(Clone, Debug)]
pub(crate) struct BucketDirectory {
    slots: Vec<Slot>,
}

impl BucketDirectory {
    /// `capacity` is clamped to at least one slot.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Slot::Empty; capacity.max(1)],
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn slot_of(&self, hash: u64) -> usize {
        (hash % self.slots.len() as u64) as usize
    }

    #[cfg(test)]
    pub(crate) fn get(&self, index: usize) -> Slot {
        self.slots[index]
    }

    pub(crate) fn reset(&mut self) {
        self.slots.fill(Slot::Empty);
    }

    pub(crate) fn occupied(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Segment { .. }))
            .count()
    }

    /// Scan the segment for `hash`, returning the first node accepted by
    /// `is_match`. Only the segment is visited, never the whole store.
    pub(crate) fn find<K, V, F>(
        &self,
        store: &EntryStore<K, V>,
        hash: u64,
        mut is_match: F,
    ) -> Option<Position>
    where
        F: FnMut(&K) -> bool,
    {
        let Slot::Segment { first, last } = self.slots[self.slot_of(hash)] else {
            return None;
        };
        let mut cursor = first;
        loop {
            let node = store.get(cursor)?;
            if node.hash == hash && is_match(&node.key) {
                return Some(cursor);
            }
            if cursor == last {
                return None;
            }
            cursor = store.next(cursor)?;
        }
    }

    /// Splice a new entry at the front of its slot's segment. An empty slot
    /// starts a new segment at the end of the store.
    pub(crate) fn prepend<K, V>(
        &mut self,
        store: &mut EntryStore<K, V>,
        key: K,
        value: V,
        hash: u64,
    ) -> Position {
        let index = self.slot_of(hash);
        let (pos, slot) = match self.slots[index] {
            Slot::Empty => {
                let pos = store.insert_before(None, key, value, hash);
                (pos, Slot::Segment { first: pos, last: pos })
            }
            Slot::Segment { first, last } => {
                let pos = store.insert_before(Some(first), key, value, hash);
                (pos, Slot::Segment { first: pos, last })
            }
        };
        self.slots[index] = slot;
        pos
    }

    /// Repair the owning slot's boundaries, then unlink the node at `pos`.
    ///
    /// Neighbour positions are read before the node leaves the store.
    pub(crate) fn unlink<K, V>(
        &mut self,
        store: &mut EntryStore<K, V>,
        pos: Position,
    ) -> Option<Node<K, V>> {
        let index = self.slot_of(store.get(pos)?.hash);
        let repaired = match self.slots[index] {
            Slot::Empty => {
                debug_assert!(false, "live entry hashes to an empty slot");
                Slot::Empty
            }
            Slot::Segment { first, last } if first == last => {
                debug_assert_eq!(first, pos);
                Slot::Empty
            }
            Slot::Segment { first, last } if first == pos => Slot::Segment {
                first: store.next(pos)?,
                last,
            },
            Slot::Segment { first, last } if last == pos => Slot::Segment {
                first,
                last: store.prev(pos)?,
            },
            interior => interior,
        };
        self.slots[index] = repaired;
        store.remove(pos)
    }

    /// Check every segment against the store: boundaries live, members hash
    /// to the slot, and together the segments cover the whole store.
    pub(crate) fn validate<K, V>(&self, store: &EntryStore<K, V>) -> Result<(), ValidationError> {
        let mut covered = 0usize;
        for (index, slot) in self.slots.iter().enumerate() {
            let Slot::Segment { first, last } = *slot else {
                continue;
            };
            if !store.contains(last) {
                return Err(ValidationError::Slot {
                    slot: index,
                    message: "last boundary is not a live entry".to_string(),
                });
            }
            let mut cursor = Some(first);
            loop {
                let Some(pos) = cursor else {
                    return Err(ValidationError::Slot {
                        slot: index,
                        message: "segment runs off the end of the store".to_string(),
                    });
                };
                let Some(node) = store.get(pos) else {
                    return Err(ValidationError::Slot {
                        slot: index,
                        message: "segment contains a dead position".to_string(),
                    });
                };
                if self.slot_of(node.hash) != index {
                    return Err(ValidationError::Slot {
                        slot: index,
                        message: format!(
                            "segment holds an entry belonging to slot {}",
                            self.slot_of(node.hash)
                        ),
                    });
                }
                covered += 1;
                if covered > store.len() {
                    return Err(ValidationError::CoverageMismatch {
                        covered,
                        stored: store.len(),
                    });
                }
                if pos == last {
                    break;
                }
                cursor = store.next(pos);
            }
        }
        if covered != store.len() {
            return Err(ValidationError::CoverageMismatch {
                covered,
                stored: store.len(),
            });
        }
        Ok(())
    }
}
