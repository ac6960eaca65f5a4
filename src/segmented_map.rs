//! SegmentedHashMap: chained hash map whose chains are contiguous segments
//! of one linked entry store, delimited by an explicit bucket directory.

use crate::bucket_directory::BucketDirectory;
use crate::config::Config;
use crate::entry_store::{self, EntryStore, Node, Position};
use crate::error::{ConfigError, InsertError, KeyNotFound, ValidationError};
use crate::reentrancy::ReentrancyCheck;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ops::Index;
use log::{debug, trace};
use std::collections::hash_map::RandomState;

/// Reference to one entry of a `SegmentedHashMap`.
///
/// A handle survives inserts and erases of *other* entries. It stops
/// resolving once its own entry is erased, and every handle stops resolving
/// after a rehash or clear. Handles are only meaningful for the map that
/// issued them (or a clone taken before either map was rehashed).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle {
    pos: Position,
    epoch: u64,
}

impl Handle {
    pub fn key<'a, K, V, S>(&self, map: &'a SegmentedHashMap<K, V, S>) -> Option<&'a K> {
        map.handle_node(*self).map(|n| &n.key)
    }

    pub fn value<'a, K, V, S>(&self, map: &'a SegmentedHashMap<K, V, S>) -> Option<&'a V> {
        map.handle_node(*self).map(|n| &n.value)
    }

    pub fn value_mut<'a, K, V, S>(
        &self,
        map: &'a mut SegmentedHashMap<K, V, S>,
    ) -> Option<&'a mut V> {
        map.handle_node_mut(*self).map(|n| &mut n.value)
    }

    /// `true` while the handle still resolves in `map`.
    pub fn is_live<K, V, S>(&self, map: &SegmentedHashMap<K, V, S>) -> bool {
        map.handle_node(*self).is_some()
    }
}

/// Entry store plus bucket directory. Everything here works on cached hashes
/// and never calls user code.
#[derive(Clone, Debug)]
struct Table<K, V> {
    store: EntryStore<K, V>,
    directory: BucketDirectory,
    /// Bumped whenever positions are invalidated wholesale.
    epoch: u64,
}

#[derive(Copy, Clone, Debug)]
enum RehashReason {
    Grow,
    Shrink,
    Requested,
}

impl<K, V> Table<K, V> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            store: EntryStore::new(),
            directory: BucketDirectory::new(capacity),
            epoch: 0,
        }
    }

    fn handle(&self, pos: Position) -> Handle {
        Handle {
            pos,
            epoch: self.epoch,
        }
    }

    fn resolve(&self, handle: Handle) -> Option<Position> {
        (handle.epoch == self.epoch && self.store.contains(handle.pos)).then_some(handle.pos)
    }

    fn find<F>(&self, hash: u64, is_match: F) -> Option<Position>
    where
        F: FnMut(&K) -> bool,
    {
        self.directory.find(&self.store, hash, is_match)
    }

    /// Rebuild store and directory at `capacity`, moving entries in current
    /// order. Returns where `track` ended up.
    fn rebuild(
        &mut self,
        capacity: usize,
        track: Option<Position>,
        reason: RehashReason,
    ) -> Option<Position> {
        let old_capacity = self.directory.capacity();
        let len = self.store.len();
        let mut old = std::mem::replace(&mut self.store, EntryStore::with_capacity(len));
        self.directory = BucketDirectory::new(capacity);
        let mut tracked = None;
        while let Some((old_pos, node)) = old.pop_front() {
            let (key, value, hash) = node.into_parts();
            let pos = self.directory.prepend(&mut self.store, key, value, hash);
            if Some(old_pos) == track {
                tracked = Some(pos);
            }
        }
        self.epoch = self.epoch.wrapping_add(1);
        debug!(
            "rehash ({:?}): capacity {} -> {}, {} entries",
            reason,
            old_capacity,
            self.directory.capacity(),
            len
        );
        tracked
    }

    /// Growth check after a successful insert of `pos`.
    fn grow_if_needed(&mut self, config: &Config, pos: Position) -> Position {
        let capacity = self.directory.capacity();
        if self.store.len() <= capacity {
            return pos;
        }
        self.rebuild(config.grown(capacity), Some(pos), RehashReason::Grow)
            .expect("inserted entry must survive the rebuild")
    }

    /// Shrink check after `removed` entries left the store. The policy is
    /// stepped once per removal, so a bulk removal ends at the capacity the
    /// same sequence of single erases would reach, with one rebuild at most.
    fn shrink_after_removals(&mut self, config: &Config, removed: usize) {
        let len = self.store.len();
        let current = self.directory.capacity();
        let mut capacity = current;
        for remaining in (len..len.saturating_add(removed)).rev() {
            if let Some(next) = config.shrunk(capacity, remaining) {
                capacity = next;
            }
        }
        if capacity != current {
            self.rebuild(capacity, None, RehashReason::Shrink);
        }
    }

    fn clear(&mut self, capacity: usize) {
        trace!(
            "clear: dropping {} entries, capacity {} -> {}",
            self.store.len(),
            self.directory.capacity(),
            capacity.max(1)
        );
        self.store.clear();
        self.directory = BucketDirectory::new(capacity);
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Hash map built from a linked entry store and an explicit bucket directory.
///
/// Entries hashing to the same slot form one contiguous segment of the
/// store; the directory records each segment's first and last entry. Lookups
/// scan only the key's segment. Iteration follows store order: segments in
/// the order they were opened, newest entry first inside each segment.
///
/// ```
/// use segmap::SegmentedHashMap;
///
/// let mut m = SegmentedHashMap::new();
/// m.insert("a", 1);
/// m.insert("a", 2); // insert-if-absent: keeps 1
/// assert_eq!(m.at("a"), Ok(&1));
/// *m.get_or_insert_default("b") += 5;
/// assert_eq!(m.get("b"), Some(&5));
/// m.erase("a");
/// assert!(m.at("a").is_err());
/// ```
pub struct SegmentedHashMap<K, V, S = RandomState> {
    hasher: S,
    config: Config,
    table: Table<K, V>,
    reentrancy: ReentrancyCheck,
}

impl<K, V> SegmentedHashMap<K, V, RandomState> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl<K, V, S: Default> Default for SegmentedHashMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> SegmentedHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        let config = Config::default();
        Self {
            hasher,
            table: Table::with_capacity(config.initial_capacity),
            config,
            reentrancy: ReentrancyCheck::new(),
        }
    }

    pub fn with_config_and_hasher(config: Config, hasher: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            hasher,
            table: Table::with_capacity(config.initial_capacity),
            config,
            reentrancy: ReentrancyCheck::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.table.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.store.is_empty()
    }

    /// Number of directory slots.
    pub fn capacity(&self) -> usize {
        self.table.directory.capacity()
    }

    /// Number of slots currently holding a segment.
    pub fn occupied_slots(&self) -> usize {
        self.table.directory.occupied()
    }

    pub fn load_factor(&self) -> f64 {
        self.len() as f64 / self.capacity() as f64
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The hash builder this map was constructed with.
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.store.iter(),
        }
    }

    /// Mutable entries in store order. Unlike `iter`, this gathers the
    /// borrows up front and allocates O(len) scratch space per call; the same
    /// holds for `values_mut` and `&mut` iteration.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.store.iter_mut(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.iter_mut().map(|(_, v)| v)
    }

    /// Handles for every entry, in iteration order.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.table
            .store
            .positions()
            .map(move |pos| self.table.handle(pos))
    }

    /// Remove every entry and reset to the configured initial capacity.
    pub fn clear(&mut self) {
        self.table.clear(self.config.initial_capacity);
    }

    /// Remove every entry and reset to `capacity` slots (at least one).
    pub fn clear_with_capacity(&mut self, capacity: usize) {
        self.table.clear(capacity);
    }

    /// Move every entry out in iteration order. The directory keeps its
    /// capacity; the map is empty as soon as this returns.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        let store = std::mem::take(&mut self.table.store);
        self.table.directory.reset();
        self.table.epoch = self.table.epoch.wrapping_add(1);
        Drain {
            inner: store.into_iter(),
            _map: PhantomData,
        }
    }

    /// Keep only entries for which `keep` returns `true`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let before = self.len();
        let mut cursor = self.table.store.head();
        while let Some(pos) = cursor {
            cursor = self.table.store.next(pos);
            let Some(node) = self.table.store.get_mut(pos) else {
                break;
            };
            if !keep(&node.key, &mut node.value) {
                self.table.directory.unlink(&mut self.table.store, pos);
            }
        }
        let removed = before - self.len();
        self.table.shrink_after_removals(&self.config, removed);
    }

    /// Remove the entry behind `handle`, if it still resolves.
    pub fn remove_handle(&mut self, handle: Handle) -> Option<(K, V)> {
        let node = {
            let _g = self.reentrancy.enter("remove_handle");
            let pos = self.table.resolve(handle)?;
            let node = self.table.directory.unlink(&mut self.table.store, pos)?;
            self.table.shrink_after_removals(&self.config, 1);
            node
        };
        let (key, value, _) = node.into_parts();
        Some((key, value))
    }

    /// Check the segment invariant across store and directory.
    ///
    /// Every mutation upholds these invariants; this exists for tests.
    #[doc(hidden)]
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.table.store.validate_links()?;
        self.table.directory.validate(&self.table.store)
    }

    fn handle_node(&self, handle: Handle) -> Option<&Node<K, V>> {
        let pos = self.table.resolve(handle)?;
        self.table.store.get(pos)
    }

    fn handle_node_mut(&mut self, handle: Handle) -> Option<&mut Node<K, V>> {
        let pos = self.table.resolve(handle)?;
        self.table.store.get_mut(pos)
    }
}

impl<K, V, S> SegmentedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn position_of<Q>(&self, q: &Q) -> Option<Position>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hasher.hash_one(q);
        self.table.find(hash, |k| k.borrow() == q)
    }

    /// Locate `q`. `None` plays the role of the end position.
    pub fn find<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter("find");
        self.position_of(q).map(|pos| self.table.handle(pos))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter("contains_key");
        self.position_of(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter("get");
        let pos = self.position_of(q)?;
        self.table.store.get(pos).map(|n| (&n.key, &n.value))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let pos = {
            let _g = self.reentrancy.enter("get_mut");
            self.position_of(q)?
        };
        self.table.store.get_mut(pos).map(|n| &mut n.value)
    }

    /// Value for `q`, or `KeyNotFound`.
    pub fn at<Q>(&self, q: &Q) -> Result<&V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(q).ok_or(KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, q: &Q) -> Result<&mut V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_mut(q).ok_or(KeyNotFound)
    }

    /// Shared insert path: returns the entry's position and whether it is new.
    /// `make` runs only when the key is absent.
    fn insert_inner<F>(&mut self, key: K, make: F) -> (Position, bool)
    where
        F: FnOnce() -> V,
    {
        let _g = self.reentrancy.enter("insert");
        let hash = self.hasher.hash_one(&key);
        if let Some(pos) = self.table.find(hash, |k| *k == key) {
            return (pos, false);
        }
        let pos = self
            .table
            .directory
            .prepend(&mut self.table.store, key, make(), hash);
        (self.table.grow_if_needed(&self.config, pos), true)
    }

    /// Insert if absent. An existing entry keeps its value; either way the
    /// returned handle refers to the entry stored under `key`.
    pub fn insert(&mut self, key: K, value: V) -> Handle {
        let (pos, _) = self.insert_inner(key, || value);
        self.table.handle(pos)
    }

    /// Insert if absent, building the value lazily.
    pub fn insert_with<F>(&mut self, key: K, default: F) -> Handle
    where
        F: FnOnce() -> V,
    {
        let (pos, _) = self.insert_inner(key, default);
        self.table.handle(pos)
    }

    /// Insert, rejecting a key that is already present.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Handle, InsertError> {
        self.try_insert_with(key, || value)
    }

    pub fn try_insert_with<F>(&mut self, key: K, default: F) -> Result<Handle, InsertError>
    where
        F: FnOnce() -> V,
    {
        match self.insert_inner(key, default) {
            (pos, true) => Ok(self.table.handle(pos)),
            (_, false) => Err(InsertError::DuplicateKey),
        }
    }

    /// Mutable value for `key`, inserting `V::default()` first if absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let (pos, _) = self.insert_inner(key, default);
        &mut self
            .table
            .store
            .get_mut(pos)
            .expect("position returned by insert must be live")
            .value
    }

    /// Remove `q` if present; absent keys are a no-op.
    pub fn erase<Q>(&mut self, q: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _ = self.remove_entry(q);
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        // Key and value drop outside the guard.
        let node = {
            let _g = self.reentrancy.enter("remove");
            let pos = self.position_of(q)?;
            let node = self.table.directory.unlink(&mut self.table.store, pos)?;
            self.table.shrink_after_removals(&self.config, 1);
            node
        };
        let (key, value, _) = node.into_parts();
        Some((key, value))
    }

    /// Rebuild at exactly `capacity` slots (at least one). Invalidates all
    /// handles.
    pub fn rehash(&mut self, capacity: usize) {
        let _g = self.reentrancy.enter("rehash");
        self.table
            .rebuild(capacity.max(1), None, RehashReason::Requested);
    }

    /// Grow so that `additional` more entries fit without a growth rehash.
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.len().saturating_add(additional);
        if needed > self.capacity() {
            self.rehash(needed);
        }
    }
}

impl<K, V, S> Clone for SegmentedHashMap<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    /// Deep copy with its own store and directory, hashing with the
    /// source's hasher.
    fn clone(&self) -> Self {
        Self {
            hasher: self.hasher.clone(),
            config: self.config,
            table: self.table.clone(),
            reentrancy: ReentrancyCheck::new(),
        }
    }

    /// Assignment drops every entry this map held, so every handle it issued
    /// dies: the epoch moves past both its own and the source's.
    fn clone_from(&mut self, source: &Self) {
        let epoch = self.table.epoch.max(source.table.epoch).wrapping_add(1);
        self.hasher.clone_from(&source.hasher);
        self.config = source.config;
        self.table.clone_from(&source.table);
        self.table.epoch = epoch;
    }
}

impl<K, V, S> fmt::Debug for SegmentedHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> PartialEq for SegmentedHashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    /// Same keys with equal values; iteration order is irrelevant.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|ov| v == ov))
    }
}

impl<K, V, S> Eq for SegmentedHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, Q, V, S> Index<&Q> for SegmentedHashMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
{
    type Output = V;

    /// Panics if the key is absent; `at` is the fallible form.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not found in SegmentedHashMap")
    }
}

impl<K, V, S> Extend<(K, V)> for SegmentedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Inserts in order; for repeated keys the first occurrence wins.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for SegmentedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for SegmentedHashMap<K, V, RandomState>
where
    K: Eq + Hash,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// Shared entries in store order.
pub struct Iter<'a, K, V> {
    inner: entry_store::Iter<'a, K, V>,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, n)| (&n.key, &n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Mutable entries in store order.
pub struct IterMut<'a, K, V> {
    inner: entry_store::IterMut<'a, K, V>,
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

/// Owned entries in store order.
pub struct IntoIter<K, V> {
    inner: entry_store::IntoIter<K, V>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}

pub struct Drain<'a, K, V> {
    inner: entry_store::IntoIter<K, V>,
    _map: PhantomData<&'a mut (K, V)>,
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Drain<'_, K, V> {}
impl<K, V> FusedIterator for Drain<'_, K, V> {}

impl<K, V, S> IntoIterator for SegmentedHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.store.into_iter(),
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a SegmentedHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut SegmentedHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
