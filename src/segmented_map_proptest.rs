#![cfg(test)]

// Property tests for SegmentedHashMap kept inside the crate so they can call
// the hidden `validate` invariant checker after every step.

use crate::config::{Config, ShrinkPolicy};
use crate::error::{InsertError, KeyNotFound};
use crate::segmented_map::{Handle, SegmentedHashMap};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations so shrinking moves towards earlier keys and
// shorter op lists.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    TryInsert(usize, i32),
    Erase(usize),
    Remove(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    IndexDefault(usize, i32),
    At(usize),
    Rehash(usize),
    Clear,
    CloneFrom,
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::TryInsert(i, v)),
            3 => idx.clone().prop_map(Op::Erase),
            2 => idx.clone().prop_map(Op::Remove),
            2 => idx.clone().prop_map(Op::Find),
            1 => prop_oneof![contains_pool, "[a-z]{0,4}"].prop_map(Op::Contains),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::IndexDefault(i, d)),
            2 => idx.clone().prop_map(Op::At),
            1 => (1usize..40).prop_map(Op::Rehash),
            1 => Just(Op::Clear),
            1 => Just(Op::CloneFrom),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

// State-machine equivalence against std::collections::HashMap.
// Invariants checked after every op:
// - the segment invariant (`validate`);
// - `len`/`is_empty` parity with the model;
// - handles of erased entries never resolve;
// - handles taken since the last rehash/clear/assignment still resolve to
//   their key.
fn run_against_model<S: BuildHasher + Clone>(
    mut sut: SegmentedHashMap<Key, i32, S>,
    pool: &[String],
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    // (handle, key, layout generation when taken)
    let mut live: Vec<(Handle, Key, u64)> = Vec::new();
    let mut stale: Vec<Handle> = Vec::new();
    let mut generation = 0u64;

    for op in ops {
        let capacity_before = sut.capacity();
        let mut fresh: Option<(Handle, Key)> = None;
        match op {
            Op::Insert(i, v) => {
                let k = key_from(pool, i);
                let h = sut.insert(k.clone(), v);
                let expected = *model.entry(k.clone()).or_insert(v);
                prop_assert_eq!(h.value(&sut), Some(&expected), "insert never overwrites");
                fresh = Some((h, k));
            }
            Op::TryInsert(i, v) => {
                let k = key_from(pool, i);
                let already = model.contains_key(&k);
                match sut.try_insert(k.clone(), v) {
                    Ok(h) => {
                        prop_assert!(!already, "try_insert must fail on duplicate");
                        model.insert(k.clone(), v);
                        fresh = Some((h, k));
                    }
                    Err(InsertError::DuplicateKey) => {
                        prop_assert!(already, "duplicate error only when key exists");
                    }
                }
            }
            Op::Erase(i) => {
                let k = key_from(pool, i);
                let h = sut.find(&k);
                sut.erase(&k);
                prop_assert!(sut.find(&k).is_none(), "find after erase must miss");
                prop_assert_eq!(h.is_some(), model.remove(&k).is_some());
                stale.extend(h);
                live.retain(|(_, lk, _)| *lk != k);
            }
            Op::Remove(i) => {
                let k = key_from(pool, i);
                let h = sut.find(&k);
                prop_assert_eq!(sut.remove(k.0.as_str()), model.remove(&k));
                stale.extend(h);
                live.retain(|(_, lk, _)| *lk != k);
            }
            Op::Find(i) => {
                let k = key_from(pool, i);
                let found = sut.find(&k);
                prop_assert_eq!(found.is_some(), model.contains_key(&k));
                if let Some(h) = found {
                    prop_assert_eq!(h.key(&sut), Some(&k));
                    prop_assert_eq!(h.value(&sut), model.get(&k));
                }
            }
            Op::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            Op::Mutate(i, d) => {
                let k = key_from(pool, i);
                if let Some(h) = sut.find(&k) {
                    let v = h.value_mut(&mut sut).expect("fresh handle resolves");
                    *v = v.wrapping_add(d);
                    let mv = model.get_mut(&k).expect("present in model");
                    *mv = mv.wrapping_add(d);
                } else {
                    prop_assert!(!model.contains_key(&k));
                }
            }
            Op::IndexDefault(i, d) => {
                let k = key_from(pool, i);
                let v = sut.get_or_insert_default(k.clone());
                *v = v.wrapping_add(d);
                let mv = model.entry(k).or_default();
                *mv = mv.wrapping_add(d);
            }
            Op::At(i) => {
                let k = key_from(pool, i);
                match model.get(&k) {
                    Some(v) => prop_assert_eq!(sut.at(&k), Ok(v)),
                    None => prop_assert_eq!(sut.at(&k), Err(KeyNotFound)),
                }
            }
            Op::Rehash(capacity) => {
                sut.rehash(capacity);
                prop_assert_eq!(sut.capacity(), capacity);
                generation += 1;
            }
            Op::Clear => {
                sut.clear();
                model.clear();
                stale.extend(live.drain(..).map(|(h, _, _)| h));
                generation += 1;
            }
            Op::CloneFrom => {
                // Same contents, but assignment still retires every handle.
                let snapshot = sut.clone();
                sut.clone_from(&snapshot);
                stale.extend(live.drain(..).map(|(h, _, _)| h));
                generation += 1;
            }
            Op::Iterate => {
                let keys: Vec<Key> = sut.keys().cloned().collect();
                let unique: BTreeSet<Key> = keys.iter().cloned().collect();
                prop_assert_eq!(keys.len(), unique.len(), "each key exactly once");
                let m_keys: BTreeSet<Key> = model.keys().cloned().collect();
                prop_assert_eq!(unique, m_keys);
            }
        }
        // Grow and shrink rebuilds always change the capacity.
        if sut.capacity() != capacity_before {
            generation += 1;
        }
        if let Some((h, k)) = fresh {
            live.push((h, k, generation));
        }

        if let Err(e) = sut.validate() {
            return Err(TestCaseError::fail(format!("invariant broken: {e}")));
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        for h in &stale {
            prop_assert!(!h.is_live(&sut), "erased entry's handle must not resolve");
        }
        for (h, k, taken) in &live {
            if *taken == generation {
                prop_assert_eq!(h.key(&sut), Some(k), "handle survives unrelated ops");
            } else {
                prop_assert!(!h.is_live(&sut), "rehash invalidates handles");
            }
        }
    }
    Ok(())
}

// Collision variant: every key hashes to 0, so the map is one segment.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]

    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_against_model(SegmentedHashMap::new(), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_against_model(SegmentedHashMap::with_hasher(ConstBuildHasher), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_shrink((pool, ops) in arb_scenario()) {
        let cfg = Config::new()
            .with_initial_capacity(3)
            .with_shrink(ShrinkPolicy::new(0.7, 2));
        let sut = SegmentedHashMap::with_config(cfg).expect("valid config");
        run_against_model(sut, &pool, ops)?;
    }

    // Erase followed by re-insert of the same key is observably a no-op for
    // the size and for every probe.
    #[test]
    fn prop_erase_reinsert_equivalence(
        keys in proptest::collection::btree_set(0u16..200, 1..60),
        victim_pick in any::<prop::sample::Index>(),
        probes in proptest::collection::vec(0u16..400, 1..40),
    ) {
        let keys: Vec<u16> = keys.into_iter().collect();
        let victim = keys[victim_pick.index(keys.len())];
        let base: SegmentedHashMap<u16, u16> = keys.iter().map(|&k| (k, k)).collect();
        let mut churned = base.clone();
        churned.erase(&victim);
        churned.insert(victim, victim);

        prop_assert!(churned.validate().is_ok());
        prop_assert_eq!(churned.len(), base.len());
        for p in probes {
            prop_assert_eq!(churned.get(&p), base.get(&p));
        }
    }

    // After `b = a.clone()`, nothing done to `b` is visible through `a`.
    #[test]
    fn prop_clone_independence(
        initial in proptest::collection::vec((0u8..64, any::<i16>()), 0..40),
        edits in proptest::collection::vec((any::<bool>(), 0u8..64), 1..40),
    ) {
        let a: SegmentedHashMap<u8, i16> = initial.into_iter().collect();
        let snapshot: Vec<(u8, i16)> = a.iter().map(|(k, v)| (*k, *v)).collect();
        let mut b = a.clone();
        for (is_insert, k) in edits {
            if is_insert { b.insert(k, -1); } else { b.erase(&k); }
        }
        prop_assert_eq!(a.len(), snapshot.len());
        for (k, v) in snapshot {
            prop_assert_eq!(a.get(&k), Some(&v));
        }
        prop_assert!(a.validate().is_ok());
    }
}
