// SegmentedHashMap integration suite (public API only).
//
// Each test notes the behavior under test. Invariants exercised:
// - Uniqueness: insert is insert-if-absent; first occurrence wins.
// - Absence: find/erase/get report absence as None/no-op; only `at` errors.
// - Growth: rehashing on `len > capacity` never loses entries.
// - Copy: a clone is a fully independent map.
// - Traversal: iteration yields every present key exactly once.
use segmap::{Config, ConfigError, InsertError, KeyNotFound, SegmentedHashMap, ShrinkPolicy};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::BuildHasherDefault;

// Test: capacity-5 walk-through.
// Verifies: growth past the initial capacity, erase, `at` failure and
// re-insertion through the indexing accessor.
#[test]
fn capacity_five_walkthrough() {
    let mut m: SegmentedHashMap<i32, i32> = SegmentedHashMap::new();
    assert_eq!(m.capacity(), 5);
    for k in 1..=12 {
        m.insert(k, k * 10);
    }
    assert_eq!(m.len(), 12);
    for k in 1..=12 {
        assert!(m.find(&k).is_some(), "key {k} lost during growth");
    }

    m.erase(&7);
    assert!(m.find(&7).is_none());
    assert_eq!(m.len(), 11);
    assert_eq!(m.at(&7), Err(KeyNotFound));

    let v = m.get_or_insert_default(7);
    assert_eq!(*v, 0);
    assert_eq!(m.len(), 12);
    assert_eq!(m.at(&7), Ok(&0));
    assert!(m.validate().is_ok());
}

// Test: construction from a literal list with a repeated key.
// Verifies: first occurrence wins, later duplicate is a no-op.
#[test]
fn literal_list_first_occurrence_wins() {
    let m = SegmentedHashMap::from([("a", 1), ("b", 2), ("a", 3)]);
    assert_eq!(m.len(), 2);
    assert_eq!(m.at(&"a"), Ok(&1));
    assert_eq!(m.at(&"b"), Ok(&2));
}

// Test: construction from an arbitrary iterator and `extend`.
#[test]
fn from_iterator_and_extend() {
    let mut m: SegmentedHashMap<String, usize> =
        ["x", "y", "z"].iter().map(|s| (s.to_string(), s.len())).collect();
    m.extend([("y".to_string(), 99), ("w".to_string(), 4)]);
    assert_eq!(m.len(), 4);
    assert_eq!(m.get("y"), Some(&1));
    assert_eq!(m.get("w"), Some(&4));
}

// Test: distinct inserts grow the size one by one; repeated keys never
// overwrite.
#[test]
fn size_counts_distinct_keys() {
    let mut m = SegmentedHashMap::new();
    let keys = [3u64, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5, 8, 9, 7, 9];
    for (i, k) in keys.iter().enumerate() {
        m.insert(*k, i);
    }
    let distinct: BTreeSet<u64> = keys.iter().copied().collect();
    assert_eq!(m.len(), distinct.len());
    // Value is the index of the first occurrence.
    for k in distinct {
        let first = keys.iter().position(|x| *x == k).unwrap();
        assert_eq!(m[&k], first);
    }
}

// Test: growth correctness for N well beyond the initial capacity.
#[test]
fn many_keys_survive_growth() {
    let mut m = SegmentedHashMap::new();
    for k in 0..5_000u32 {
        m.insert(format!("key-{k}"), k);
    }
    assert_eq!(m.len(), 5_000);
    assert!(m.capacity() >= m.len());
    for k in 0..5_000u32 {
        assert_eq!(m.get(format!("key-{k}").as_str()), Some(&k));
    }
    assert!(m.validate().is_ok());
}

// Test: erase/find/at contract for present and absent keys.
#[test]
fn absence_reporting() {
    let mut m: SegmentedHashMap<&str, i32> = [("a", 1), ("b", 2)].into();
    m.erase("zzz");
    assert_eq!(m.len(), 2);
    m.erase("a");
    assert!(m.find("a").is_none());
    assert!(m.get("a").is_none());
    assert_eq!(m.at("a"), Err(KeyNotFound));
    assert_eq!(m.at("a").unwrap_err().to_string(), "key not found in map");
    assert_eq!(m.at("b"), Ok(&2));
}

// Test: strict insert error surface.
#[test]
fn try_insert_error_message() {
    let mut m = SegmentedHashMap::new();
    m.try_insert(1, "one").unwrap();
    let err = m.try_insert(1, "uno").unwrap_err();
    assert_eq!(err, InsertError::DuplicateKey);
    assert_eq!(err.to_string(), "key already present in map");
}

// Test: copy independence in both directions, and assignment via
// `clone_from`.
#[test]
fn copies_are_independent() {
    let a: SegmentedHashMap<u32, u32> = (0..20).map(|k| (k, k)).collect();
    let mut b = a.clone();
    for k in 0..10 {
        b.erase(&k);
    }
    for k in 100..140 {
        b.insert(k, k);
    }
    assert_eq!(a.len(), 20);
    for k in 0..20 {
        assert_eq!(a.get(&k), Some(&k));
    }
    assert!(a.find(&100).is_none());

    let mut c: SegmentedHashMap<u32, u32> = SegmentedHashMap::new();
    c.clone_from(&b);
    assert_eq!(c, b);
    c.insert(999, 0);
    assert!(b.find(&999).is_none());
}

// Test: iteration yields the present key set, each key once, and the
// three borrowing forms agree.
#[test]
fn iteration_covers_present_keys_once() {
    let mut m: SegmentedHashMap<u32, u32> = (0..64).map(|k| (k, 0)).collect();
    for k in (0..64).step_by(3) {
        m.erase(&k);
    }
    let keys: Vec<u32> = (&m).into_iter().map(|(k, _)| *k).collect();
    let set: BTreeSet<u32> = keys.iter().copied().collect();
    assert_eq!(keys.len(), set.len());
    let expected: BTreeSet<u32> = (0..64).filter(|k| k % 3 != 0).collect();
    assert_eq!(set, expected);

    for (_, v) in &mut m {
        *v = 1;
    }
    assert!(m.values().all(|v| *v == 1));
    let owned: BTreeSet<u32> = m.into_iter().map(|(k, _)| k).collect();
    assert_eq!(owned, expected);
}

// Test: a user-supplied hasher is kept and reported back.
#[test]
fn custom_hasher_round_trip() {
    type Fixed = BuildHasherDefault<DefaultHasher>;
    let mut m: SegmentedHashMap<&str, i32, Fixed> = SegmentedHashMap::with_hasher(Fixed::default());
    m.insert("k", 1);
    let copy = m.clone();
    let _same: &Fixed = copy.hasher();
    assert_eq!(copy.get("k"), Some(&1));

    // Default-constructed maps use `S::default()`.
    let d: SegmentedHashMap<u8, u8, Fixed> = Default::default();
    assert!(d.is_empty());
}

// Test: configuration surface.
#[test]
fn configured_map_honours_policy() {
    let cfg = Config::new()
        .with_initial_capacity(8)
        .with_growth_factor(3.0)
        .with_shrink(ShrinkPolicy::new(0.5, 4));
    let mut m = SegmentedHashMap::with_config(cfg).expect("valid config");
    assert_eq!(m.capacity(), 8);
    for k in 0..9 {
        m.insert(k, ());
    }
    assert_eq!(m.capacity(), 24);
    for k in 0..9 {
        m.erase(&k);
    }
    assert_eq!(m.capacity(), 4);
    m.clear();
    assert_eq!(m.capacity(), 8);

    let bad = SegmentedHashMap::<u8, u8>::with_config(Config::new().with_growth_factor(0.5));
    assert!(matches!(bad, Err(ConfigError::GrowthFactor(_))));
}

// Test: handles outlive unrelated erases and die with their own entry.
#[test]
fn handles_follow_their_entry() {
    let mut m = SegmentedHashMap::new();
    m.reserve(10);
    let ha = m.insert("a", 1);
    let hb = m.insert("b", 2);
    m.erase("b");
    assert_eq!(ha.value(&m), Some(&1));
    assert_eq!(hb.value(&m), None);
    *ha.value_mut(&mut m).unwrap() = 10;
    assert_eq!(m["a"], 10);
    assert_eq!(m.remove_handle(ha), Some(("a", 10)));
    assert!(m.is_empty());
}
