use super::{ByKeyed, HashNode, Keyed, SparseHashMap, SparseHashSet};
use crate::{
    bit_array,
    error::SparseError,
    memory::{CopyAllocator, GrowableHashMemory, HashMemory, NPOS, calc_bucket_size},
};
use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher, RandomState};
use test_log::test;

type Fixed16<T> = crate::fixed_set!(T, 16);
type Inline4<T> = crate::inline_set!(T, 4);
type FixedMap8<K, V> = crate::fixed_map!(K, V, 8);
type InlineMap2<K, V> = crate::inline_map!(K, V, 2);

/// Hashes integers to themselves, so bucket placement is predictable.
#[derive(Clone, Default)]
struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 = (self.0 << 8) | byte as u64;
        }
    }

    fn write_u32(&mut self, n: u32) {
        self.0 = n as u64;
    }

    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
}

type Plain = BuildHasherDefault<IdentityHasher>;

/// Every live element sits in exactly one chain, the one its cached hash masks to.
fn check_chains<T, M, S, K>(set: &SparseHashSet<T, M, S, K>)
where
    M: HashMemory<HashNode<T>>,
{
    assert_eq!(set.bucket_mask(), set.bucket_size().wrapping_sub(1));
    assert_eq!(
        bit_array::count_ones(set.bits(), set.sparse_size()),
        set.len()
    );

    let mut seen = vec![false; set.sparse_size()];
    for (bucket_index, &head) in set.bucket().iter().enumerate() {
        let mut index = head;
        while index != NPOS {
            assert!(set.has_data(index), "chain {bucket_index} holds dead slot {index}");
            assert!(!seen[index], "slot {index} chained twice");
            seen[index] = true;

            let hash = set.hash_at(index).unwrap();
            assert_eq!(set.bucket_index(hash), bucket_index);
            index = set.chain_next(index);
        }
    }

    for (index, _) in set.indexed() {
        assert!(seen[index], "live slot {index} missing from its chain");
    }
}

#[test]
fn fourth_insert_switches_to_hashed_buckets() {
    let mut set = SparseHashSet::<u32, GrowableHashMemory<HashNode<u32>>, Plain>::new();
    assert_eq!(set.bucket_size(), 0);

    for key in [1, 2, 9] {
        assert!(set.add(key).1);
    }
    assert_eq!(set.capacity(), 3);
    assert_eq!(set.bucket_size(), 1);
    assert_eq!(set.bucket_mask(), 0);
    check_chains(&set);

    set.add(17);
    assert_eq!(set.capacity(), 4);
    assert_eq!(set.bucket_size(), 16);
    assert_eq!(set.bucket_mask(), 15);
    check_chains(&set);

    assert_eq!(set.find(&17), Some(3));
    assert_eq!(set.find(&1), Some(0));
    assert_eq!(set.find(&5), None);
}

#[test]
fn chains_push_to_front() {
    let mut set = SparseHashSet::<u32, GrowableHashMemory<HashNode<u32>>, Plain>::with_capacity(4);
    assert_eq!(set.bucket_size(), 16);

    // 1, 17 and 33 all mask to bucket 1
    let a = set.add(1).0;
    let b = set.add(17).0;
    let c = set.add(33).0;

    assert_eq!(set.bucket()[1], c);
    assert_eq!(set.chain_next(c), b);
    assert_eq!(set.chain_next(b), a);
    assert_eq!(set.chain_next(a), NPOS);

    // a full rebuild threads ascending, so the order is the same
    set.rehash();
    assert_eq!(set.bucket()[1], c);
    assert_eq!(set.chain_next(c), b);
    check_chains(&set);
}

#[test]
fn erase_at_cursor_frees_the_slot() {
    let mut set: SparseHashSet<u32> = (0..10).collect();
    let mut cursor = set.cursor_begin_mut();
    cursor.move_next();
    let index = cursor.index();

    let erased = cursor.erase_and_move_next();
    assert_eq!(set.find(&erased), None);
    assert!(!bit_array::get(set.bits(), index));
    assert_eq!(set.freelist_head(), index);
    assert_eq!(set.len(), 9);
    check_chains(&set);
}

#[test]
fn erase_backward_keeps_chains_valid() {
    let mut set: SparseHashSet<u32> = (0..40).collect();
    set.retain(|value| value % 5 != 0);

    let mut erased = vec![];
    let mut cursor = set.cursor_end_mut();
    while cursor.is_valid() {
        if *cursor.value() % 2 == 0 {
            erased.push(cursor.erase_and_move_prev());
        } else {
            cursor.move_prev();
        }
    }
    assert!(cursor.reach_begin());

    assert_eq!(erased.len(), 16);
    assert!(erased.windows(2).all(|pair| pair[0] > pair[1]));
    assert_eq!(set.len(), 16);
    assert!(erased.iter().all(|value| !set.contains(value)));
    assert!(set.iter().all(|value| value % 2 == 1));
    check_chains(&set);

    let mut cursor = set.cursor_end_mut();
    while cursor.is_valid() {
        cursor.erase_and_move_prev();
    }
    assert!(set.is_empty());
    check_chains(&set);
}

#[test]
#[should_panic(expected = "erasing through invalid cursor")]
fn erase_through_end_cursor_panics() {
    let mut set: SparseHashSet<u32> = (0..4).collect();
    set.cursor_end_overflow_mut().erase_and_move_prev();
}

#[test]
#[should_panic(expected = "dereferencing invalid cursor")]
fn value_at_rend_panics() {
    let set: SparseHashSet<u32> = (0..4).collect();
    let _ = set.cursor_begin_overflow().hash();
}

#[test]
fn freed_bucket_is_rebuilt_by_rehash() {
    let mut set: SparseHashSet<u32> = (0..10).collect();
    set.free_bucket();
    assert_eq!(set.bucket_size(), 0);

    set.rehash();
    assert_eq!(set.bucket_size(), calc_bucket_size(set.capacity()));
    assert_eq!(set.find(&3), Some(3));
    assert_eq!(set.add(3), (3, false));
    assert_eq!(set.iter().filter(|&&value| value == 3).count(), 1);
    assert_eq!(set.len(), 10);
    check_chains(&set);
}

#[test]
fn release_frees_buckets_for_every_strategy() {
    let mut growable: SparseHashSet<u32> = (0..30).collect();
    let mut inline: Inline4<u32> = (0..30).collect();
    let mut fixed: Fixed16<u32> = (0..12).collect();

    growable.release();
    inline.release();
    fixed.release();

    assert_eq!(growable.bucket_size(), 0);
    assert!(inline.memory().is_bucket_inline());
    assert_eq!(fixed.bucket_size(), 16);

    for key in [3, 3, 7] {
        growable.add(key);
        inline.add(key);
        fixed.add(key);
    }
    assert_eq!((growable.len(), inline.len(), fixed.len()), (2, 2, 2));
    check_chains(&growable);
    check_chains(&inline);
    check_chains(&fixed);
}

#[test]
fn cursor_walks_both_ways() {
    let mut set: SparseHashSet<u32> = (0..6).collect();
    set.remove(&0);
    set.remove(&3);
    set.remove(&5);

    let mut seen = vec![];
    let mut cursor = set.cursor_begin();
    while cursor.is_valid() {
        seen.push(*cursor.value());
        assert_eq!(cursor.hash(), set.hash_key(cursor.key()));
        cursor.move_next();
    }
    assert_eq!(seen, vec![1, 2, 4]);
    assert!(cursor.reach_end());

    let mut seen = vec![];
    let mut cursor = set.cursor_end();
    while cursor.is_valid() {
        seen.push(*cursor.get_ref());
        cursor.move_prev();
    }
    assert_eq!(seen, vec![4, 2, 1]);
    assert!(cursor.reach_begin());
}

#[test]
fn removal_keeps_other_indices() {
    let mut set = SparseHashSet::<String>::new();
    let indices: Vec<_> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|s| set.add(s.to_string()).0)
        .collect();

    assert_eq!(set.remove("c"), Some("c".to_string()));
    assert_eq!(set.remove("c"), None);
    assert_eq!(set.find("a"), Some(indices[0]));
    assert_eq!(set.find("e"), Some(indices[4]));

    let (index, inserted) = set.add("f".to_string());
    assert!(inserted);
    assert_eq!(index, indices[2]);
    check_chains(&set);
}

#[test]
fn add_or_assign_replaces_in_place() {
    let mut set = SparseHashSet::<u32>::new();
    let (index, inserted) = set.add(5);
    assert!(inserted);
    assert_eq!(set.add(5), (index, false));
    assert_eq!(set.add_or_assign(5), index);
    assert_eq!(set.try_add(5), Err(SparseError::KeyExists(index)));
    assert_eq!(set.len(), 1);
}

#[test]
fn clear_then_refill_keeps_chains_valid() {
    let mut set: SparseHashSet<u64> = (0..100).collect();
    let buckets = set.bucket_size();

    set.clear();
    assert!(set.is_empty());
    assert_eq!(set.bucket_size(), buckets);
    assert!(set.bucket().iter().all(|&head| head == NPOS));
    assert_eq!(set.find(&7), None);

    set.extend(50..80);
    assert_eq!(set.len(), 30);
    assert!(set.contains(&65));
    check_chains(&set);

    set.release();
    assert_eq!(set.capacity(), 0);
    assert_eq!(set.bucket_size(), 0);
    assert_eq!(set.find(&65), None);
}

#[test]
fn compact_rehashes_moved_elements() {
    let mut set: SparseHashSet<u32> = (0..20).collect();
    set.retain(|value| value % 3 == 0);
    assert_eq!(set.hole_size(), 13);

    assert!(set.compact());
    assert_eq!(set.sparse_size(), 7);
    assert_eq!(set.hole_size(), 0);
    for value in [0, 3, 6, 9, 12, 15, 18] {
        assert!(set.contains(&value), "{value} lost by compact");
    }
    check_chains(&set);

    assert!(!set.compact());
    set.shrink();
    assert_eq!(set.capacity(), 7);
    check_chains(&set);
}

#[test]
fn fixed_set_never_resizes_its_bucket() {
    let mut set = Fixed16::<u32>::new();
    assert_eq!(set.capacity(), 16);
    assert_eq!(set.bucket_size(), 16);

    for key in 0..16 {
        set.add(key * 7);
    }
    assert_eq!(set.bucket_size(), 16);
    assert_eq!(
        set.try_add(1000),
        Err(SparseError::CapacityExceeded { capacity: 16 })
    );
    check_chains(&set);

    set.retain(|key| key % 2 == 0);
    assert_eq!(set.len(), 8);
    check_chains(&set);
}

#[test]
#[should_panic]
fn fixed_set_panics_when_full() {
    let mut set = Fixed16::<u32>::new();
    for key in 0..17 {
        set.add(key);
    }
}

#[test]
fn inline_set_spills_and_returns() {
    let mut set = Inline4::<u32>::new();
    for key in 0..4 {
        set.add(key);
    }
    assert!(set.memory().is_inline());
    assert!(set.memory().is_bucket_inline());
    assert_eq!(set.bucket_size(), 16);

    set.add(4);
    assert!(!set.memory().is_inline());
    assert!(!set.memory().is_bucket_inline());
    check_chains(&set);

    set.remove(&4);
    set.remove(&3);
    set.shrink();
    assert!(set.memory().is_inline());
    assert!(set.contains(&2));
    assert!(!set.contains(&3));
    check_chains(&set);
}

#[test]
fn clone_keeps_every_strategy_searchable() {
    let growable: SparseHashSet<u32> = (0..40).collect();
    let fixed: Fixed16<u32> = (0..10).collect();
    let inline: Inline4<u32> = (0..3).collect();
    let spilled: Inline4<u32> = (0..30).collect();

    let copies = (growable.clone(), fixed.clone(), inline.clone(), spilled.clone());
    assert_eq!(copies.0, growable);
    assert_eq!(copies.1, fixed);
    assert_eq!(copies.2, inline);
    assert_eq!(copies.3, spilled);

    check_chains(&copies.0);
    check_chains(&copies.1);
    check_chains(&copies.2);
    check_chains(&copies.3);
    assert!(copies.3.contains(&29));
}

#[test]
fn copy_allocator_set_matches_default() {
    let mut a = SparseHashSet::<u32>::new();
    let mut b = SparseHashSet::<u32, GrowableHashMemory<HashNode<u32>, CopyAllocator>>::new();

    for key in 0..200 {
        a.add(key * 31);
        b.add(key * 31);
    }
    for key in (0..200).step_by(3) {
        assert_eq!(a.remove(&(key * 31)), b.remove(&(key * 31)));
    }

    assert_eq!(a.len(), b.len());
    assert!(a.iter().all(|key| b.contains(key)));
    check_chains(&b);
}

#[test]
fn equality_ignores_layout() {
    let a: SparseHashSet<u32> = [1, 2, 3].into_iter().collect();
    let mut b: SparseHashSet<u32> = [0, 3, 2, 1].into_iter().collect();
    assert_ne!(a, b);

    b.remove(&0);
    assert_eq!(a, b);
    assert_eq!(format!("{:?}", SparseHashSet::<u32>::from_iter([4])), "{4}");
}

#[derive(Keyed, Clone, Debug, PartialEq)]
struct User {
    #[key]
    name: String,
    age: u32,
}

#[derive(Keyed, Debug)]
struct Tagged<T>(#[key] u64, T);

#[test]
fn derived_key_drives_lookup() {
    let mut users = SparseHashSet::<User, GrowableHashMemory<HashNode<User>>, RandomState, ByKeyed>::new();
    users.add(User {
        name: "ada".into(),
        age: 36,
    });
    let (index, inserted) = users.add(User {
        name: "ada".into(),
        age: 99,
    });
    assert!(!inserted);
    assert_eq!(users.at(index).map(|user| user.age), Some(36));

    users.add_or_assign(User {
        name: "ada".into(),
        age: 37,
    });
    assert_eq!(users.get("ada").map(|user| user.age), Some(37));
    assert_eq!(users.cursor_begin().key(), "ada");

    let tagged = Tagged(9, "nine");
    assert_eq!(*tagged.key(), 9);
    assert_eq!(tagged.1, "nine");
}

#[test]
fn map_insert_get_remove() {
    let mut map = SparseHashMap::<String, u32>::new();
    assert_eq!(map.insert("one".into(), 1), None);
    assert_eq!(map.insert("two".into(), 2), None);
    assert_eq!(map.insert("one".into(), 11), Some(1));

    assert_eq!(map.len(), 2);
    assert_eq!(map.get("one"), Some(&11));
    assert!(map.contains_key("two"));
    assert_eq!(map.get_key_value("two"), Some((&"two".to_string(), &2)));

    *map.get_mut("two").unwrap() += 20;
    assert_eq!(map.remove("two"), Some(22));
    assert_eq!(map.remove("two"), None);
    assert_eq!(map.remove_entry("one"), Some(("one".to_string(), 11)));
    assert!(map.is_empty());
}

#[test]
fn map_entry_helpers() {
    let mut counts = SparseHashMap::<char, usize>::new();
    for c in "mississippi".chars() {
        *counts.get_or_insert_with(c, || 0) += 1;
    }
    assert_eq!(counts.get(&'s'), Some(&4));
    assert_eq!(counts.get(&'m'), Some(&1));

    let index = counts.find(&'p').unwrap();
    assert_eq!(counts.try_insert('p', 0), Err(SparseError::KeyExists(index)));
    assert_eq!(counts.at(index), Some((&'p', &2)));

    counts.retain(|_, n| {
        *n *= 10;
        *n > 10
    });
    let mut keys: Vec<_> = counts.keys().copied().collect();
    keys.sort();
    assert_eq!(keys, vec!['i', 'p', 's']);

    for value in counts.values_mut() {
        *value += 1;
    }
    let mut values: Vec<_> = counts.values().copied().collect();
    values.sort();
    assert_eq!(values, vec![21, 41, 41]);
}

#[test]
fn fixed_and_inline_maps() {
    let mut fixed = FixedMap8::<u32, &str>::new();
    let mut inline = InlineMap2::<u32, &str>::new();

    for (key, value) in [(1, "a"), (2, "b"), (3, "c")] {
        fixed.insert(key, value);
        inline.insert(key, value);
    }

    assert!(!inline.as_set().memory().is_inline());

    let mut cursor = fixed.cursor_end_overflow();
    cursor.move_prev();
    assert_eq!(cursor.key(), &3);
    let mut cursor = inline.cursor_begin_overflow_mut();
    cursor.move_next();
    cursor.value_mut().1 = "A";
    assert_eq!(inline.get(&1), Some(&"A"));
    assert_eq!(fixed.get(&2), inline.get(&2));
    assert_eq!(fixed.clone().into_iter().count(), 3);
    assert_eq!(
        fixed.try_insert(4, "d").and_then(|_| fixed.try_insert(3, "x")),
        Err(SparseError::KeyExists(2))
    );
}

#[test]
fn lookups_go_through_the_set_hasher() {
    let hasher = Plain::default();
    let set: SparseHashSet<u64, GrowableHashMemory<HashNode<u64>>, Plain> = (0..8).collect();

    let mut state = hasher.build_hasher();
    5u64.hash(&mut state);
    assert_eq!(set.hash_key(&5u64), state.finish());
    assert_eq!(set.hash_at(5), Some(5));
    assert_eq!(set.bucket_index(5), 5 & set.bucket_mask());
}

mod properties {
    use super::{Fixed16, Inline4, check_chains};
    use crate::hash::SparseHashSet;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[derive(Clone, Debug)]
    enum Op {
        Add(u8),
        Remove(u8),
        RemoveAt(usize),
        Compact,
        Shrink,
        Clear,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            6 => any::<u8>().prop_map(|key| Op::Add(key % 24)),
            3 => any::<u8>().prop_map(|key| Op::Remove(key % 24)),
            2 => (0usize..24).prop_map(Op::RemoveAt),
            1 => Just(Op::Compact),
            1 => Just(Op::Shrink),
            1 => Just(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn chains_track_a_model_set(ops in prop::collection::vec(op(), 0..200)) {
            let mut model = BTreeSet::new();
            let mut set = SparseHashSet::<u8>::new();

            for op in ops {
                match op {
                    Op::Add(key) => {
                        prop_assert_eq!(set.add(key).1, model.insert(key));
                    }
                    Op::Remove(key) => {
                        prop_assert_eq!(set.remove(&key).is_some(), model.remove(&key));
                    }
                    Op::RemoveAt(index) => {
                        if let Ok(key) = set.try_remove_at(index) {
                            prop_assert!(model.remove(&key));
                        }
                    }
                    Op::Compact => {
                        set.compact();
                    }
                    Op::Shrink => set.shrink(),
                    Op::Clear => {
                        set.clear();
                        model.clear();
                    }
                }

                check_chains(&set);
                prop_assert_eq!(set.len(), model.len());
            }

            prop_assert!(model.iter().all(|key| set.contains(key)));
        }

        #[test]
        fn strategies_agree(keys in prop::collection::vec(0u32..64, 0..16), drop_every in 2usize..5) {
            let mut growable = SparseHashSet::<u32>::new();
            let mut fixed = Fixed16::<u32>::new();
            let mut inline = Inline4::<u32>::new();

            for &key in &keys {
                let a = growable.add(key);
                prop_assert_eq!(fixed.add(key), a);
                prop_assert_eq!(inline.add(key), a);
            }

            for (i, &key) in keys.iter().enumerate() {
                if i % drop_every == 0 {
                    let a = growable.remove(&key);
                    prop_assert_eq!(fixed.remove(&key), a);
                    prop_assert_eq!(inline.remove(&key), a);
                }
            }

            check_chains(&growable);
            check_chains(&fixed);
            check_chains(&inline);
            prop_assert_eq!(
                growable.indexed().collect::<Vec<_>>(),
                fixed.indexed().collect::<Vec<_>>()
            );
            prop_assert_eq!(
                growable.indexed().collect::<Vec<_>>(),
                inline.indexed().collect::<Vec<_>>()
            );
        }
    }
}
