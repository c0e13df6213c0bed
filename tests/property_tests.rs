//! Property-based tests using proptest
//!
//! These tests validate archive invariants across a wide range of randomly
//! generated inputs and graph shapes.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{empty_registry, shape_registry, Circle, Square};
use graph_archive::{decode, encode, ArchiveReader, ArchiveWriter, ObjectHandle};
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

// Property: Plain values roundtrip unchanged
proptest! {
    #[test]
    fn prop_plain_values_roundtrip(
        numbers in prop::collection::vec(any::<i64>(), 0..200),
        words in prop::collection::btree_map(".{0,16}", any::<u32>(), 0..32),
        flag in any::<bool>(),
        ratio in any::<f64>().prop_filter("comparable", |f| !f.is_nan()),
    ) {
        let registry = empty_registry();
        let value = (numbers, words, (flag, ratio));
        let bytes = encode(&registry, &value).expect("Encoding should not fail");
        let back: (Vec<i64>, BTreeMap<String, u32>, (bool, f64)) =
            decode(&registry, bytes).expect("Decoding should not fail");
        prop_assert_eq!(back, value);
    }
}

// Property: Encoding is deterministic
proptest! {
    #[test]
    fn prop_encoding_deterministic(words in prop::collection::vec(".{0,32}", 0..50)) {
        let registry = empty_registry();
        let first = encode(&registry, &words).expect("Encoding should not fail");
        let second = encode(&registry, &words).expect("Encoding should not fail");
        prop_assert_eq!(first, second);
    }
}

// Property: Aliasing pattern survives; one identity per distinct instance
proptest! {
    #[test]
    fn prop_sharing_pattern_preserved(
        pool_size in 1usize..8,
        picks in prop::collection::vec(0usize..8, 1..64),
    ) {
        let registry = empty_registry();
        let pool: Vec<_> = (0..pool_size)
            .map(|i| Rc::new(RefCell::new(format!("item-{i}"))))
            .collect();
        let picks: Vec<usize> = picks.into_iter().map(|p| p % pool_size).collect();
        let list: Vec<_> = picks.iter().map(|&p| pool[p].clone()).collect();

        let mut writer = ArchiveWriter::new(registry.clone());
        writer.write(&list).expect("write");
        let mut distinct = picks.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(writer.identity_count(), distinct.len());
        let bytes = writer.finalize().expect("finalize");

        let back: Vec<Rc<RefCell<String>>> = decode(&registry, bytes).expect("decode");
        prop_assert_eq!(back.len(), picks.len());
        for i in 0..picks.len() {
            prop_assert_eq!(&*back[i].borrow(), &format!("item-{}", picks[i]));
            for j in 0..picks.len() {
                prop_assert_eq!(Rc::ptr_eq(&back[i], &back[j]), picks[i] == picks[j]);
            }
        }
    }
}

// Property: Polymorphic slots come back as the variant that was written
proptest! {
    #[test]
    fn prop_polymorphic_variants(kinds in prop::collection::vec(any::<(bool, u32)>(), 0..40)) {
        let registry = shape_registry();
        let shapes: Vec<ObjectHandle> = kinds
            .iter()
            .map(|&(circle, n)| {
                if circle {
                    ObjectHandle::new(Circle { radius: n as f64 })
                } else {
                    ObjectHandle::new(Square { side: n, label: n.to_string() })
                }
            })
            .collect();

        let bytes = encode(&registry, &shapes).expect("encode");
        let back: Vec<ObjectHandle> = decode(&registry, bytes).expect("decode");
        prop_assert_eq!(back.len(), kinds.len());
        for (handle, &(circle, n)) in back.iter().zip(&kinds) {
            if circle {
                let c = handle.downcast::<Circle>().expect("circle");
                prop_assert_eq!(c.borrow().radius, n as f64);
            } else {
                let s = handle.downcast::<Square>().expect("square");
                prop_assert_eq!(s.borrow().side, n);
            }
        }
    }
}

// Property: Truncated archives are always rejected, never misread
proptest! {
    #[test]
    fn prop_truncation_rejected(words in prop::collection::vec("[a-z]{0,8}", 1..20), cut in 1usize..64) {
        let registry = empty_registry();
        let bytes = encode(&registry, &words).expect("encode");
        let cut = cut.min(bytes.len());
        let truncated = bytes.slice(..bytes.len() - cut);
        prop_assert!(decode::<Vec<String>>(&registry, truncated).is_err());
    }
}

// Property: Arbitrary bytes never cause a panic
proptest! {
    #[test]
    fn prop_arbitrary_bytes_do_not_panic(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let registry = shape_registry();
        if let Ok(mut reader) = ArchiveReader::open(data, registry) {
            let _ = reader.read_optional_polymorphic();
            let _ = reader.read_identity::<Circle>(0);
        }
    }
}
