// tests/property/roundtrip_test.rs

//! Property-based tests for roundtrip operations
//! Tests that payloads survive the cold fetch, the revalidated warm fetch and
//! the byte store unchanged.

use crate::test_helpers::{Reply, TestContext};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use tablecache::core::key::{CacheKey, DEFAULT_ENDPOINT};
use tablecache::core::storage::{ByteStore, FsByteStore};
use tablecache::{Reference, Variant};
use tokio::io::AsyncReadExt;

fn variant_strategy() -> impl Strategy<Value = Variant> {
    prop_oneof![
        Just(Variant::Csv),
        Just(Variant::Parquet),
        Just(Variant::JsonLines),
    ]
}

fn key(name: &str) -> CacheKey {
    CacheKey::new(
        DEFAULT_ENDPOINT,
        Reference::new(name).unwrap(),
        Variant::Csv,
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_cold_then_warm_fetch_roundtrip(
        name in "[a-z]{1,12}/[a-z0-9_-]{1,24}",
        etag in "\"[A-Za-z0-9]{1,32}\"",
        payload in vec(any::<u8>(), 0..4096),
        variant in variant_strategy()
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = TestContext::new().await;

            ctx.transport.push(Reply::ok(&etag, &payload));
            let cold = ctx.fetch(&name, variant).await.unwrap();
            assert_eq!(cold, payload);
            let writes = ctx.store_writes();

            ctx.transport.push(Reply::not_modified());
            let warm = ctx.fetch(&name, variant).await.unwrap();
            assert_eq!(warm, payload);
            assert_eq!(ctx.store_writes(), writes);
            assert_eq!(ctx.transport.last_request().if_none_match, Some(etag.clone()));
        });
    }

    #[test]
    fn test_byte_store_last_write_wins(
        writes in vec((0usize..4, vec(any::<u8>(), 0..512)), 1..16)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let store = FsByteStore::open(dir.path(), 0).await.unwrap();
            let mut model: HashMap<usize, Vec<u8>> = HashMap::new();

            for (slot, payload) in &writes {
                let mut reader = Cursor::new(payload.clone());
                let size = store.set(&key(&format!("t/{slot}")), &mut reader).await.unwrap();
                assert_eq!(size, payload.len() as u64);
                model.insert(*slot, payload.clone());
            }

            for (slot, expected) in &model {
                let mut stream = store
                    .get(&key(&format!("t/{slot}")))
                    .await
                    .unwrap()
                    .expect("written payload is present");
                let mut actual = Vec::new();
                stream.read_to_end(&mut actual).await.unwrap();
                assert_eq!(&actual, expected);
            }
        });
    }

    #[test]
    fn test_capacity_bound_holds(
        max_entries in 1usize..4,
        names in vec("[a-z]{1,8}", 1..12)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let store = FsByteStore::open(dir.path(), max_entries).await.unwrap();

            for name in &names {
                let mut reader = Cursor::new(name.as_bytes().to_vec());
                store.set(&key(&format!("t/{name}")), &mut reader).await.unwrap();

                let mut present = 0;
                for other in names.iter().collect::<HashSet<_>>() {
                    if store.stat(&key(&format!("t/{other}"))).await.unwrap().is_some() {
                        present += 1;
                    }
                }
                assert!(present <= max_entries);
                assert!(store.stat(&key(&format!("t/{name}"))).await.unwrap().is_some());
            }
        });
    }
}
