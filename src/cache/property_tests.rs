//! Property-Based Tests for the payload cache
//!
//! Uses proptest to check the base64 round trip through folder preparation,
//! the TTL boundary and skip-pattern exclusion.

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;

use base64::{engine::general_purpose::STANDARD, Engine};
use tempfile::TempDir;

use crate::cache::{CacheEntry, CacheStore};
use crate::error::ToolError;
use crate::tools::prepare::{prepare_folder, PrepareOptions, DEFAULT_MAX_FILE_SIZE};
use crate::tools::SkipReason;

// == Strategies ==
/// File names without separators or a leading dot
fn file_stem_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}"
}

/// Subdirectory (possibly none) to place a file in
fn subdir_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z]{1,6}")
}

fn entry(id: &str, created_at: u64) -> CacheEntry {
    CacheEntry::new(id, "/tmp/src", Vec::new(), BTreeMap::new()).with_created_at(created_at)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any bytes written to a file decode back unchanged from the payload.
    #[test]
    fn prop_base64_round_trip(content in prop::collection::vec(any::<u8>(), 0..4096)) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blob.bin"), &content).unwrap();

        let options = PrepareOptions::new(DEFAULT_MAX_FILE_SIZE, &[]).unwrap();
        let prepared = prepare_folder(dir.path(), &options).unwrap();

        let encoded = prepared.file_contents.get("blob.bin").unwrap();
        prop_assert_eq!(STANDARD.decode(encoded).unwrap(), content.clone());
        prop_assert_eq!(prepared.total_size, content.len() as u64);
    }

    /// An entry is served strictly before the TTL and expired from it on.
    #[test]
    fn prop_ttl_boundary(
        created_at in 1_000_000u64..2_000_000_000_000,
        ttl_secs in 1u64..100_000,
        elapsed in 0u64..200_000_000,
    ) {
        let mut store = CacheStore::new(ttl_secs);
        store.put(entry("folder_x", created_at));

        let result = store.get_at("folder_x", created_at + elapsed);
        if elapsed < ttl_secs * 1000 {
            let found = result.unwrap();
            prop_assert_eq!(found.created_at, created_at);
            prop_assert_eq!(found.source_path.as_str(), "/tmp/src");
        } else {
            let is_expired = matches!(result, Err(ToolError::Expired { .. }));
            prop_assert!(is_expired);
            prop_assert!(store.is_empty());
        }
    }

    /// `*.log` keeps every log file out of the payload and lists it as skipped.
    #[test]
    fn prop_log_files_excluded(
        logs in prop::collection::btree_set((subdir_strategy(), file_stem_strategy()), 1..8),
        others in prop::collection::btree_set((subdir_strategy(), file_stem_strategy()), 0..8),
    ) {
        let dir = TempDir::new().unwrap();
        let mut log_keys = Vec::new();
        for (sub, stem) in &logs {
            let rel = match sub {
                Some(sub) => format!("{}/{}.log", sub, stem),
                None => format!("{}.log", stem),
            };
            let path = dir.path().join(&rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"log line").unwrap();
            log_keys.push(rel);
        }
        for (sub, stem) in &others {
            let rel = match sub {
                Some(sub) => format!("{}/{}.txt", sub, stem),
                None => format!("{}.txt", stem),
            };
            let path = dir.path().join(&rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"data").unwrap();
        }

        let options = PrepareOptions::new(DEFAULT_MAX_FILE_SIZE, &["*.log".to_string()]).unwrap();
        let prepared = prepare_folder(dir.path(), &options).unwrap();
        let summary = prepared.summary();

        prop_assert!(prepared.file_contents.keys().all(|k| !k.ends_with(".log")));
        prop_assert_eq!(prepared.file_contents.len(), others.len());
        prop_assert_eq!(summary.skipped_files, log_keys.len());
        for key in &log_keys {
            let listed = summary.skipped_details.iter().any(|s| {
                s.reason == SkipReason::PatternExcluded && s.path.ends_with(&format!("/{}", key))
            });
            prop_assert!(listed, "{} missing from skipped_details", key);
        }
    }
}
