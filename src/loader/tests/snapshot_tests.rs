//! Discovery snapshot round-trip behavior.

use std::collections::BTreeSet;

use tempfile::TempDir;

use super::{columns, fixture_data_root};
use crate::loader::{DataLoader, DiscoverySnapshot};

#[test]
fn snapshot_round_trip_preserves_discovery_state() {
    let temp_dir = TempDir::new().unwrap();
    let root = fixture_data_root(&temp_dir);
    let blacklist: BTreeSet<String> =
        ["date (year-mon-day)", "time (hour-min-sec)"]
            .iter()
            .map(|s| s.to_string())
            .collect();
    let loader = DataLoader::new(&root, blacklist).unwrap();

    let snapshot = loader.snapshot();
    let restored = DataLoader::from_snapshot(&snapshot);

    assert_eq!(restored.categories(), loader.categories());
    assert_eq!(restored.available_columns(), loader.available_columns());
    assert_eq!(restored.blacklist(), loader.blacklist());
    assert_eq!(restored.catalog().files(), loader.catalog().files());
}

#[test]
fn restored_loader_starts_with_empty_store() {
    let temp_dir = TempDir::new().unwrap();
    let root = fixture_data_root(&temp_dir);
    let mut loader = DataLoader::new(&root, BTreeSet::new()).unwrap();
    loader.load_data("tvws", Some(1), &columns(&["DRSSI"])).unwrap();
    assert!(!loader.store_is_empty());

    let restored = DataLoader::from_snapshot(&loader.snapshot());
    assert!(restored.store_is_empty());
}

#[test]
fn restored_loader_can_load_without_rescanning() {
    let temp_dir = TempDir::new().unwrap();
    let root = fixture_data_root(&temp_dir);
    let loader = DataLoader::new(&root, BTreeSet::new()).unwrap();

    let mut restored = DataLoader::from_snapshot(&loader.snapshot());
    restored.load_data("soil", Some(1), &columns(&["Soil Moisture Value"])).unwrap();
    assert!(restored.has_data("soil", Some(1)));
}

#[test]
fn snapshot_survives_json_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let root = fixture_data_root(&temp_dir);
    let loader = DataLoader::new(&root, BTreeSet::new()).unwrap();

    let snapshot = loader.snapshot();
    let json = snapshot.to_json().unwrap();
    let parsed = DiscoverySnapshot::from_json(&json).unwrap();
    assert_eq!(parsed, snapshot);
}

#[test]
fn refresh_picks_up_new_files() {
    let temp_dir = TempDir::new().unwrap();
    let root = fixture_data_root(&temp_dir);
    let mut loader = DataLoader::new(&root, BTreeSet::new()).unwrap();
    assert_eq!(loader.catalog().len(), 2);

    std::fs::write(
        root.join("tvws").join("tvws_2_b.csv"),
        "Date (Year-Mon-Day),Time (Hour-Min-Sec),DRSSI\n2025-06-06,09-00-02,-88.0\n",
    )
    .unwrap();
    loader.refresh().unwrap();
    assert_eq!(loader.catalog().len(), 3);
}
