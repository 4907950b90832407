// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the parameter store

use framefx::constants::RenderMode;
use framefx::params::{
    DurableStore, FieldSpec, FileStore, MemoryStore, ParameterField, ParameterReader,
    ParameterType, ParameterValue, storage_key,
};
use framefx::registry;
use framefx::{FilterType, ParameterOverrides, ParameterStore};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn pixellate_id() -> uuid::Uuid {
    registry::descriptor(FilterType::PixellateMetal).id
}

#[test]
fn test_seeded_defaults_read_back_exactly() {
    let store = ParameterStore::in_memory();
    let id = pixellate_id();
    store.seed_defaults(
        id,
        &[
            FieldSpec::new(ParameterField::BlockWidth, ParameterValue::Int(20)),
            FieldSpec::new(ParameterField::BlockHeight, ParameterValue::Int(20)),
            FieldSpec::new(ParameterField::MergeWithBackground, ParameterValue::Bool(false)),
        ],
    );

    assert_eq!(store.int(id, ParameterField::BlockWidth), 20);
    assert_eq!(store.int(id, ParameterField::BlockHeight), 20);
    assert!(!store.bool(id, ParameterField::MergeWithBackground));

    let data = store.get(id, ParameterField::BlockWidth).unwrap();
    assert_eq!(data.kind, ParameterType::Int);
    assert_eq!(data.value, Some(ParameterValue::Int(20)));
}

#[test]
fn test_set_rejects_wrong_type() {
    let store = ParameterStore::in_memory();
    let id = pixellate_id();
    assert!(store
        .set(id, ParameterField::BlockWidth, ParameterValue::Bool(true))
        .is_err());
    assert!(store.get(id, ParameterField::BlockWidth).unwrap().is_absent());
}

#[test]
fn test_values_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parameters.json");
    let id = pixellate_id();

    {
        let store = ParameterStore::new(Arc::new(FileStore::open(&path).unwrap()));
        store
            .set(id, ParameterField::BlockWidth, ParameterValue::Int(33))
            .unwrap();
        store.flush().unwrap();
    }

    let durable = FileStore::open(&path).unwrap();
    assert_eq!(
        durable.read(&storage_key(id, ParameterField::BlockWidth)).as_deref(),
        Some("33")
    );
    let store = ParameterStore::new(Arc::new(durable));
    assert_eq!(store.int(id, ParameterField::BlockWidth), 33);
}

#[test]
fn test_overrides_take_precedence() {
    let store = ParameterStore::in_memory();
    let id = pixellate_id();
    store
        .set(id, ParameterField::BlockWidth, ParameterValue::Int(20))
        .unwrap();
    store
        .set(id, ParameterField::BlockHeight, ParameterValue::Int(20))
        .unwrap();

    let overrides =
        ParameterOverrides::new().with(ParameterField::BlockWidth, ParameterValue::Int(4));
    let reader = ParameterReader::new(&store, id, Some(&overrides));
    assert_eq!(reader.int(ParameterField::BlockWidth), 4);
    assert_eq!(reader.int(ParameterField::BlockHeight), 20);
    // The store itself is untouched
    assert_eq!(store.int(id, ParameterField::BlockWidth), 20);
}

#[test]
fn test_concurrent_accumulation_counts_every_render() {
    let store = Arc::new(ParameterStore::in_memory());
    let id = pixellate_id();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..25 {
                    store.accumulate(id, RenderMode::Live, Duration::from_millis(2));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = store.render_statistics(id);
    assert_eq!(stats.live_count, 100);
    assert!((stats.live_duration - 0.2).abs() < 1e-9);
    assert_eq!(stats.image_count, 0);
}

#[test]
fn test_statistics_can_be_disabled() {
    let store = ParameterStore::in_memory();
    let id = pixellate_id();
    store.set_collect_statistics(false);
    store.accumulate(id, RenderMode::Image, Duration::from_millis(5));
    assert_eq!(store.render_statistics(id).image_count, 0);
}

#[test]
fn test_corrupt_statistic_restarts_from_zero() {
    let durable = Arc::new(MemoryStore::new());
    let id = pixellate_id();
    durable.write(&storage_key(id, ParameterField::RenderLiveCount), "many");
    let store = ParameterStore::new(durable);

    store.accumulate(id, RenderMode::Live, Duration::from_millis(1));
    assert_eq!(store.render_statistics(id).live_count, 1);
}
