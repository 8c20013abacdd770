use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use slot_sequencer::catalog::TrackCatalogImporter;
use slot_sequencer::sequencing::{
    ChannelId, EnergyTier, FieldValue, PlaybackSession, SessionSettings, StoreError, Strategy,
    StrategyStore, TrackId,
};
use slot_sequencer::store::SqliteStrategyStore;

const CATALOG: &str = include_str!("../fixtures/focus_catalog.csv");
const STRATEGY: &str = include_str!("../fixtures/focus_medium_strategy.json");

fn focus() -> ChannelId {
    ChannelId::new("6f1c2a44-3f0e-4c55-9a8e-1d2b3c4d5e6f")
}

fn strategy_fixture() -> Strategy {
    serde_json::from_str(STRATEGY).expect("fixture strategy parses")
}

fn seeded_store() -> SqliteStrategyStore {
    let store = SqliteStrategyStore::open_in_memory().expect("open store");
    let tracks = TrackCatalogImporter::from_reader(CATALOG.as_bytes()).expect("catalog imports");
    store.insert_tracks(&tracks).expect("insert catalog");
    store
        .save_strategy(&strategy_fixture())
        .expect("save strategy");
    store
}

#[test]
fn strategy_round_trips_through_normalized_tables() {
    let store = seeded_store();

    let loaded = store
        .fetch_strategy(&focus(), EnergyTier::Medium)
        .expect("fetch succeeds")
        .expect("strategy stored");

    assert_eq!(loaded, strategy_fixture());
}

#[test]
fn unknown_pair_is_not_configured() {
    let store = seeded_store();

    let loaded = store
        .fetch_strategy(&focus(), EnergyTier::High)
        .expect("fetch succeeds");

    assert!(loaded.is_none());
}

#[test]
fn saving_again_replaces_the_previous_strategy() {
    let store = seeded_store();
    let mut replacement = strategy_fixture();
    replacement.num_slots = 1;
    replacement.slots.truncate(1);
    replacement.boosts.clear();
    replacement.rule_groups.clear();

    store.save_strategy(&replacement).expect("replace strategy");

    let loaded = store
        .fetch_strategy(&focus(), EnergyTier::Medium)
        .expect("fetch succeeds")
        .expect("strategy stored");
    assert_eq!(loaded, replacement);
}

#[test]
fn candidate_tracks_carry_fields_and_metadata() {
    let store = seeded_store();

    let tracks = store
        .candidate_tracks(&focus(), EnergyTier::Medium)
        .expect("candidates");

    let ids: Vec<i64> = tracks.iter().map(|track| track.id.0).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(tracks[0].fields["tempo"], FieldValue::Number(72.0));
    assert_eq!(tracks[0].metadata["source"], serde_json::json!("drive"));
    assert_eq!(tracks[2].duration_seconds, Some(240));
    assert!(tracks.iter().all(|track| track.energy_tier == EnergyTier::Medium));
}

#[test]
fn soft_deleted_tracks_leave_the_pool() {
    let store = seeded_store();

    store
        .soft_delete_track(TrackId(2), Utc::now())
        .expect("soft delete");

    let ids: Vec<i64> = store
        .candidate_tracks(&focus(), EnergyTier::Medium)
        .expect("candidates")
        .iter()
        .map(|track| track.id.0)
        .collect();
    assert_eq!(ids, vec![1, 3, 4]);

    match store.soft_delete_track(TrackId(404), Utc::now()) {
        Err(StoreError::NotFound) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn concurrent_inserts_get_distinct_ids() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(SqliteStrategyStore::open(dir.path().join("slots.db")).expect("open"));
    let template = TrackCatalogImporter::from_reader(CATALOG.as_bytes())
        .expect("catalog imports")
        .remove(0);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let template = template.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|_| store.insert_track(&template).expect("insert"))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let ids: HashSet<TrackId> = handles
        .into_iter()
        .flat_map(|handle| handle.join().expect("thread completes"))
        .collect();
    assert_eq!(ids.len(), 100);
}

#[test]
fn data_survives_reopening_the_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("slots.db");
    {
        let store = SqliteStrategyStore::open(&path).expect("open");
        store
            .save_strategy(&strategy_fixture())
            .expect("save strategy");
    }

    let reopened = SqliteStrategyStore::open(&path).expect("reopen");
    let loaded = reopened
        .fetch_strategy(&focus(), EnergyTier::Medium)
        .expect("fetch succeeds");
    assert_eq!(loaded, Some(strategy_fixture()));
}

#[test]
fn session_over_sqlite_follows_the_fixture_profile() {
    let store = Arc::new(seeded_store());
    let mut session = PlaybackSession::new(store, SessionSettings::default());
    session
        .activate(&focus(), EnergyTier::Medium)
        .expect("activate");

    let picks: Vec<i64> = (0..6)
        .filter_map(|_| session.next_track())
        .map(|id| id.0)
        .collect();

    assert_eq!(picks, vec![1, 2, 3, 1, 2, 3]);
}
