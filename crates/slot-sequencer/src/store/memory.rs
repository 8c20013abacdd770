use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::sequencing::domain::{ChannelId, EnergyTier, NewTrack, Strategy, Track, TrackId};
use crate::sequencing::repository::{StoreError, StrategyStore};

/// Process-local store for demos, tests and embedding.
#[derive(Default)]
pub struct MemoryStrategyStore {
    strategies: Mutex<HashMap<(ChannelId, EnergyTier), Strategy>>,
    tracks: Mutex<BTreeMap<TrackId, Track>>,
    last_id: AtomicI64,
}

impl MemoryStrategyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any strategy already stored for the same pair.
    pub fn save_strategy(&self, strategy: Strategy) -> Result<(), StoreError> {
        let mut guard = self.strategies.lock().map_err(|_| poisoned())?;
        guard.insert(
            (strategy.channel_id.clone(), strategy.energy_tier),
            strategy,
        );
        Ok(())
    }

    /// Identifiers come from an atomic counter, never from max+1.
    pub fn insert_track(&self, track: NewTrack) -> Result<TrackId, StoreError> {
        let id = TrackId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut guard = self.tracks.lock().map_err(|_| poisoned())?;
        guard.insert(id, track.into_track(id));
        Ok(id)
    }

    pub fn soft_delete_track(&self, id: TrackId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut guard = self.tracks.lock().map_err(|_| poisoned())?;
        let track = guard.get_mut(&id).ok_or(StoreError::NotFound)?;
        track.deleted_at = Some(at);
        Ok(())
    }
}

impl StrategyStore for MemoryStrategyStore {
    fn fetch_strategy(
        &self,
        channel_id: &ChannelId,
        energy_tier: EnergyTier,
    ) -> Result<Option<Strategy>, StoreError> {
        let guard = self.strategies.lock().map_err(|_| poisoned())?;
        Ok(guard.get(&(channel_id.clone(), energy_tier)).cloned())
    }

    fn candidate_tracks(
        &self,
        channel_id: &ChannelId,
        energy_tier: EnergyTier,
    ) -> Result<Vec<Track>, StoreError> {
        let guard = self.tracks.lock().map_err(|_| poisoned())?;
        Ok(guard
            .values()
            .filter(|track| {
                &track.channel_id == channel_id
                    && track.energy_tier == energy_tier
                    && !track.is_deleted()
            })
            .cloned()
            .collect())
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("memory store mutex poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn new_track(channel: &str, tier: EnergyTier) -> NewTrack {
        NewTrack {
            channel_id: ChannelId::new(channel),
            energy_tier: tier,
            file_path: "audio-tracks/x.mp3".to_string(),
            duration_seconds: Some(180),
            fields: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn concurrent_inserts_never_share_an_id() {
        let store = Arc::new(MemoryStrategyStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    (0..50)
                        .map(|_| {
                            store
                                .insert_track(new_track("focus", EnergyTier::Low))
                                .expect("insert succeeds")
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<TrackId> = handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("thread completes"))
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 400);
    }

    #[test]
    fn candidates_skip_other_pairs_and_deleted_tracks() {
        let store = MemoryStrategyStore::new();
        let keep = store
            .insert_track(new_track("focus", EnergyTier::Low))
            .expect("insert");
        let deleted = store
            .insert_track(new_track("focus", EnergyTier::Low))
            .expect("insert");
        store
            .insert_track(new_track("focus", EnergyTier::High))
            .expect("insert");
        store
            .insert_track(new_track("sleep", EnergyTier::Low))
            .expect("insert");
        store
            .soft_delete_track(deleted, Utc::now())
            .expect("soft delete");

        let ids: Vec<TrackId> = store
            .candidate_tracks(&ChannelId::new("focus"), EnergyTier::Low)
            .expect("candidates")
            .into_iter()
            .map(|track| track.id)
            .collect();
        assert_eq!(ids, vec![keep]);
    }

    #[test]
    fn soft_delete_of_unknown_track_is_not_found() {
        let store = MemoryStrategyStore::new();
        match store.soft_delete_track(TrackId(99), Utc::now()) {
            Err(StoreError::NotFound) => {}
            other => panic!("expected not found, got {other:?}"),
        }
    }
}
