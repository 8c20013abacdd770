use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::sequencing::domain::{
    ChannelId, EnergyTier, FieldValue, GroupLogic, NewTrack, Rule, RuleGroup, RuleOperator,
    SlotDefinition, SlotTarget, Strategy, Track, TrackId,
};
use crate::sequencing::repository::{StoreError, StrategyStore};
use crate::sequencing::sequencer::Sequencer;
use crate::sequencing::OnExhausted;
use crate::store::MemoryStrategyStore;

pub(super) const CHANNEL: &str = "focus";

pub(super) fn channel() -> ChannelId {
    ChannelId::new(CHANNEL)
}

pub(super) fn track(id: i64, fields: &[(&str, FieldValue)]) -> Track {
    Track {
        id: TrackId(id),
        channel_id: channel(),
        energy_tier: EnergyTier::Medium,
        file_path: format!("audio-tracks/{id}.mp3"),
        duration_seconds: Some(200),
        fields: fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
        metadata: BTreeMap::new(),
        deleted_at: None,
    }
}

pub(super) fn intensity_track(id: i64, intensity: f64) -> Track {
    track(id, &[("intensity", FieldValue::Number(intensity))])
}

pub(super) fn new_track(tier: EnergyTier, intensity: f64) -> NewTrack {
    let mut fields = BTreeMap::new();
    fields.insert("intensity".to_string(), FieldValue::Number(intensity));
    NewTrack {
        channel_id: channel(),
        energy_tier: tier,
        file_path: format!("audio-tracks/{}-{intensity}.mp3", tier.label()),
        duration_seconds: Some(180),
        fields,
        metadata: BTreeMap::new(),
    }
}

pub(super) fn intensity_slot(position: u16, target: f64) -> SlotDefinition {
    SlotDefinition::empty(position).with_target("intensity", SlotTarget::new(target))
}

pub(super) fn strategy(
    tier: EnergyTier,
    recent_repeat_window: usize,
    slots: Vec<SlotDefinition>,
) -> Strategy {
    Strategy {
        channel_id: channel(),
        energy_tier: tier,
        num_slots: slots.len().max(1) as u16,
        recent_repeat_window,
        slots,
        boosts: Vec::new(),
        rule_groups: Vec::new(),
    }
}

pub(super) fn group(name: &str, logic: GroupLogic, rules: Vec<Rule>) -> RuleGroup {
    RuleGroup {
        name: name.to_string(),
        logic,
        evaluation_order: 0,
        rules,
    }
}

pub(super) fn genre_is(genre: &str) -> Rule {
    Rule::new("genre", RuleOperator::Eq(FieldValue::from(genre)))
}

/// Two intensity slots (low then high) over a three-track pool.
pub(super) fn two_slot_sequencer(on_exhausted: OnExhausted) -> Sequencer {
    let strategy = strategy(
        EnergyTier::Medium,
        1,
        vec![intensity_slot(1, 0.2), intensity_slot(2, 0.8)],
    );
    Sequencer::new(Arc::new(strategy), on_exhausted)
}

pub(super) fn three_track_pool() -> Vec<Track> {
    vec![
        intensity_track(1, 0.1),
        intensity_track(2, 0.5),
        intensity_track(3, 0.9),
    ]
}

pub(super) fn seeded_store() -> Arc<MemoryStrategyStore> {
    let store = Arc::new(MemoryStrategyStore::new());
    store
        .save_strategy(strategy(
            EnergyTier::Low,
            1,
            vec![intensity_slot(1, 0.2), intensity_slot(2, 0.8)],
        ))
        .expect("save low strategy");
    store
        .save_strategy(strategy(EnergyTier::High, 0, vec![intensity_slot(1, 0.9)]))
        .expect("save high strategy");
    for intensity in [0.1, 0.5, 0.9] {
        store
            .insert_track(new_track(EnergyTier::Low, intensity))
            .expect("insert low track");
    }
    store
        .insert_track(new_track(EnergyTier::High, 0.95))
        .expect("insert high track");
    store
}

pub(super) struct UnavailableStore;

impl StrategyStore for UnavailableStore {
    fn fetch_strategy(
        &self,
        _channel_id: &ChannelId,
        _energy_tier: EnergyTier,
    ) -> Result<Option<Strategy>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn candidate_tracks(
        &self,
        _channel_id: &ChannelId,
        _energy_tier: EnergyTier,
    ) -> Result<Vec<Track>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Counts strategy fetches that reach the underlying store.
pub(super) struct CountingStore {
    pub(super) inner: Arc<MemoryStrategyStore>,
    pub(super) fetches: AtomicUsize,
}

impl CountingStore {
    pub(super) fn new(inner: Arc<MemoryStrategyStore>) -> Self {
        Self {
            inner,
            fetches: AtomicUsize::new(0),
        }
    }

    pub(super) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl StrategyStore for CountingStore {
    fn fetch_strategy(
        &self,
        channel_id: &ChannelId,
        energy_tier: EnergyTier,
    ) -> Result<Option<Strategy>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_strategy(channel_id, energy_tier)
    }

    fn candidate_tracks(
        &self,
        channel_id: &ChannelId,
        energy_tier: EnergyTier,
    ) -> Result<Vec<Track>, StoreError> {
        self.inner.candidate_tracks(channel_id, energy_tier)
    }
}

/// Serves strategies normally; candidate fetches fail once switched off.
pub(super) struct FlakyCandidatesStore {
    pub(super) inner: Arc<MemoryStrategyStore>,
    failing: AtomicBool,
}

impl FlakyCandidatesStore {
    pub(super) fn new(inner: Arc<MemoryStrategyStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub(super) fn fail_candidates(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

impl StrategyStore for FlakyCandidatesStore {
    fn fetch_strategy(
        &self,
        channel_id: &ChannelId,
        energy_tier: EnergyTier,
    ) -> Result<Option<Strategy>, StoreError> {
        self.inner.fetch_strategy(channel_id, energy_tier)
    }

    fn candidate_tracks(
        &self,
        channel_id: &ChannelId,
        energy_tier: EnergyTier,
    ) -> Result<Vec<Track>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("track table locked".to_string()));
        }
        self.inner.candidate_tracks(channel_id, energy_tier)
    }
}
