use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{ChannelId, EnergyTier, OnExhausted, Strategy, Track, TrackId};
use super::loader::StrategyLoader;
use super::repository::{StoreError, StrategyStore};
use super::scoring::{ScoringConfig, SlotScorer};
use super::sequencer::{Pick, Sequencer};

const HISTORY_LIMIT: usize = 256;

/// Knobs a playback session is built with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSettings {
    pub on_exhausted: OnExhausted,
    pub scoring: ScoringConfig,
}

/// Result of activating a (channel, tier) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Activation {
    Configured { num_slots: u16, candidates: usize },
    /// No slot strategy exists; the caller falls back or shows no playlist.
    NotConfigured,
}

/// One entry of the session's play log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub track_id: TrackId,
    pub position: u16,
    pub picked_at: DateTime<Utc>,
}

/// Error raised by the playback session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no channel is active")]
    Inactive,
}

struct ActiveChannel {
    channel_id: ChannelId,
    energy_tier: EnergyTier,
    sequencer: Option<Sequencer>,
    candidates: Vec<Track>,
}

/// Per-listener facade handed to the playback engine.
///
/// Holds at most one active (channel, tier) sequencer. Strategies are cached
/// for the lifetime of the session; switching tier discards the sequencer and
/// with it the recent-play window.
pub struct PlaybackSession<S> {
    loader: StrategyLoader<S>,
    settings: SessionSettings,
    strategies: HashMap<(ChannelId, EnergyTier), Option<Arc<Strategy>>>,
    active: Option<ActiveChannel>,
    history: VecDeque<PlayEvent>,
}

impl<S> PlaybackSession<S>
where
    S: StrategyStore + 'static,
{
    pub fn new(store: Arc<S>, settings: SessionSettings) -> Self {
        Self {
            loader: StrategyLoader::new(store),
            settings,
            strategies: HashMap::new(),
            active: None,
            history: VecDeque::new(),
        }
    }

    pub fn activate(
        &mut self,
        channel_id: &ChannelId,
        energy_tier: EnergyTier,
    ) -> Result<Activation, SessionError> {
        // a failed activation leaves nothing playing
        self.active = None;
        let strategy = self.strategy_for(channel_id, energy_tier)?;

        let Some(strategy) = strategy else {
            info!(channel = %channel_id, tier = %energy_tier, "channel has no slot strategy");
            self.active = Some(ActiveChannel {
                channel_id: channel_id.clone(),
                energy_tier,
                sequencer: None,
                candidates: Vec::new(),
            });
            return Ok(Activation::NotConfigured);
        };

        let candidates = self
            .loader
            .store()
            .candidate_tracks(channel_id, energy_tier)?;
        let num_slots = strategy.num_slots;
        let sequencer = Sequencer::with_scorer(
            strategy,
            self.settings.on_exhausted,
            SlotScorer::new(self.settings.scoring.clone()),
        );

        info!(
            channel = %channel_id,
            tier = %energy_tier,
            num_slots,
            candidates = candidates.len(),
            "slot sequencer activated"
        );

        let activation = Activation::Configured {
            num_slots,
            candidates: candidates.len(),
        };
        self.active = Some(ActiveChannel {
            channel_id: channel_id.clone(),
            energy_tier,
            sequencer: Some(sequencer),
            candidates,
        });
        Ok(activation)
    }

    /// Discards the current sequencer and activates `energy_tier` on the same channel.
    pub fn switch_tier(&mut self, energy_tier: EnergyTier) -> Result<Activation, SessionError> {
        let channel_id = self
            .active
            .as_ref()
            .map(|active| active.channel_id.clone())
            .ok_or(SessionError::Inactive)?;
        self.activate(&channel_id, energy_tier)
    }

    /// Refetches the candidate pool without moving the cursor.
    pub fn refresh_candidates(&mut self) -> Result<usize, SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::Inactive)?;
        if active.sequencer.is_none() {
            return Ok(0);
        }
        active.candidates = self
            .loader
            .store()
            .candidate_tracks(&active.channel_id, active.energy_tier)?;
        Ok(active.candidates.len())
    }

    pub fn next_track(&mut self) -> Option<TrackId> {
        self.next_pick().map(|pick| pick.track_id)
    }

    pub fn next_pick(&mut self) -> Option<Pick> {
        let active = self.active.as_mut()?;
        let sequencer = active.sequencer.as_mut()?;
        let pick = sequencer.next_pick(&active.candidates)?;

        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(PlayEvent {
            track_id: pick.track_id,
            position: pick.position,
            picked_at: Utc::now(),
        });

        Some(pick)
    }

    /// Clears position and recent-play window.
    pub fn reset(&mut self) {
        if let Some(sequencer) = self
            .active
            .as_mut()
            .and_then(|active| active.sequencer.as_mut())
        {
            sequencer.reset();
        }
    }

    pub fn active_pair(&self) -> Option<(&ChannelId, EnergyTier)> {
        self.active
            .as_ref()
            .map(|active| (&active.channel_id, active.energy_tier))
    }

    pub fn sequencer(&self) -> Option<&Sequencer> {
        self.active
            .as_ref()
            .and_then(|active| active.sequencer.as_ref())
    }

    /// Candidate pool of the active pair; empty when not configured.
    pub fn candidates(&self) -> &[Track] {
        self.active
            .as_ref()
            .map(|active| active.candidates.as_slice())
            .unwrap_or(&[])
    }

    pub fn history(&self) -> impl Iterator<Item = &PlayEvent> {
        self.history.iter()
    }

    fn strategy_for(
        &mut self,
        channel_id: &ChannelId,
        energy_tier: EnergyTier,
    ) -> Result<Option<Arc<Strategy>>, StoreError> {
        let key = (channel_id.clone(), energy_tier);
        if let Some(cached) = self.strategies.get(&key) {
            return Ok(cached.clone());
        }

        let loaded = self
            .loader
            .load_strategy(channel_id, energy_tier)?
            .map(Arc::new);
        self.strategies.insert(key, loaded.clone());
        Ok(loaded)
    }
}
