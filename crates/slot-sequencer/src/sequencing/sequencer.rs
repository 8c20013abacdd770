use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{
    OnExhausted, SlotDefinition, Strategy, Track, TrackId, MAX_REPEAT_WINDOW,
};
use super::recent::RecentPlayWindow;
use super::rules::RuleFilter;
use super::scoring::SlotScorer;

/// Cursor state of a sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SequencerState {
    /// The next pick uses the slot at `position` (1-based).
    Ready { position: u16 },
    /// Every slot has been played and the sequencer was built to stop.
    Exhausted,
}

/// Outcome of one sequencing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub track_id: TrackId,
    pub position: u16,
    pub score: f64,
    /// Repeat avoidance was dropped because every eligible track was recent.
    pub relaxed: bool,
}

/// Walks a strategy's slots in order, choosing the best candidate per slot.
#[derive(Debug, Clone)]
pub struct Sequencer {
    strategy: Arc<Strategy>,
    filter: RuleFilter,
    scorer: SlotScorer,
    recent: RecentPlayWindow,
    on_exhausted: OnExhausted,
    state: SequencerState,
}

impl Sequencer {
    pub fn new(strategy: Arc<Strategy>, on_exhausted: OnExhausted) -> Self {
        Self::with_scorer(strategy, on_exhausted, SlotScorer::default())
    }

    pub fn with_scorer(
        strategy: Arc<Strategy>,
        on_exhausted: OnExhausted,
        scorer: SlotScorer,
    ) -> Self {
        let recent =
            RecentPlayWindow::new(strategy.recent_repeat_window.min(MAX_REPEAT_WINDOW));
        Self {
            strategy,
            filter: RuleFilter::default(),
            scorer,
            recent,
            on_exhausted,
            state: SequencerState::Ready { position: 1 },
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn position(&self) -> Option<u16> {
        match self.state {
            SequencerState::Ready { position } => Some(position),
            SequencerState::Exhausted => None,
        }
    }

    pub fn recent(&self) -> &RecentPlayWindow {
        &self.recent
    }

    pub fn next_track(&mut self, pool: &[Track]) -> Option<TrackId> {
        self.next_pick(pool).map(|pick| pick.track_id)
    }

    /// Picks the best candidate for the current slot and advances. `None` leaves
    /// the cursor where it was.
    pub fn next_pick(&mut self, pool: &[Track]) -> Option<Pick> {
        let SequencerState::Ready { position } = self.state else {
            debug!("sequencer exhausted; waiting for reset");
            return None;
        };

        let fallback;
        let slot = match self.strategy.slot(position) {
            Some(slot) => slot,
            None => {
                fallback = SlotDefinition::empty(position);
                &fallback
            }
        };

        let rule_passing: Vec<&Track> = pool
            .iter()
            .filter(|track| !track.is_deleted())
            .filter(|track| {
                self.filter
                    .passes_all_groups(&self.strategy.rule_groups, track)
            })
            .collect();

        if rule_passing.is_empty() {
            debug!(
                channel = %self.strategy.channel_id,
                tier = %self.strategy.energy_tier,
                position,
                pool = pool.len(),
                "no candidate passed the rule groups"
            );
            return None;
        }

        let fresh: Vec<&Track> = rule_passing
            .iter()
            .copied()
            .filter(|track| !self.recent.contains(track.id))
            .collect();

        let (candidates, relaxed) = if fresh.is_empty() {
            info!(
                channel = %self.strategy.channel_id,
                tier = %self.strategy.energy_tier,
                position,
                eligible = rule_passing.len(),
                "all eligible tracks played recently; allowing a repeat"
            );
            (rule_passing, true)
        } else {
            (fresh, false)
        };

        let (score, track_id) = candidates
            .iter()
            .map(|track| {
                (
                    self.scorer
                        .score_track(slot, &self.strategy.boosts, track),
                    track.id,
                )
            })
            .min_by(|left, right| left.0.total_cmp(&right.0).then(left.1.cmp(&right.1)))?;

        self.recent.record(track_id);
        self.advance(position);

        debug!(
            channel = %self.strategy.channel_id,
            tier = %self.strategy.energy_tier,
            position,
            track = %track_id,
            score,
            relaxed,
            "slot filled"
        );

        Some(Pick {
            track_id,
            position,
            score,
            relaxed,
        })
    }

    /// Back to slot 1 with an empty recent window.
    pub fn reset(&mut self) {
        self.recent.clear();
        self.state = SequencerState::Ready { position: 1 };
    }

    fn advance(&mut self, position: u16) {
        let last = self.strategy.num_slots.max(1);
        self.state = if position < last {
            SequencerState::Ready {
                position: position + 1,
            }
        } else {
            match self.on_exhausted {
                OnExhausted::Wrap => SequencerState::Ready { position: 1 },
                OnExhausted::Stop => SequencerState::Exhausted,
            }
        };
    }
}
