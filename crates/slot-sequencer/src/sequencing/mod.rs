//! Slot-based sequencing: field resolution, rule filtering, slot scoring,
//! strategy loading and the per-session sequencer built on top of them.

pub mod domain;
pub mod fields;
pub mod loader;
pub mod recent;
pub mod repository;
pub mod rules;
pub mod scoring;
pub mod sequencer;
pub mod session;

#[cfg(test)]
mod tests;

pub use domain::{
    Boost, ChannelId, EnergyTier, FieldValue, GroupLogic, MatchMode, NewTrack, OnExhausted, Rule,
    RuleGroup, RuleOperator, SlotDefinition, SlotTarget, Strategy, Track, TrackId,
    UnknownEnergyTier,
};
pub use fields::{resolve_field, DirectFields, FieldResolver, FieldSource, MetadataBag};
pub use loader::{normalize_strategy, StrategyLoader};
pub use recent::RecentPlayWindow;
pub use repository::{StoreError, StrategyStore};
pub use rules::RuleFilter;
pub use scoring::{FieldRange, ScoreComponent, ScoringConfig, SlotScorer, TrackScore};
pub use sequencer::{Pick, Sequencer, SequencerState};
pub use session::{Activation, PlayEvent, PlaybackSession, SessionError, SessionSettings};
