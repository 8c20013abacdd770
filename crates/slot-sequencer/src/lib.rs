//! Slot-based playlist sequencing for channel and energy-tier playback.
//!
//! A [`sequencing::Strategy`] describes, for one channel at one energy tier, an
//! ordered list of slots. Each slot carries a numeric target profile; the
//! [`sequencing::Sequencer`] walks the slots in order and, for every slot, picks
//! the candidate track closest to the profile after rule filtering and
//! recent-repeat avoidance.

pub mod catalog;
pub mod config;
pub mod error;
pub mod sequencing;
pub mod store;
pub mod telemetry;
