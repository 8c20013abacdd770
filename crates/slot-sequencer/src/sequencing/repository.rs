use super::domain::{ChannelId, EnergyTier, Strategy, Track};

/// Read-only view of the configuration store the sequencer is fed from.
pub trait StrategyStore: Send + Sync {
    /// `Ok(None)` when the pair has no strategy; that is a valid state, not an error.
    fn fetch_strategy(
        &self,
        channel_id: &ChannelId,
        energy_tier: EnergyTier,
    ) -> Result<Option<Strategy>, StoreError>;

    /// Non-deleted tracks assigned to the pair.
    fn candidate_tracks(
        &self,
        channel_id: &ChannelId,
        energy_tier: EnergyTier,
    ) -> Result<Vec<Track>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("configuration store unavailable: {0}")]
    Unavailable(String),
    #[error("record not found")]
    NotFound,
    #[error("sqlite failure: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode record: {0}")]
    Encoding(#[from] serde_json::Error),
}
