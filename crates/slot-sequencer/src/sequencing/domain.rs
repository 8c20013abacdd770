use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on the number of slots a strategy may define.
pub const MAX_SLOTS: u16 = 60;
/// Upper bound on the recent-repeat window of a strategy.
pub const MAX_REPEAT_WINDOW: usize = 500;
pub const MIN_BOOST_WEIGHT: u8 = 1;
pub const MAX_BOOST_WEIGHT: u8 = 5;

/// Catalog identifier for a track. Assigned once by the store's atomic allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub i64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier wrapper for audio channels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Playback-intensity mode a channel is played at. Each tier has its own strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyTier {
    Low,
    Medium,
    High,
}

impl EnergyTier {
    pub const fn label(self) -> &'static str {
        match self {
            EnergyTier::Low => "low",
            EnergyTier::Medium => "medium",
            EnergyTier::High => "high",
        }
    }
}

impl fmt::Display for EnergyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown energy tier '{0}' (expected low, medium or high)")]
pub struct UnknownEnergyTier(pub String);

impl FromStr for EnergyTier {
    type Err = UnknownEnergyTier;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(EnergyTier::Low),
            "medium" | "med" => Ok(EnergyTier::Medium),
            "high" => Ok(EnergyTier::High),
            _ => Err(UnknownEnergyTier(value.to_string())),
        }
    }
}

/// Scalar value of a named track field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_empty_text(&self) -> bool {
        matches!(self, FieldValue::Text(text) if text.is_empty())
    }

    /// Converts a metadata-bag entry. `null`, arrays and objects have no scalar
    /// reading and resolve as absent.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(flag) => Some(FieldValue::Bool(*flag)),
            serde_json::Value::Number(number) => number.as_f64().map(FieldValue::Number),
            serde_json::Value::String(text) => Some(FieldValue::Text(text.clone())),
            serde_json::Value::Null
            | serde_json::Value::Array(_)
            | serde_json::Value::Object(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(flag) => write!(f, "{flag}"),
            FieldValue::Number(value) => write!(f, "{value}"),
            FieldValue::Text(text) => write!(f, "\"{text}\""),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// Catalog entry as seen by the sequencer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub channel_id: ChannelId,
    pub energy_tier: EnergyTier,
    pub file_path: String,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    /// First-class columns, numeric and categorical.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    /// Free-form bag for fields not promoted to columns.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Track {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Track payload before the store assigns an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrack {
    pub channel_id: ChannelId,
    pub energy_tier: EnergyTier,
    pub file_path: String,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl NewTrack {
    pub fn into_track(self, id: TrackId) -> Track {
        Track {
            id,
            channel_id: self.channel_id,
            energy_tier: self.energy_tier,
            file_path: self.file_path,
            duration_seconds: self.duration_seconds,
            fields: self.fields,
            metadata: self.metadata,
            deleted_at: None,
        }
    }
}

/// What the sequencer does once the last slot has been played.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnExhausted {
    /// Continuous playback: restart at slot 1.
    #[default]
    Wrap,
    /// Stop producing picks until the sequencer is reset.
    Stop,
}

impl FromStr for OnExhausted {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wrap" | "continuous" => Ok(OnExhausted::Wrap),
            "stop" => Ok(OnExhausted::Stop),
            other => Err(other.to_string()),
        }
    }
}

/// Sequencing configuration for one (channel, energy tier) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub channel_id: ChannelId,
    pub energy_tier: EnergyTier,
    pub num_slots: u16,
    #[serde(default)]
    pub recent_repeat_window: usize,
    #[serde(default)]
    pub slots: Vec<SlotDefinition>,
    #[serde(default)]
    pub boosts: Vec<Boost>,
    #[serde(default)]
    pub rule_groups: Vec<RuleGroup>,
}

impl Strategy {
    pub fn slot(&self, position: u16) -> Option<&SlotDefinition> {
        self.slots.iter().find(|slot| slot.position == position)
    }
}

/// Target profile for one ordinal position of a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDefinition {
    pub position: u16,
    #[serde(default)]
    pub targets: BTreeMap<String, SlotTarget>,
}

impl SlotDefinition {
    pub fn empty(position: u16) -> Self {
        Self {
            position,
            targets: BTreeMap::new(),
        }
    }

    pub fn with_target(mut self, field: impl Into<String>, target: SlotTarget) -> Self {
        self.targets.insert(field.into(), target);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotTarget {
    pub value: FieldValue,
    /// Distance under which a `near` match counts as exact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

impl SlotTarget {
    pub fn new(value: impl Into<FieldValue>) -> Self {
        Self {
            value: value.into(),
            tolerance: None,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
}

/// Per-field weighting directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boost {
    pub field: String,
    pub weight: u8,
    #[serde(default)]
    pub mode: MatchMode,
}

impl Boost {
    pub fn new(field: impl Into<String>, weight: u8, mode: MatchMode) -> Self {
        Self {
            field: field.into(),
            weight,
            mode,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Exact,
    #[default]
    Near,
}

impl MatchMode {
    pub const fn label(self) -> &'static str {
        match self {
            MatchMode::Exact => "exact",
            MatchMode::Near => "near",
        }
    }
}

/// Named set of filter rules combined with AND/OR logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    #[serde(default)]
    pub logic: GroupLogic,
    #[serde(default)]
    pub evaluation_order: i32,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupLogic {
    #[default]
    And,
    Or,
}

impl GroupLogic {
    pub const fn label(self) -> &'static str {
        match self {
            GroupLogic::And => "and",
            GroupLogic::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub field: String,
    pub operator: RuleOperator,
}

impl Rule {
    pub fn new(field: impl Into<String>, operator: RuleOperator) -> Self {
        Self {
            field: field.into(),
            operator,
        }
    }
}

/// Filter predicate together with its comparison value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum RuleOperator {
    Eq(FieldValue),
    Neq(FieldValue),
    In(Vec<FieldValue>),
    Nin(Vec<FieldValue>),
    Gte(f64),
    Lte(f64),
    /// Inclusive on both ends.
    Between(f64, f64),
    Exists,
    /// Stored rule that could not be read back. Never matches, so the group
    /// holding it stays restrictive.
    Unreadable,
}

impl RuleOperator {
    pub const fn label(&self) -> &'static str {
        match self {
            RuleOperator::Eq(_) => "eq",
            RuleOperator::Neq(_) => "neq",
            RuleOperator::In(_) => "in",
            RuleOperator::Nin(_) => "nin",
            RuleOperator::Gte(_) => "gte",
            RuleOperator::Lte(_) => "lte",
            RuleOperator::Between(_, _) => "between",
            RuleOperator::Exists => "exists",
            RuleOperator::Unreadable => "unreadable",
        }
    }
}
