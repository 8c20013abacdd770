use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Boost, FieldValue, MatchMode, SlotDefinition, SlotTarget, Track, TrackId};
use super::fields::FieldResolver;

/// Distance charged for a target field the track does not carry. In-range
/// distances never exceed 1.0.
pub const MISSING_FIELD_PENALTY: f64 = 2.0;
pub const EXACT_MISMATCH_PENALTY: f64 = 1.0;
pub const DEFAULT_BOOST_WEIGHT: u8 = 1;

/// Known numeric span of a field, used to normalize `near` distances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldRange {
    pub min: f64,
    pub max: f64,
}

impl FieldRange {
    pub const UNIT: FieldRange = FieldRange { min: 0.0, max: 1.0 };

    pub fn width(&self) -> f64 {
        let width = (self.max - self.min).abs();
        if width.is_finite() && width > 0.0 {
            width
        } else {
            1.0
        }
    }
}

/// Penalties and field ranges for the slot scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub missing_field_penalty: f64,
    pub exact_mismatch_penalty: f64,
    pub default_range: FieldRange,
    pub ranges: BTreeMap<String, FieldRange>,
}

impl ScoringConfig {
    pub fn range_for(&self, field: &str) -> FieldRange {
        self.ranges
            .get(field)
            .copied()
            .unwrap_or(self.default_range)
    }

    pub fn with_range(mut self, field: impl Into<String>, range: FieldRange) -> Self {
        self.ranges.insert(field.into(), range);
        self
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let mut ranges = BTreeMap::new();
        ranges.insert(
            "tempo".to_string(),
            FieldRange {
                min: 0.0,
                max: 250.0,
            },
        );
        ranges.insert(
            "duration_seconds".to_string(),
            FieldRange {
                min: 0.0,
                max: 900.0,
            },
        );

        Self {
            missing_field_penalty: MISSING_FIELD_PENALTY,
            exact_mismatch_penalty: EXACT_MISMATCH_PENALTY,
            default_range: FieldRange::UNIT,
            ranges,
        }
    }
}

/// How a single target field contributed to a track's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Missing,
    ExactMatch,
    ExactMismatch,
    Near,
}

/// Discrete contribution to a slot score, kept for transparent audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub field: String,
    pub kind: ComponentKind,
    pub distance: f64,
    pub weight: u8,
}

impl ScoreComponent {
    pub fn weighted(&self) -> f64 {
        self.distance * f64::from(self.weight)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackScore {
    pub track_id: TrackId,
    pub total: f64,
    pub components: Vec<ScoreComponent>,
}

/// Weighted distance between a slot's target profile and a candidate track.
/// Lower is better.
#[derive(Debug, Clone, Default)]
pub struct SlotScorer {
    config: ScoringConfig,
    resolver: FieldResolver,
}

impl SlotScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self::with_resolver(config, FieldResolver::standard())
    }

    pub fn with_resolver(config: ScoringConfig, resolver: FieldResolver) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score_track(&self, slot: &SlotDefinition, boosts: &[Boost], track: &Track) -> f64 {
        self.score_breakdown(slot, boosts, track).total
    }

    pub fn score_breakdown(
        &self,
        slot: &SlotDefinition,
        boosts: &[Boost],
        track: &Track,
    ) -> TrackScore {
        let mut components = Vec::with_capacity(slot.targets.len());
        let mut total = 0.0;

        for (field, target) in &slot.targets {
            let boost = boosts.iter().find(|boost| &boost.field == field);
            let weight = boost
                .map(|boost| boost.weight)
                .unwrap_or(DEFAULT_BOOST_WEIGHT);
            let mode = boost.map(|boost| boost.mode).unwrap_or_default();

            let (kind, distance) = match self.resolver.resolve(track, field) {
                None => (ComponentKind::Missing, self.config.missing_field_penalty),
                Some(value) => self.field_distance(field, target, mode, &value),
            };

            let component = ScoreComponent {
                field: field.clone(),
                kind,
                distance,
                weight,
            };
            total += component.weighted();
            components.push(component);
        }

        TrackScore {
            track_id: track.id,
            total,
            components,
        }
    }

    fn field_distance(
        &self,
        field: &str,
        target: &SlotTarget,
        mode: MatchMode,
        value: &FieldValue,
    ) -> (ComponentKind, f64) {
        let numbers = (value.as_number(), target.value.as_number());
        match (mode, numbers) {
            (MatchMode::Near, (Some(actual), Some(wanted))) => {
                let tolerance = target
                    .tolerance
                    .filter(|tolerance| tolerance.is_finite() && *tolerance > 0.0)
                    .unwrap_or(0.0);
                let gap = ((actual - wanted).abs() - tolerance).max(0.0);
                let distance = gap / self.config.range_for(field).width();
                let distance = if distance.is_finite() {
                    distance.min(1.0)
                } else {
                    self.config.exact_mismatch_penalty
                };
                (ComponentKind::Near, distance)
            }
            // near on categorical values degrades to an exact comparison
            _ if value == &target.value => (ComponentKind::ExactMatch, 0.0),
            _ => (
                ComponentKind::ExactMismatch,
                self.config.exact_mismatch_penalty,
            ),
        }
    }
}
