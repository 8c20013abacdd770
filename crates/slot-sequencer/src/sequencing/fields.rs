use std::fmt;
use std::sync::Arc;

use super::domain::{FieldValue, Track};

/// One storage location a named field may live in.
pub trait FieldSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn lookup(&self, track: &Track, field: &str) -> Option<FieldValue>;
}

/// Intrinsic attributes and first-class columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectFields;

impl FieldSource for DirectFields {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn lookup(&self, track: &Track, field: &str) -> Option<FieldValue> {
        match field {
            "id" => Some(FieldValue::Number(track.id.0 as f64)),
            "channel_id" => Some(FieldValue::Text(track.channel_id.0.clone())),
            "energy_tier" | "energy_level" => {
                Some(FieldValue::Text(track.energy_tier.label().to_string()))
            }
            "file_path" => Some(FieldValue::Text(track.file_path.clone())),
            "duration_seconds" => track
                .duration_seconds
                .map(|seconds| FieldValue::Number(f64::from(seconds))),
            _ => track.fields.get(field).cloned(),
        }
    }
}

/// The nested free-form metadata bag.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataBag;

impl FieldSource for MetadataBag {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn lookup(&self, track: &Track, field: &str) -> Option<FieldValue> {
        track.metadata.get(field).and_then(FieldValue::from_json)
    }
}

/// Ordered chain of field sources; the first source holding the field wins.
#[derive(Clone)]
pub struct FieldResolver {
    sources: Vec<Arc<dyn FieldSource>>,
}

impl FieldResolver {
    /// Direct fields first, then the metadata bag.
    pub fn standard() -> Self {
        Self::with_sources(vec![Arc::new(DirectFields), Arc::new(MetadataBag)])
    }

    pub fn with_sources(sources: Vec<Arc<dyn FieldSource>>) -> Self {
        Self { sources }
    }

    /// `None` is the absent sentinel: distinct from zero and from an empty string.
    pub fn resolve(&self, track: &Track, field: &str) -> Option<FieldValue> {
        self.sources
            .iter()
            .find_map(|source| source.lookup(track, field))
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.name()).collect()
    }
}

impl Default for FieldResolver {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for FieldResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldResolver")
            .field("sources", &self.source_names())
            .finish()
    }
}

/// Resolves `field` with the standard chain.
pub fn resolve_field(track: &Track, field: &str) -> Option<FieldValue> {
    FieldResolver::standard().resolve(track, field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencing::domain::{ChannelId, EnergyTier, TrackId};
    use std::collections::BTreeMap;

    fn track() -> Track {
        let mut fields = BTreeMap::new();
        fields.insert("intensity".to_string(), FieldValue::Number(0.0));
        fields.insert("genre".to_string(), FieldValue::from("ambient"));

        let mut metadata = BTreeMap::new();
        metadata.insert("genre".to_string(), serde_json::json!("drone"));
        metadata.insert("valence".to_string(), serde_json::json!(0.7));
        metadata.insert("mood".to_string(), serde_json::Value::Null);

        Track {
            id: TrackId(42),
            channel_id: ChannelId::new("focus"),
            energy_tier: EnergyTier::Low,
            file_path: "audio-tracks/42.mp3".to_string(),
            duration_seconds: None,
            fields,
            metadata,
            deleted_at: None,
        }
    }

    #[test]
    fn direct_fields_shadow_metadata() {
        let track = track();
        assert_eq!(
            resolve_field(&track, "genre"),
            Some(FieldValue::from("ambient"))
        );
    }

    #[test]
    fn falls_back_to_metadata_bag() {
        let track = track();
        assert_eq!(
            resolve_field(&track, "valence"),
            Some(FieldValue::Number(0.7))
        );
    }

    #[test]
    fn zero_is_present_and_missing_is_absent() {
        let track = track();
        assert_eq!(
            resolve_field(&track, "intensity"),
            Some(FieldValue::Number(0.0))
        );
        assert_eq!(resolve_field(&track, "tempo"), None);
        assert_eq!(resolve_field(&track, "mood"), None);
        assert_eq!(resolve_field(&track, "duration_seconds"), None);
    }

    #[test]
    fn intrinsic_attributes_resolve_directly() {
        let track = track();
        assert_eq!(
            resolve_field(&track, "energy_tier"),
            Some(FieldValue::from("low"))
        );
        assert_eq!(resolve_field(&track, "id"), Some(FieldValue::Number(42.0)));
    }

    #[test]
    fn standard_chain_backs_resolve_field() {
        let track = track();
        let resolver = FieldResolver::default();
        assert_eq!(resolver.source_names(), vec!["direct", "metadata"]);
        for field in ["genre", "valence", "intensity", "mood", "id"] {
            assert_eq!(resolve_field(&track, field), resolver.resolve(&track, field));
        }
    }

    #[test]
    fn custom_chain_changes_precedence() {
        let track = track();
        let resolver =
            FieldResolver::with_sources(vec![Arc::new(MetadataBag), Arc::new(DirectFields)]);
        assert_eq!(
            resolver.resolve(&track, "genre"),
            Some(FieldValue::from("drone"))
        );
        assert_eq!(resolver.source_names(), vec!["metadata", "direct"]);
    }
}
