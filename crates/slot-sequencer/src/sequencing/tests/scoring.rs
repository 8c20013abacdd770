use super::common::*;
use crate::sequencing::domain::{Boost, FieldValue, MatchMode, SlotDefinition, SlotTarget};
use crate::sequencing::scoring::{
    ComponentKind, FieldRange, ScoringConfig, SlotScorer, EXACT_MISMATCH_PENALTY,
    MISSING_FIELD_PENALTY,
};

fn scorer() -> SlotScorer {
    SlotScorer::new(ScoringConfig::default())
}

#[test]
fn near_distance_grows_with_the_gap() {
    let slot = intensity_slot(1, 0.2);
    let scores: Vec<f64> = [0.2, 0.25, 0.5, 0.9]
        .into_iter()
        .enumerate()
        .map(|(index, intensity)| {
            scorer().score_track(&slot, &[], &intensity_track(index as i64, intensity))
        })
        .collect();

    assert_eq!(scores[0], 0.0);
    assert!(scores.windows(2).all(|pair| pair[0] < pair[1]), "{scores:?}");
}

#[test]
fn missing_field_scores_worse_than_any_present_value() {
    let slot = intensity_slot(1, 0.0);
    let farthest = scorer().score_track(&slot, &[], &intensity_track(1, 1.0));
    let missing = scorer().score_track(&slot, &[], &track(2, &[]));

    assert_eq!(missing, MISSING_FIELD_PENALTY);
    assert!(missing > farthest);
}

#[test]
fn tolerance_absorbs_small_gaps() {
    let slot = SlotDefinition::empty(1)
        .with_target("intensity", SlotTarget::new(0.5).with_tolerance(0.1));

    let inside = scorer().score_track(&slot, &[], &intensity_track(1, 0.58));
    let outside = scorer().score_track(&slot, &[], &intensity_track(2, 0.8));

    assert_eq!(inside, 0.0);
    assert!((outside - 0.2).abs() < 1e-9, "got {outside}");
}

#[test]
fn field_ranges_normalize_near_distance() {
    let slot = SlotDefinition::empty(1).with_target("tempo", SlotTarget::new(120.0));
    let candidate = track(1, &[("tempo", FieldValue::Number(145.0))]);

    let default_range = scorer().score_track(&slot, &[], &candidate);
    let narrow = SlotScorer::new(
        ScoringConfig::default().with_range("tempo", FieldRange { min: 60.0, max: 160.0 }),
    )
    .score_track(&slot, &[], &candidate);

    assert!((default_range - 0.1).abs() < 1e-9, "got {default_range}");
    assert!((narrow - 0.25).abs() < 1e-9, "got {narrow}");
}

#[test]
fn out_of_range_values_are_capped_at_one() {
    let slot = intensity_slot(1, 0.0);
    let score = scorer().score_track(&slot, &[], &intensity_track(1, 7.0));
    assert_eq!(score, 1.0);
}

#[test]
fn boost_weight_multiplies_the_distance() {
    let slot = intensity_slot(1, 0.2);
    let candidate = intensity_track(1, 0.6);
    let plain = scorer().score_track(&slot, &[], &candidate);
    let boosted = scorer().score_track(
        &slot,
        &[Boost::new("intensity", 3, MatchMode::Near)],
        &candidate,
    );

    assert!((boosted - plain * 3.0).abs() < 1e-9);
}

#[test]
fn exact_mode_is_all_or_nothing() {
    let slot = intensity_slot(1, 0.5);
    let boosts = [Boost::new("intensity", 1, MatchMode::Exact)];

    let hit = scorer().score_track(&slot, &boosts, &intensity_track(1, 0.5));
    let close = scorer().score_track(&slot, &boosts, &intensity_track(2, 0.51));

    assert_eq!(hit, 0.0);
    assert_eq!(close, EXACT_MISMATCH_PENALTY);
}

#[test]
fn categorical_targets_compare_exactly_in_near_mode() {
    let slot = SlotDefinition::empty(1).with_target("genre", SlotTarget::new("ambient"));
    let breakdown = scorer().score_breakdown(
        &slot,
        &[],
        &track(1, &[("genre", FieldValue::from("drone"))]),
    );

    assert_eq!(breakdown.components.len(), 1);
    assert_eq!(breakdown.components[0].kind, ComponentKind::ExactMismatch);
    assert_eq!(breakdown.total, EXACT_MISMATCH_PENALTY);
}

#[test]
fn breakdown_sums_weighted_components() {
    let slot = SlotDefinition::empty(1)
        .with_target("intensity", SlotTarget::new(0.2))
        .with_target("genre", SlotTarget::new("ambient"));
    let boosts = [Boost::new("intensity", 2, MatchMode::Near)];
    let candidate = track(
        9,
        &[
            ("intensity", FieldValue::Number(0.4)),
            ("genre", FieldValue::from("ambient")),
        ],
    );

    let breakdown = scorer().score_breakdown(&slot, &boosts, &candidate);

    let summed: f64 = breakdown
        .components
        .iter()
        .map(|component| component.weighted())
        .sum();
    assert_eq!(breakdown.track_id.0, 9);
    assert!((breakdown.total - summed).abs() < 1e-12);
    assert!((breakdown.total - 0.4).abs() < 1e-9, "got {}", breakdown.total);
}

#[test]
fn empty_profile_scores_zero() {
    let score = scorer().score_track(&SlotDefinition::empty(1), &[], &intensity_track(1, 0.3));
    assert_eq!(score, 0.0);
}
