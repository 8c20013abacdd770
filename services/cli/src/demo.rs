use chrono::Utc;
use slot_sequencer::config::AppConfig;
use slot_sequencer::error::AppError;
use slot_sequencer::sequencing::{
    ChannelId, EnergyTier, FieldValue, GroupLogic, NewTrack, PlaybackSession, Rule, RuleGroup,
    RuleOperator, SessionSettings, SlotDefinition, SlotTarget, Strategy, TrackId,
};
use slot_sequencer::store::MemoryStrategyStore;
use std::collections::BTreeMap;
use std::sync::Arc;

const DEMO_CHANNEL: &str = "focus-demo";

fn demo_track(name: &str, fields: &[(&str, FieldValue)]) -> NewTrack {
    NewTrack {
        channel_id: ChannelId::new(DEMO_CHANNEL),
        energy_tier: EnergyTier::Medium,
        file_path: format!("audio-tracks/{DEMO_CHANNEL}/medium/{name}.mp3"),
        duration_seconds: Some(180),
        fields: fields
            .iter()
            .map(|(field, value)| (field.to_string(), value.clone()))
            .collect(),
        metadata: BTreeMap::new(),
    }
}

fn demo_strategy(
    num_slots: u16,
    recent_repeat_window: usize,
    slots: Vec<SlotDefinition>,
    rule_groups: Vec<RuleGroup>,
) -> Strategy {
    Strategy {
        channel_id: ChannelId::new(DEMO_CHANNEL),
        energy_tier: EnergyTier::Medium,
        num_slots,
        recent_repeat_window,
        slots,
        boosts: Vec::new(),
        rule_groups,
    }
}

fn print_picks(
    session: &mut PlaybackSession<MemoryStrategyStore>,
    names: &BTreeMap<TrackId, &str>,
    count: usize,
) {
    for step in 1..=count {
        match session.next_pick() {
            Some(pick) => println!(
                "  {}. slot {} -> {} (score {:.3}{})",
                step,
                pick.position,
                names.get(&pick.track_id).copied().unwrap_or("?"),
                pick.score,
                if pick.relaxed { ", repeat allowed" } else { "" }
            ),
            None => println!("  {}. no eligible track", step),
        }
    }
}

pub(crate) fn run_demo(config: &AppConfig) -> Result<(), AppError> {
    let settings = SessionSettings {
        on_exhausted: config.playback.on_exhausted,
        ..SessionSettings::default()
    };
    let channel = ChannelId::new(DEMO_CHANNEL);

    println!("Slot sequencing demo");
    println!("\nIntensity profile: slot 1 targets 0.2, slot 2 targets 0.8, repeat window 1");
    let store = Arc::new(MemoryStrategyStore::new());
    let mut names = BTreeMap::new();
    for (name, intensity) in [("tidewater", 0.1), ("lantern", 0.5), ("quarry", 0.9)] {
        let id = store.insert_track(demo_track(
            name,
            &[("intensity", FieldValue::Number(intensity))],
        ))?;
        names.insert(id, name);
    }
    store.save_strategy(demo_strategy(
        2,
        1,
        vec![
            SlotDefinition::empty(1).with_target("intensity", SlotTarget::new(0.2)),
            SlotDefinition::empty(2).with_target("intensity", SlotTarget::new(0.8)),
        ],
        Vec::new(),
    ))?;

    let mut session = PlaybackSession::new(store, settings.clone());
    session.activate(&channel, EnergyTier::Medium)?;
    print_picks(&mut session, &names, 6);

    println!("\nGenre rule: only ambient tracks may play");
    let store = Arc::new(MemoryStrategyStore::new());
    let mut names = BTreeMap::new();
    let mut ambient = None;
    for (name, genre) in [("breakwater", "rock"), ("lantern", "ambient"), ("ferry", "jazz")] {
        let id = store.insert_track(demo_track(name, &[("genre", FieldValue::from(genre))]))?;
        if genre == "ambient" {
            ambient = Some(id);
        }
        names.insert(id, name);
    }
    store.save_strategy(demo_strategy(
        3,
        2,
        Vec::new(),
        vec![RuleGroup {
            name: "ambient only".to_string(),
            logic: GroupLogic::And,
            evaluation_order: 0,
            rules: vec![Rule::new(
                "genre",
                RuleOperator::Eq(FieldValue::from("ambient")),
            )],
        }],
    ))?;

    let mut session = PlaybackSession::new(Arc::clone(&store), settings);
    session.activate(&channel, EnergyTier::Medium)?;
    print_picks(&mut session, &names, 3);

    if let Some(id) = ambient {
        store.soft_delete_track(id, Utc::now())?;
    }
    session.refresh_candidates()?;
    println!("  lantern removed from the catalog");
    print_picks(&mut session, &names, 2);

    Ok(())
}
