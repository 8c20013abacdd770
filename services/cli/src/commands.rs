use crate::infra::{open_store, parse_tier};
use clap::Args;
use slot_sequencer::catalog::TrackCatalogImporter;
use slot_sequencer::config::AppConfig;
use slot_sequencer::error::AppError;
use slot_sequencer::sequencing::{
    normalize_strategy, Activation, ChannelId, EnergyTier, OnExhausted, PlaybackSession,
    SessionSettings, Strategy, StrategyLoader,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct ImportTracksArgs {
    /// Catalog CSV with channel_id, energy_level and file_path columns
    #[arg(long)]
    pub(crate) csv: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct LoadStrategyArgs {
    /// Strategy JSON document
    #[arg(long)]
    pub(crate) file: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct ShowStrategyArgs {
    #[arg(long)]
    pub(crate) channel: String,
    /// Energy tier: low, medium or high
    #[arg(long, value_parser = parse_tier)]
    pub(crate) tier: EnergyTier,
}

#[derive(Args, Debug)]
pub(crate) struct SequenceArgs {
    #[arg(long)]
    pub(crate) channel: String,
    /// Energy tier: low, medium or high
    #[arg(long, value_parser = parse_tier)]
    pub(crate) tier: EnergyTier,
    /// Number of picks to print
    #[arg(long, default_value_t = 10)]
    pub(crate) count: usize,
    /// Stop after the last slot instead of wrapping to slot 1
    #[arg(long)]
    pub(crate) stop_at_end: bool,
}

pub(crate) fn import_tracks(config: &AppConfig, args: ImportTracksArgs) -> Result<(), AppError> {
    let tracks = TrackCatalogImporter::from_path(&args.csv)?;
    let store = open_store(config)?;
    let ids = store.insert_tracks(&tracks)?;

    info!(imported = ids.len(), csv = %args.csv.display(), "track catalog imported");
    println!("Imported {} tracks from {}", ids.len(), args.csv.display());
    if let (Some(first), Some(last)) = (ids.first(), ids.last()) {
        println!("- assigned ids {} through {}", first, last);
    }
    Ok(())
}

pub(crate) fn load_strategy(config: &AppConfig, args: LoadStrategyArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.file)?;
    let strategy = normalize_strategy(serde_json::from_str::<Strategy>(&raw)?);
    let store = open_store(config)?;
    store.save_strategy(&strategy)?;

    println!(
        "Saved strategy for {} / {}: {} slots, {} boosts, {} rule groups, repeat window {}",
        strategy.channel_id,
        strategy.energy_tier,
        strategy.num_slots,
        strategy.boosts.len(),
        strategy.rule_groups.len(),
        strategy.recent_repeat_window
    );
    Ok(())
}

pub(crate) fn show_strategy(config: &AppConfig, args: ShowStrategyArgs) -> Result<(), AppError> {
    let channel = ChannelId::new(args.channel);
    let loader = StrategyLoader::new(open_store(config)?);

    match loader.load_strategy(&channel, args.tier)? {
        Some(strategy) => println!(
            "{}",
            serde_json::to_string_pretty(&strategy).map_err(AppError::Render)?
        ),
        None => println!("{} / {} has no slot strategy configured", channel, args.tier),
    }
    Ok(())
}

pub(crate) fn sequence(config: &AppConfig, args: SequenceArgs) -> Result<(), AppError> {
    let channel = ChannelId::new(args.channel);
    let settings = SessionSettings {
        on_exhausted: if args.stop_at_end {
            OnExhausted::Stop
        } else {
            config.playback.on_exhausted
        },
        ..SessionSettings::default()
    };

    let mut session = PlaybackSession::new(open_store(config)?, settings);
    match session.activate(&channel, args.tier)? {
        Activation::NotConfigured => {
            println!("{} / {} has no slot strategy configured", channel, args.tier);
            return Ok(());
        }
        Activation::Configured {
            num_slots,
            candidates,
        } => println!(
            "Sequencing {} / {}: {} slots over {} candidate tracks",
            channel, args.tier, num_slots, candidates
        ),
    }

    for step in 1..=args.count {
        let position = session.sequencer().and_then(|sequencer| sequencer.position());
        let Some(pick) = session.next_pick() else {
            match position {
                Some(position) => println!("{:>3}. slot {:>2}  no eligible track", step, position),
                None => println!("{:>3}. all slots played", step),
            }
            break;
        };

        let file_path = session
            .candidates()
            .iter()
            .find(|track| track.id == pick.track_id)
            .map(|track| track.file_path.as_str())
            .unwrap_or("?");
        println!(
            "{:>3}. slot {:>2}  track {:>5}  score {:.4}{}  {}",
            step,
            pick.position,
            pick.track_id.0,
            pick.score,
            if pick.relaxed { " (repeat)" } else { "" },
            file_path
        );
    }

    Ok(())
}
