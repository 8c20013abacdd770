//! SQLite-backed configuration store.
//!
//! Strategies are stored as normalized rows: `strategies` owns `slot_definitions`
//! (with their `slot_targets`), `boosts` and `rule_groups` (with their `rules`),
//! all through cascading foreign keys. Field values and rule operators are kept
//! as JSON text.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use crate::sequencing::domain::{
    Boost, ChannelId, EnergyTier, FieldValue, GroupLogic, MatchMode, NewTrack, Rule, RuleGroup,
    RuleOperator, SlotDefinition, SlotTarget, Strategy, Track, TrackId,
};
use crate::sequencing::repository::{StoreError, StrategyStore};

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id TEXT NOT NULL,
    energy_tier TEXT NOT NULL,
    file_path TEXT NOT NULL,
    duration_seconds INTEGER,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_tracks_channel_tier ON tracks(channel_id, energy_tier);
CREATE TABLE IF NOT EXISTS track_fields (
    track_id INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (track_id, name)
);
CREATE TABLE IF NOT EXISTS strategies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id TEXT NOT NULL,
    energy_tier TEXT NOT NULL,
    num_slots INTEGER NOT NULL,
    recent_repeat_window INTEGER NOT NULL DEFAULT 0,
    UNIQUE (channel_id, energy_tier)
);
CREATE TABLE IF NOT EXISTS slot_definitions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy_id INTEGER NOT NULL REFERENCES strategies(id) ON DELETE CASCADE,
    position INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS slot_targets (
    slot_id INTEGER NOT NULL REFERENCES slot_definitions(id) ON DELETE CASCADE,
    field TEXT NOT NULL,
    value TEXT NOT NULL,
    tolerance REAL,
    PRIMARY KEY (slot_id, field)
);
CREATE TABLE IF NOT EXISTS boosts (
    strategy_id INTEGER NOT NULL REFERENCES strategies(id) ON DELETE CASCADE,
    field TEXT NOT NULL,
    weight INTEGER NOT NULL,
    mode TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS rule_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy_id INTEGER NOT NULL REFERENCES strategies(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    logic TEXT NOT NULL,
    evaluation_order INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id INTEGER NOT NULL REFERENCES rule_groups(id) ON DELETE CASCADE,
    field TEXT NOT NULL,
    operator TEXT NOT NULL
);
";

#[derive(Clone)]
pub struct SqliteStrategyStore {
    conn: Arc<Mutex<Connection>>,
}

fn migrate_if_needed(conn: &mut Connection) -> Result<(), StoreError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version == SCHEMA_VERSION {
        return Ok(());
    }
    if version > SCHEMA_VERSION {
        return Err(StoreError::Unavailable(format!(
            "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    info!("Creating sequencing schema at version {}", SCHEMA_VERSION);
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(())
}

impl SqliteStrategyStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path.as_ref())?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrate_if_needed(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection mutex poisoned".to_string()))
    }

    /// Replaces the strategy stored for the same pair, children included.
    pub fn save_strategy(&self, strategy: &Strategy) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM strategies WHERE channel_id = ?1 AND energy_tier = ?2",
            params![strategy.channel_id.as_str(), strategy.energy_tier.label()],
        )?;
        tx.execute(
            "INSERT INTO strategies (channel_id, energy_tier, num_slots, recent_repeat_window)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                strategy.channel_id.as_str(),
                strategy.energy_tier.label(),
                i64::from(strategy.num_slots),
                i64::try_from(strategy.recent_repeat_window).unwrap_or(i64::MAX),
            ],
        )?;
        let strategy_id = tx.last_insert_rowid();

        for slot in &strategy.slots {
            tx.execute(
                "INSERT INTO slot_definitions (strategy_id, position) VALUES (?1, ?2)",
                params![strategy_id, i64::from(slot.position)],
            )?;
            let slot_id = tx.last_insert_rowid();
            for (field, target) in &slot.targets {
                tx.execute(
                    "INSERT INTO slot_targets (slot_id, field, value, tolerance)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        slot_id,
                        field,
                        serde_json::to_string(&target.value)?,
                        target.tolerance
                    ],
                )?;
            }
        }

        for boost in &strategy.boosts {
            tx.execute(
                "INSERT INTO boosts (strategy_id, field, weight, mode) VALUES (?1, ?2, ?3, ?4)",
                params![
                    strategy_id,
                    boost.field,
                    i64::from(boost.weight),
                    boost.mode.label()
                ],
            )?;
        }

        for group in &strategy.rule_groups {
            tx.execute(
                "INSERT INTO rule_groups (strategy_id, name, logic, evaluation_order)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    strategy_id,
                    group.name,
                    group.logic.label(),
                    group.evaluation_order
                ],
            )?;
            let group_id = tx.last_insert_rowid();
            for rule in &group.rules {
                tx.execute(
                    "INSERT INTO rules (group_id, field, operator) VALUES (?1, ?2, ?3)",
                    params![group_id, rule.field, serde_json::to_string(&rule.operator)?],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// The identifier is allocated by SQLite inside the insert itself.
    pub fn insert_track(&self, track: &NewTrack) -> Result<TrackId, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = write_track(&tx, track, &Utc::now().to_rfc3339())?;
        tx.commit()?;
        Ok(id)
    }

    /// Inserts every track in one transaction; all or nothing.
    pub fn insert_tracks(&self, tracks: &[NewTrack]) -> Result<Vec<TrackId>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let created_at = Utc::now().to_rfc3339();
        let ids = tracks
            .iter()
            .map(|track| write_track(&tx, track, &created_at))
            .collect::<Result<Vec<_>, _>>()?;
        tx.commit()?;
        Ok(ids)
    }

    pub fn soft_delete_track(&self, id: TrackId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tracks SET deleted_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), id.0],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn write_track(conn: &Connection, track: &NewTrack, created_at: &str) -> Result<TrackId, StoreError> {
    conn.execute(
        "INSERT INTO tracks (channel_id, energy_tier, file_path, duration_seconds, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            track.channel_id.as_str(),
            track.energy_tier.label(),
            track.file_path,
            track.duration_seconds.map(i64::from),
            serde_json::to_string(&track.metadata)?,
            created_at,
        ],
    )?;
    let id = conn.last_insert_rowid();

    for (name, value) in &track.fields {
        conn.execute(
            "INSERT INTO track_fields (track_id, name, value) VALUES (?1, ?2, ?3)",
            params![id, name, serde_json::to_string(value)?],
        )?;
    }

    Ok(TrackId(id))
}

impl StrategyStore for SqliteStrategyStore {
    fn fetch_strategy(
        &self,
        channel_id: &ChannelId,
        energy_tier: EnergyTier,
    ) -> Result<Option<Strategy>, StoreError> {
        let conn = self.lock()?;
        let header = conn
            .query_row(
                "SELECT id, num_slots, recent_repeat_window FROM strategies
                 WHERE channel_id = ?1 AND energy_tier = ?2",
                params![channel_id.as_str(), energy_tier.label()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((strategy_id, num_slots, recent_repeat_window)) = header else {
            return Ok(None);
        };

        Ok(Some(Strategy {
            channel_id: channel_id.clone(),
            energy_tier,
            num_slots: u16::try_from(num_slots.max(0)).unwrap_or(u16::MAX),
            recent_repeat_window: usize::try_from(recent_repeat_window).unwrap_or(0),
            slots: load_slots(&conn, strategy_id)?,
            boosts: load_boosts(&conn, strategy_id)?,
            rule_groups: load_rule_groups(&conn, strategy_id)?,
        }))
    }

    fn candidate_tracks(
        &self,
        channel_id: &ChannelId,
        energy_tier: EnergyTier,
    ) -> Result<Vec<Track>, StoreError> {
        let conn = self.lock()?;
        let mut tracks: BTreeMap<i64, Track> = BTreeMap::new();

        let mut stmt = conn.prepare(
            "SELECT id, file_path, duration_seconds, metadata FROM tracks
             WHERE channel_id = ?1 AND energy_tier = ?2 AND deleted_at IS NULL
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![channel_id.as_str(), energy_tier.label()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        for row in rows {
            let (id, file_path, duration_seconds, metadata) = row?;
            tracks.insert(
                id,
                Track {
                    id: TrackId(id),
                    channel_id: channel_id.clone(),
                    energy_tier,
                    file_path,
                    duration_seconds: duration_seconds.and_then(|value| u32::try_from(value).ok()),
                    fields: BTreeMap::new(),
                    metadata: parse_metadata(id, &metadata),
                    deleted_at: None,
                },
            );
        }

        let mut stmt = conn.prepare(
            "SELECT f.track_id, f.name, f.value FROM track_fields f
             JOIN tracks t ON t.id = f.track_id
             WHERE t.channel_id = ?1 AND t.energy_tier = ?2 AND t.deleted_at IS NULL",
        )?;
        let rows = stmt.query_map(params![channel_id.as_str(), energy_tier.label()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (track_id, name, raw) = row?;
            let Some(track) = tracks.get_mut(&track_id) else {
                continue;
            };
            match serde_json::from_str::<FieldValue>(&raw) {
                Ok(value) => {
                    track.fields.insert(name, value);
                }
                Err(err) => warn!("Malformed value for field {} of track {}: {}", name, track_id, err),
            }
        }

        Ok(tracks.into_values().collect())
    }
}

fn parse_metadata(track_id: i64, raw: &str) -> BTreeMap<String, serde_json::Value> {
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!("Malformed metadata for track {}: {}", track_id, err);
        BTreeMap::new()
    })
}

fn load_slots(conn: &Connection, strategy_id: i64) -> Result<Vec<SlotDefinition>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.position, t.field, t.value, t.tolerance
         FROM slot_definitions s
         LEFT JOIN slot_targets t ON t.slot_id = s.id
         WHERE s.strategy_id = ?1
         ORDER BY s.position, s.id, t.field",
    )?;
    let rows = stmt.query_map(params![strategy_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<f64>>(4)?,
        ))
    })?;

    let mut slots: Vec<SlotDefinition> = Vec::new();
    let mut current_slot = None;
    for row in rows {
        let (slot_id, position, field, value, tolerance) = row?;
        if current_slot != Some(slot_id) {
            current_slot = Some(slot_id);
            // out-of-range positions map to 0 and are dropped by the loader
            slots.push(SlotDefinition::empty(u16::try_from(position).unwrap_or(0)));
        }

        let (Some(field), Some(raw)) = (field, value) else {
            continue;
        };
        match serde_json::from_str::<FieldValue>(&raw) {
            Ok(value) => {
                if let Some(slot) = slots.last_mut() {
                    slot.targets.insert(field, SlotTarget { value, tolerance });
                }
            }
            Err(err) => warn!("Malformed slot target {} in slot {}: {}", field, slot_id, err),
        }
    }

    Ok(slots)
}

fn load_boosts(conn: &Connection, strategy_id: i64) -> Result<Vec<Boost>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT field, weight, mode FROM boosts WHERE strategy_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![strategy_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut boosts = Vec::new();
    for row in rows {
        let (field, weight, mode) = row?;
        let mode = match mode.as_str() {
            "exact" => MatchMode::Exact,
            "near" => MatchMode::Near,
            other => {
                warn!("Unknown match mode {} for boost {}; using near", other, field);
                MatchMode::Near
            }
        };
        let weight = u8::try_from(weight.clamp(0, i64::from(u8::MAX))).unwrap_or(u8::MAX);
        boosts.push(Boost {
            field,
            weight,
            mode,
        });
    }

    Ok(boosts)
}

fn load_rule_groups(conn: &Connection, strategy_id: i64) -> Result<Vec<RuleGroup>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, logic, evaluation_order FROM rule_groups
         WHERE strategy_id = ?1 ORDER BY evaluation_order, id",
    )?;
    let rows = stmt.query_map(params![strategy_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i32>(3)?,
        ))
    })?;

    let mut groups = Vec::new();
    for row in rows {
        let (group_id, name, logic, evaluation_order) = row?;
        let logic = match logic.as_str() {
            "and" => GroupLogic::And,
            "or" => GroupLogic::Or,
            other => {
                warn!("Unknown logic {} for rule group {}; using and", other, name);
                GroupLogic::And
            }
        };
        groups.push(RuleGroup {
            rules: load_rules(conn, group_id, &name)?,
            name,
            logic,
            evaluation_order,
        });
    }

    Ok(groups)
}

fn load_rules(conn: &Connection, group_id: i64, group_name: &str) -> Result<Vec<Rule>, StoreError> {
    let mut stmt = conn.prepare("SELECT field, operator FROM rules WHERE group_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![group_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut rules = Vec::new();
    for row in rows {
        let (field, raw) = row?;
        let operator = serde_json::from_str::<RuleOperator>(&raw).unwrap_or_else(|err| {
            warn!(
                "Malformed rule on {} in group {} will match nothing: {}",
                field, group_name, err
            );
            RuleOperator::Unreadable
        });
        rules.push(Rule { field, operator });
    }

    Ok(rules)
}
