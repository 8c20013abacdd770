//! Track catalog import from CSV exports.
//!
//! Required columns are `channel_id`, `energy_level` (or `energy_tier`) and
//! `file_path`; `duration_seconds` and a JSON `metadata` column are optional.
//! Every other column becomes a first-class track field.

mod parser;

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::sequencing::domain::{ChannelId, EnergyTier, FieldValue, NewTrack};

use parser::{CatalogRecord, ParseError};

#[derive(Debug)]
pub enum CatalogImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingColumn(&'static str),
    InvalidRow { line: u64, reason: String },
}

impl std::fmt::Display for CatalogImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogImportError::Io(err) => write!(f, "failed to read track catalog: {}", err),
            CatalogImportError::Csv(err) => write!(f, "invalid track catalog CSV data: {}", err),
            CatalogImportError::MissingColumn(column) => {
                write!(f, "track catalog is missing the `{}` column", column)
            }
            CatalogImportError::InvalidRow { line, reason } => {
                write!(f, "invalid track on line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for CatalogImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogImportError::Io(err) => Some(err),
            CatalogImportError::Csv(err) => Some(err),
            CatalogImportError::MissingColumn(_) | CatalogImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for CatalogImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for CatalogImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<ParseError> for CatalogImportError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Csv(err) => Self::Csv(err),
            ParseError::MissingColumn(column) => Self::MissingColumn(column),
        }
    }
}

pub struct TrackCatalogImporter;

impl TrackCatalogImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<NewTrack>, CatalogImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Fails on the first invalid row; nothing is returned for a partial file.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<NewTrack>, CatalogImportError> {
        let tracks = parser::parse_records(reader)?
            .into_iter()
            .map(into_new_track)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(tracks = tracks.len(), "parsed track catalog");
        Ok(tracks)
    }
}

fn into_new_track(record: CatalogRecord) -> Result<NewTrack, CatalogImportError> {
    let line = record.line;
    let invalid = |reason: String| CatalogImportError::InvalidRow { line, reason };

    if record.channel_id.is_empty() {
        return Err(invalid("channel_id is empty".to_string()));
    }
    if record.file_path.is_empty() {
        return Err(invalid("file_path is empty".to_string()));
    }

    let energy_tier: EnergyTier = record
        .energy_level
        .parse()
        .map_err(|err| invalid(format!("{}", err)))?;

    let duration_seconds = record
        .duration_seconds
        .as_deref()
        .map(|raw| {
            raw.parse::<u32>()
                .map_err(|_| invalid(format!("duration_seconds `{}` is not a whole number", raw)))
        })
        .transpose()?;

    let metadata = match record.metadata.as_deref() {
        Some(raw) => serde_json::from_str::<BTreeMap<String, serde_json::Value>>(raw)
            .map_err(|err| invalid(format!("metadata is not a JSON object: {}", err)))?,
        None => BTreeMap::new(),
    };

    let fields = record
        .extra
        .into_iter()
        .map(|(name, raw)| {
            let value = infer_field_value(&raw);
            (name, value)
        })
        .collect();

    Ok(NewTrack {
        channel_id: ChannelId::new(record.channel_id),
        energy_tier,
        file_path: record.file_path,
        duration_seconds,
        fields,
        metadata,
    })
}

fn infer_field_value(raw: &str) -> FieldValue {
    if raw.eq_ignore_ascii_case("true") {
        return FieldValue::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return FieldValue::Bool(false);
    }
    match raw.parse::<f64>() {
        Ok(number) if number.is_finite() => FieldValue::Number(number),
        _ => FieldValue::Text(raw.to_string()),
    }
}
