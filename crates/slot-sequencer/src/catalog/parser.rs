use std::io::Read;

use csv::StringRecord;

pub(crate) const CHANNEL_ID: &str = "channel_id";
pub(crate) const ENERGY_LEVEL: &str = "energy_level";
pub(crate) const FILE_PATH: &str = "file_path";
const DURATION_SECONDS: &str = "duration_seconds";
const METADATA: &str = "metadata";

#[derive(Debug)]
pub(crate) struct CatalogRecord {
    pub(crate) line: u64,
    pub(crate) channel_id: String,
    pub(crate) energy_level: String,
    pub(crate) file_path: String,
    pub(crate) duration_seconds: Option<String>,
    pub(crate) metadata: Option<String>,
    pub(crate) extra: Vec<(String, String)>,
}

#[derive(Debug)]
pub(crate) enum ParseError {
    Csv(csv::Error),
    MissingColumn(&'static str),
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

struct ColumnLayout {
    channel_id: usize,
    energy_level: usize,
    file_path: usize,
    duration_seconds: Option<usize>,
    metadata: Option<usize>,
    extra: Vec<(usize, String)>,
}

impl ColumnLayout {
    fn from_headers(headers: &StringRecord) -> Result<Self, ParseError> {
        let names: Vec<String> = headers.iter().map(normalize_header).collect();
        let find = |wanted: &str| names.iter().position(|name| name == wanted);

        let channel_id = find(CHANNEL_ID).ok_or(ParseError::MissingColumn(CHANNEL_ID))?;
        let energy_level = find(ENERGY_LEVEL)
            .or_else(|| find("energy_tier"))
            .ok_or(ParseError::MissingColumn(ENERGY_LEVEL))?;
        let file_path = find(FILE_PATH).ok_or(ParseError::MissingColumn(FILE_PATH))?;
        let duration_seconds = find(DURATION_SECONDS);
        let metadata = find(METADATA);

        let known = [
            Some(channel_id),
            Some(energy_level),
            Some(file_path),
            duration_seconds,
            metadata,
        ];
        let extra = names
            .iter()
            .enumerate()
            .filter(|(index, name)| !name.is_empty() && !known.contains(&Some(*index)))
            .map(|(index, name)| (index, name.clone()))
            .collect();

        Ok(Self {
            channel_id,
            energy_level,
            file_path,
            duration_seconds,
            metadata,
            extra,
        })
    }
}

pub(crate) fn parse_records<R: Read>(reader: R) -> Result<Vec<CatalogRecord>, ParseError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let layout = ColumnLayout::from_headers(csv_reader.headers()?)?;
    let mut records = Vec::new();

    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or(index as u64 + 2);
        let cell = |column: usize| record.get(column).unwrap_or_default().to_string();
        let optional = |column: Option<usize>| {
            column
                .and_then(|column| record.get(column))
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        records.push(CatalogRecord {
            line,
            channel_id: cell(layout.channel_id),
            energy_level: cell(layout.energy_level),
            file_path: cell(layout.file_path),
            duration_seconds: optional(layout.duration_seconds),
            metadata: optional(layout.metadata),
            extra: layout
                .extra
                .iter()
                .filter_map(|(column, name)| {
                    record
                        .get(*column)
                        .filter(|value| !value.is_empty())
                        .map(|value| (name.clone(), value.to_string()))
                })
                .collect(),
        });
    }

    Ok(records)
}

fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}
