//! Quote-aware CSV tokenizing and row-to-sample conversion.
//!
//! Lines are split on newlines first and fields second, so a quoted field
//! containing a newline breaks its row. Rows without a usable `Position`
//! pair are dropped without diagnostics.

use chrono::{DateTime, NaiveDateTime};

use crate::config::{PipelineOptions, TimestampSource};
use crate::track::Sample;

/// Split one CSV line into fields.
///
/// A `"` toggles quote mode, `""` inside quotes yields a literal quote and a
/// comma outside quotes ends the field. Quote characters themselves are not
/// kept.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Strip one layer of surrounding quotes and un-escape doubled quotes.
/// Values that are not wrapped in quotes come back unchanged.
pub fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].replace("\"\"", "\"")
    } else {
        value.to_string()
    }
}

/// Column indices resolved from the header row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub position: Option<usize>,
    pub altitude: Option<usize>,
    pub speed: Option<usize>,
    pub direction: Option<usize>,
    pub timestamp: Option<usize>,
    pub utc: Option<usize>,
    pub callsign: Option<usize>,
}

impl ColumnMap {
    /// Case-insensitive exact-name lookup; unknown columns are ignored.
    pub fn resolve(header: &[String]) -> Self {
        let names: Vec<String> = header
            .iter()
            .map(|h| unquote(h.trim()).trim().to_ascii_lowercase())
            .collect();
        let find = |name: &str| names.iter().position(|h| h == name);
        Self {
            position: find("position"),
            altitude: find("altitude"),
            speed: find("speed"),
            direction: find("direction"),
            timestamp: find("timestamp"),
            utc: find("utc"),
            callsign: find("callsign"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ParsedCsv {
    pub columns: ColumnMap,
    pub callsign: Option<String>,
    pub samples: Vec<Sample>,
}

/// Parse a whole CSV document. Never fails: unusable input yields an empty result.
pub fn parse_csv(text: &str, options: &PipelineOptions) -> ParsedCsv {
    let mut lines = text
        .lines()
        .map(|line| line.trim_start_matches('\u{feff}'))
        .filter(|line| !line.trim().is_empty());

    let Some(header) = lines.next() else {
        return ParsedCsv::default();
    };
    let columns = ColumnMap::resolve(&split_line(header));

    let mut parsed = ParsedCsv {
        columns,
        callsign: None,
        samples: Vec::new(),
    };

    for (row_idx, line) in lines.enumerate() {
        let fields = split_line(line);
        if row_idx == 0 {
            parsed.callsign = field(&fields, parsed.columns.callsign)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        if let Some(sample) = row_to_sample(&fields, &parsed.columns, options) {
            parsed.samples.push(sample);
        }
    }
    parsed
}

/// Convert one tokenized row, or `None` when its position is unusable.
pub fn row_to_sample(
    fields: &[String],
    columns: &ColumnMap,
    options: &PipelineOptions,
) -> Option<Sample> {
    let position = field(fields, columns.position)?;
    let (latitude, longitude) = parse_position(&position)?;

    let epoch_text = field(fields, columns.timestamp).unwrap_or_default();
    let epoch_ms = epoch_seconds_to_ms(&epoch_text);

    let (raw_time, timestamp_ms) = match options.timestamp_source {
        TimestampSource::EpochSeconds => (epoch_text.trim().to_string(), epoch_ms),
        TimestampSource::UtcString => {
            let utc_text = field(fields, columns.utc).unwrap_or_default();
            match parse_utc_ms(&utc_text) {
                Some(ms) => (utc_text.trim().to_string(), ms),
                None => (epoch_text.trim().to_string(), epoch_ms),
            }
        }
    };

    Some(Sample {
        latitude,
        longitude,
        altitude_ft: parse_number(field(fields, columns.altitude).as_deref()),
        speed_kt: parse_number(field(fields, columns.speed).as_deref()),
        heading_deg: parse_number(field(fields, columns.direction).as_deref()),
        raw_time,
        timestamp_ms,
    })
}

fn field(fields: &[String], index: Option<usize>) -> Option<String> {
    index.and_then(|i| fields.get(i)).map(|v| unquote(v))
}

/// `"<lat>,<lon>"` into a pair; either half may be NaN when non-numeric.
fn parse_position(text: &str) -> Option<(f64, f64)> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parts: Vec<&str> = trimmed.split(',').collect();
    if parts.len() != 2 {
        return None;
    }
    Some((parse_number(Some(parts[0])), parse_number(Some(parts[1]))))
}

fn parse_number(text: Option<&str>) -> f64 {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .and_then(|t| t.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

fn epoch_seconds_to_ms(text: &str) -> f64 {
    let seconds = parse_number(Some(text));
    if seconds.is_finite() {
        seconds * 1000.0
    } else {
        f64::NAN
    }
}

/// RFC 3339, or `YYYY-MM-DD[ T]HH:MM:SS[.fff][Z]` read as UTC.
fn parse_utc_ms(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.timestamp_millis() as f64);
    }
    let naive_text = trimmed
        .strip_suffix(" UTC")
        .or_else(|| trimmed.strip_suffix('Z'))
        .unwrap_or(trimmed);
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive_text, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis() as f64)
}
