//! Boundary between the attendance-history API and the engine.
//!
//! The API hands back loosely shaped JSON. Everything is narrowed into
//! [`AttendanceRecord`] here; nothing downstream sees a raw shape.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::datetime::{parse_record_date, parse_timestamp};
use crate::record::{AttendanceRecord, AttendanceStatus, RecordLookup, WorkedDuration};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("attendance record has no date")]
    MissingDate,

    #[error("invalid attendance record date: {0}")]
    InvalidDate(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlace {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLocation {
    #[serde(default)]
    pub check_in: Option<RawPlace>,

    #[serde(default)]
    pub check_out: Option<RawPlace>,
}

/// One entry of the attendance-history response, as sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttendanceRecord {
    #[serde(default)]
    pub date: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub duration: Option<String>,

    #[serde(default)]
    pub location: Option<RawLocation>,

    #[serde(default)]
    pub in_time: Option<String>,

    #[serde(default)]
    pub out_time: Option<String>,
}

impl TryFrom<RawAttendanceRecord> for AttendanceRecord {
    type Error = RecordError;

    fn try_from(raw: RawAttendanceRecord) -> Result<Self, Self::Error> {
        let raw_date = non_empty(raw.date).ok_or(RecordError::MissingDate)?;
        let date = parse_record_date(&raw_date).ok_or(RecordError::InvalidDate(raw_date))?;

        let status = non_empty(raw.status).and_then(|text| match text.parse::<AttendanceStatus>() {
            Ok(status) => Some(status),
            Err(err) => {
                warn!(%date, error = %err, "dropping unrecognised attendance status");
                None
            }
        });

        let duration = non_empty(raw.duration).and_then(|text| {
            let parsed = WorkedDuration::parse(&text);
            if parsed.is_none() {
                debug!(%date, duration = %text, "unparseable duration treated as empty");
            }
            parsed
        });

        let (check_in_location, check_out_location) = match raw.location {
            Some(location) => (
                location.check_in.and_then(|place| non_empty(place.display_name)),
                location.check_out.and_then(|place| non_empty(place.display_name)),
            ),
            None => (None, None),
        };

        Ok(AttendanceRecord {
            date,
            status,
            duration,
            check_in_location,
            check_out_location,
            in_time: non_empty(raw.in_time).and_then(|text| parse_timestamp(&text)),
            out_time: non_empty(raw.out_time).and_then(|text| parse_timestamp(&text)),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|text| {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

impl RecordLookup {
    /// Narrows raw API records and folds them by date. Records without a
    /// usable date are skipped.
    pub fn from_raw<I>(raws: I) -> Self
    where
        I: IntoIterator<Item = RawAttendanceRecord>,
    {
        let mut skipped = 0usize;
        let lookup: RecordLookup = raws
            .into_iter()
            .filter_map(|raw| match AttendanceRecord::try_from(raw) {
                Ok(record) => Some(record),
                Err(err) => {
                    skipped += 1;
                    warn!(error = %err, "skipping attendance record");
                    None
                }
            })
            .collect();

        debug!(records = lookup.len(), skipped, "built attendance lookup");
        lookup
    }
}

/// Where attendance history comes from.
pub trait HistorySource {
    fn fetch_history(&self) -> anyhow::Result<Vec<RawAttendanceRecord>>;
}

/// A saved response of the attendance-history endpoint: either a bare
/// JSON array or an object carrying the array under `data` or `records`.
#[derive(Debug, Clone)]
pub struct JsonHistoryFile {
    path: PathBuf,
}

impl JsonHistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistorySource for JsonHistoryFile {
    #[tracing::instrument(skip(self), fields(file = %self.path.display()))]
    fn fetch_history(&self) -> anyhow::Result<Vec<RawAttendanceRecord>> {
        if !self.path.exists() {
            warn!("history file does not exist; treating as empty");
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let records = parse_history(&text)
            .with_context(|| format!("failed parsing {}", self.path.display()))?;

        info!(count = records.len(), "loaded attendance history");
        Ok(records)
    }
}

/// Parses a history payload. Entries that are not objects of the expected
/// shape are skipped one by one rather than failing the whole payload.
pub fn parse_history(text: &str) -> anyhow::Result<Vec<RawAttendanceRecord>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let root: Value = serde_json::from_str(text).context("history is not valid JSON")?;
    let entries = match root {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("data").or_else(|| map.remove("records")) {
            Some(Value::Array(entries)) => entries,
            _ => return Err(anyhow!("history object has no `data` or `records` array")),
        },
        _ => return Err(anyhow!("history must be a JSON array or object")),
    };

    let mut out = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<RawAttendanceRecord>(entry) {
            Ok(raw) => out.push(raw),
            Err(err) => warn!(index = idx, error = %err, "skipping malformed history entry"),
        }
    }

    Ok(out)
}

#[tracing::instrument(skip(source))]
pub fn load_lookup<S>(source: &S) -> anyhow::Result<RecordLookup>
where
    S: HistorySource + ?Sized,
{
    Ok(RecordLookup::from_raw(source.fetch_history()?))
}
