use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
    #[serde(rename = "Half Day")]
    HalfDay,
    Weekend,
    Active,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 6] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Leave,
        AttendanceStatus::HalfDay,
        AttendanceStatus::Weekend,
        AttendanceStatus::Active,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Leave => "Leave",
            AttendanceStatus::HalfDay => "Half Day",
            AttendanceStatus::Weekend => "Weekend",
            AttendanceStatus::Active => "Active",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AttendanceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();

        match folded.as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "leave" => Ok(AttendanceStatus::Leave),
            "halfday" => Ok(AttendanceStatus::HalfDay),
            "weekend" => Ok(AttendanceStatus::Weekend),
            "active" => Ok(AttendanceStatus::Active),
            _ => Err(anyhow!("unknown attendance status: {s}")),
        }
    }
}

/// Worked time as reported by the API, `HH:MM` or `HH:MM:SS` with
/// anything after the seconds dropped from the display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkedDuration {
    hours: u32,
    minutes: u32,
    seconds: u32,
    display: String,
}

fn duration_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{1,3}):([0-5]\d)(?::([0-5]\d))?").ok())
        .as_ref()
}

impl WorkedDuration {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let caps = duration_pattern()?.captures(trimmed)?;
        let hours = caps.get(1)?.as_str().parse().ok()?;
        let minutes = caps.get(2)?.as_str().parse().ok()?;
        let seconds = match caps.get(3) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };

        Some(Self {
            hours,
            minutes,
            seconds,
            display: trimmed.chars().take(8).collect(),
        })
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(
            i64::from(self.hours) * 3600 + i64::from(self.minutes) * 60 + i64::from(self.seconds),
        )
    }
}

impl TryFrom<String> for WorkedDuration {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        WorkedDuration::parse(&value).ok_or_else(|| anyhow!("invalid worked duration: {value}"))
    }
}

impl From<WorkedDuration> for String {
    fn from(value: WorkedDuration) -> Self {
        value.display
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub date: NaiveDate,

    #[serde(default)]
    pub status: Option<AttendanceStatus>,

    #[serde(default)]
    pub duration: Option<WorkedDuration>,

    #[serde(default)]
    pub check_in_location: Option<String>,

    #[serde(default)]
    pub check_out_location: Option<String>,

    #[serde(default)]
    pub in_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub out_time: Option<DateTime<Utc>>,
}

impl AttendanceRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            status: None,
            duration: None,
            check_in_location: None,
            check_out_location: None,
            in_time: None,
            out_time: None,
        }
    }

    pub fn with_status(mut self, status: AttendanceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_duration(mut self, raw: &str) -> Self {
        self.duration = WorkedDuration::parse(raw);
        self
    }
}

/// Attendance records keyed by calendar date. Inserting a second record
/// for a date replaces the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordLookup {
    by_date: BTreeMap<NaiveDate, AttendanceRecord>,
}

impl RecordLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = AttendanceRecord>,
    {
        let mut lookup = Self::new();
        for record in records {
            lookup.insert(record);
        }
        lookup
    }

    pub fn insert(&mut self, record: AttendanceRecord) -> Option<AttendanceRecord> {
        self.by_date.insert(record.date, record)
    }

    pub fn get(&self, date: NaiveDate) -> Option<&AttendanceRecord> {
        self.by_date.get(&date)
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    pub fn into_records(self) -> Vec<AttendanceRecord> {
        self.by_date.into_values().collect()
    }
}

impl FromIterator<AttendanceRecord> for RecordLookup {
    fn from_iter<T: IntoIterator<Item = AttendanceRecord>>(iter: T) -> Self {
        Self::from_records(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn status_parses_labels_loosely() {
        assert_eq!("Present".parse::<AttendanceStatus>().ok(), Some(AttendanceStatus::Present));
        assert_eq!("half day".parse::<AttendanceStatus>().ok(), Some(AttendanceStatus::HalfDay));
        assert_eq!("Half_Day".parse::<AttendanceStatus>().ok(), Some(AttendanceStatus::HalfDay));
        assert!("Sick".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn status_serializes_with_display_labels() {
        let json = serde_json::to_string(&AttendanceStatus::HalfDay).expect("serialize");
        assert_eq!(json, "\"Half Day\"");
    }

    #[test]
    fn duration_keeps_first_eight_characters() {
        let parsed = WorkedDuration::parse("08:15:30.250").expect("parse duration");
        assert_eq!(parsed.display(), "08:15:30");
        assert_eq!(parsed.as_duration(), Duration::seconds(8 * 3600 + 15 * 60 + 30));
    }

    #[test]
    fn short_duration_is_used_as_is() {
        let parsed = WorkedDuration::parse("07:45").expect("parse duration");
        assert_eq!(parsed.display(), "07:45");
        assert_eq!(parsed.as_duration(), Duration::minutes(7 * 60 + 45));
    }

    #[test]
    fn malformed_duration_is_rejected() {
        assert!(WorkedDuration::parse("").is_none());
        assert!(WorkedDuration::parse("eight hours").is_none());
        assert!(WorkedDuration::parse("08:75").is_none());
    }

    #[test]
    fn lookup_keeps_last_record_per_date() {
        let lookup = RecordLookup::from_records([
            AttendanceRecord::new(day(2025, 3, 5)).with_status(AttendanceStatus::Absent),
            AttendanceRecord::new(day(2025, 3, 4)).with_status(AttendanceStatus::Present),
            AttendanceRecord::new(day(2025, 3, 5)).with_status(AttendanceStatus::Present),
        ]);

        assert_eq!(lookup.len(), 2);
        assert_eq!(
            lookup.get(day(2025, 3, 5)).and_then(|r| r.status),
            Some(AttendanceStatus::Present)
        );

        let dates: Vec<NaiveDate> = lookup.into_records().into_iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(2025, 3, 4), day(2025, 3, 5)]);
    }
}
