use std::fs;
use std::path::PathBuf;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  NaiveDate,
  NaiveDateTime,
  Utc
};
use chrono_tz::Tz;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "roster-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "ROSTER_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "ROSTER_TIME_CONFIG";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Picks the zone that decides which
/// calendar day "today" is.
///
/// Order: the `timezone` config key,
/// `$ROSTER_TIMEZONE`, the
/// `roster-time.toml` file, then UTC.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return tz;
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  tracing::debug!(
    "no timezone configured; using UTC"
  );
  chrono_tz::UTC
}

#[must_use]
pub fn today_in(tz: Tz) -> NaiveDate {
  date_in(Utc::now(), tz)
}

#[must_use]
pub fn date_in(
  instant: DateTime<Utc>,
  tz: Tz
) -> NaiveDate {
  instant
    .with_timezone(&tz)
    .date_naive()
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Parses a `YYYY-MM-DD` day given on
/// the command line.
pub fn parse_day(
  input: &str
) -> anyhow::Result<NaiveDate> {
  NaiveDate::parse_from_str(
    input.trim(),
    "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "invalid date (expected \
       YYYY-MM-DD): {input}"
    )
  })
}

/// Parses `YYYY-MM` into the first day
/// of that month.
pub fn parse_month(
  input: &str
) -> anyhow::Result<NaiveDate> {
  let trimmed = input.trim();
  let (year, month) = trimmed
    .split_once('-')
    .ok_or_else(|| {
      anyhow!(
        "invalid month (expected \
         YYYY-MM): {input}"
      )
    })?;
  let year: i32 =
    year.parse().with_context(|| {
      format!("invalid year in {input}")
    })?;
  let month: u32 =
    month.parse().with_context(|| {
      format!(
        "invalid month in {input}"
      )
    })?;

  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .ok_or_else(|| {
    anyhow!(
      "month out of range: {input}"
    )
  })
}

/// Date of an API record. Accepts a
/// bare `YYYY-MM-DD` or any text that
/// starts with one, such as an ISO
/// timestamp.
pub fn parse_record_date(
  raw: &str
) -> Option<NaiveDate> {
  let trimmed = raw.trim();
  let head = trimmed.get(..10)?;
  NaiveDate::parse_from_str(
    head, "%Y-%m-%d"
  )
  .ok()
}

/// In/out timestamps from the API.
/// Values without an offset are read as
/// UTC.
pub fn parse_timestamp(
  raw: &str
) -> Option<DateTime<Utc>> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(
      trimmed
    )
  {
    return Some(
      dt.with_timezone(&Utc)
    );
  }

  NaiveDateTime::parse_from_str(
    trimmed,
    "%Y-%m-%dT%H:%M:%S%.f"
  )
  .or_else(|_| {
    NaiveDateTime::parse_from_str(
      trimmed,
      "%Y-%m-%d %H:%M:%S%.f"
    )
  })
  .ok()
  .map(|naive| {
    DateTime::<Utc>::from_naive_utc_and_offset(
      naive, Utc
    )
  })
}
