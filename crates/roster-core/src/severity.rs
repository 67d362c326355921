use std::fmt;

use crate::record::AttendanceStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Warning,
    Danger,
    Info,
    NeutralAccent,
    Neutral,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
            Severity::Info => "info",
            Severity::NeutralAccent => "neutral-accent",
            Severity::Neutral => "neutral",
        }
    }

    /// SGR color code for terminal output.
    pub fn ansi_code(self) -> &'static str {
        match self {
            Severity::Success => "32",
            Severity::Warning => "33",
            Severity::Danger => "31",
            Severity::Info => "36",
            Severity::NeutralAccent => "35",
            Severity::Neutral => "0",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Month calendar classifier. `Leave` is informational here.
pub fn month_severity(status: Option<AttendanceStatus>) -> Severity {
    match status {
        Some(AttendanceStatus::Leave) => Severity::Info,
        other => shared_severity(other),
    }
}

/// Weekly table classifier. `Leave` is a warning here, unlike the month view.
pub fn week_severity(status: Option<AttendanceStatus>) -> Severity {
    match status {
        Some(AttendanceStatus::Leave) => Severity::Warning,
        other => shared_severity(other),
    }
}

fn shared_severity(status: Option<AttendanceStatus>) -> Severity {
    match status {
        Some(AttendanceStatus::Present | AttendanceStatus::Active) => Severity::Success,
        Some(AttendanceStatus::Absent) => Severity::Danger,
        Some(AttendanceStatus::HalfDay) => Severity::NeutralAccent,
        Some(AttendanceStatus::Weekend) => Severity::Warning,
        Some(AttendanceStatus::Leave) | None => Severity::Neutral,
    }
}
