use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::calendar::{MonthGrid, WeekStrip};
use crate::config::Config;
use crate::record::{AttendanceRecord, AttendanceStatus, RecordLookup};
use crate::severity::{Severity, month_severity, week_severity};
use crate::summary::{MonthSummary, format_total};

const WEEKDAY_HEADERS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// One line of the weekly table: a strip day joined with its raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekRow<'a> {
    pub date: NaiveDate,
    pub record: Option<&'a AttendanceRecord>,
}

impl WeekRow<'_> {
    /// The record's own status. The weekly table does not apply the month
    /// grid's defaulting.
    pub fn status(&self) -> Option<AttendanceStatus> {
        self.record.and_then(|record| record.status)
    }
}

pub fn week_rows<'a>(strip: &WeekStrip, records: &'a RecordLookup) -> Vec<WeekRow<'a>> {
    strip
        .days()
        .iter()
        .map(|date| WeekRow {
            date: *date,
            record: records.get(*date),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    timezone: Tz,
}

impl Renderer {
    pub fn new(cfg: &Config, timezone: Tz) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
            timezone,
        })
    }

    pub fn plain(timezone: Tz) -> Self {
        Self {
            color: false,
            timezone,
        }
    }

    #[tracing::instrument(skip_all)]
    pub fn print_month(&self, grid: &MonthGrid, summary: &MonthSummary) -> anyhow::Result<()> {
        self.write_month(io::stdout().lock(), grid, summary)
    }

    #[tracing::instrument(skip_all)]
    pub fn print_week(&self, strip: &WeekStrip, records: &RecordLookup) -> anyhow::Result<()> {
        self.write_week(io::stdout().lock(), strip, records)
    }

    /// Two lines per week: day number with status, then worked time.
    /// Padding days from other months are bracketed; today is starred.
    pub fn write_month<W: Write>(
        &self,
        mut out: W,
        grid: &MonthGrid,
        summary: &MonthSummary,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", grid.month_start().format("%B %Y"))?;
        writeln!(out)?;

        let headers = WEEKDAY_HEADERS.iter().map(|h| h.to_string()).collect();
        let mut rows = Vec::new();

        for week in grid.weeks() {
            let mut days = Vec::with_capacity(7);
            let mut durations = Vec::with_capacity(7);

            for cell in week {
                let marker = if cell.is_today { "*" } else { "" };
                let number = if cell.in_current_period {
                    format!("{:>2}{marker}", cell.date.day())
                } else {
                    format!("({}){marker}", cell.date.day())
                };
                let label = cell.status_label();
                let text = if label.is_empty() {
                    number
                } else {
                    format!("{number} {label}")
                };

                days.push(self.paint(&text, month_severity(cell.effective_status)));
                durations.push(cell.display_duration.clone());
            }

            rows.push(days);
            rows.push(durations);
        }

        write_table(&mut out, headers, rows)?;
        writeln!(out)?;
        self.write_summary(&mut out, summary)?;
        Ok(())
    }

    pub fn write_week<W: Write>(
        &self,
        mut out: W,
        strip: &WeekStrip,
        records: &RecordLookup,
    ) -> anyhow::Result<()> {
        writeln!(
            out,
            "Week of {} to {}",
            strip.start().format("%Y-%m-%d"),
            strip.end().format("%Y-%m-%d")
        )?;
        writeln!(out)?;

        let headers = ["Date", "Day", "Status", "Duration", "Check-in", "In", "Check-out", "Out"]
            .iter()
            .map(|h| h.to_string())
            .collect();

        let rows = week_rows(strip, records)
            .into_iter()
            .map(|row| {
                let status = row.status();
                let status_text = status.map(AttendanceStatus::label).unwrap_or("-");
                let record = row.record;
                vec![
                    row.date.format("%Y-%m-%d").to_string(),
                    row.date.format("%a").to_string(),
                    self.paint(status_text, week_severity(status)),
                    record
                        .and_then(|r| r.duration.as_ref())
                        .map(|d| d.display().to_string())
                        .unwrap_or_default(),
                    record.and_then(|r| r.check_in_location.clone()).unwrap_or_default(),
                    self.clock(record.and_then(|r| r.in_time)),
                    record.and_then(|r| r.check_out_location.clone()).unwrap_or_default(),
                    self.clock(record.and_then(|r| r.out_time)),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    fn write_summary<W: Write>(&self, mut out: W, summary: &MonthSummary) -> anyhow::Result<()> {
        let parts: Vec<String> = AttendanceStatus::ALL
            .iter()
            .filter(|status| summary.count(**status) > 0)
            .map(|status| {
                let text = format!("{} {}", status.label(), summary.count(*status));
                self.paint(&text, month_severity(Some(*status)))
            })
            .collect();

        if parts.is_empty() {
            writeln!(out, "No attendance to report")?;
        } else {
            writeln!(out, "{}", parts.join("  "))?;
        }
        writeln!(
            out,
            "Worked {} over {} day(s)",
            format_total(summary.worked),
            summary.worked_days
        )?;
        Ok(())
    }

    fn clock(&self, instant: Option<DateTime<Utc>>) -> String {
        instant
            .map(|at| at.with_timezone(&self.timezone).format("%H:%M").to_string())
            .unwrap_or_default()
    }

    fn paint(&self, text: &str, severity: Severity) -> String {
        if !self.color || severity == Severity::Neutral {
            return text.to_string();
        }
        format!("\x1b[{}m{text}\x1b[0m", severity.ansi_code())
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let mut header_line = String::new();
    for (header, width) in headers.iter().zip(&widths) {
        header_line.push_str(&format!("{header:width$} "));
    }
    writeln!(writer, "{}", header_line.trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let mut line = String::new();
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding + 1));
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
