//! Month grids and week strips for the attendance calendar.
//!
//! Weeks start on Sunday. Only Sunday counts as a weekend; Saturday is a
//! working day.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use tracing::debug;

use crate::record::{AttendanceRecord, AttendanceStatus, RecordLookup};

pub const WEEK_START: Weekday = Weekday::Sun;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub in_current_period: bool,
    pub is_today: bool,
    pub is_weekend: bool,
    pub effective_status: Option<AttendanceStatus>,
    pub display_duration: String,
}

impl DayCell {
    pub fn status_label(&self) -> &'static str {
        self.effective_status.map(AttendanceStatus::label).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    month_start: NaiveDate,
    cells: Vec<DayCell>,
}

impl MonthGrid {
    pub fn month_start(&self) -> NaiveDate {
        self.month_start
    }

    pub fn cells(&self) -> &[DayCell] {
        &self.cells
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[DayCell]> {
        self.cells.chunks(7)
    }

    pub fn in_period(&self) -> impl Iterator<Item = &DayCell> {
        self.cells.iter().filter(|cell| cell.in_current_period)
    }

    pub fn cell(&self, date: NaiveDate) -> Option<&DayCell> {
        self.cells.iter().find(|cell| cell.date == date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekStrip {
    days: [NaiveDate; 7],
}

impl WeekStrip {
    pub fn start(&self) -> NaiveDate {
        self.days[0]
    }

    pub fn end(&self) -> NaiveDate {
        self.days[6]
    }

    pub fn days(&self) -> &[NaiveDate; 7] {
        &self.days
    }
}

/// Builds the Sunday-first grid for the month containing `month_anchor`,
/// padded with days of the neighbouring months to whole weeks.
pub fn build_month_grid(
    month_anchor: NaiveDate,
    records: &RecordLookup,
    joining_date: Option<NaiveDate>,
    today: NaiveDate,
) -> MonthGrid {
    let month_start = first_day_of_month(month_anchor);
    let month_end = last_day_of_month(month_anchor);
    let grid_start = start_of_week(month_start);
    let grid_end = end_of_week(month_end);

    let cells: Vec<DayCell> = grid_start
        .iter_days()
        .take_while(|date| *date <= grid_end)
        .map(|date| {
            let record = records.get(date);
            DayCell {
                date,
                in_current_period: date.year() == month_anchor.year()
                    && date.month() == month_anchor.month(),
                is_today: date == today,
                is_weekend: is_weekend(date),
                effective_status: effective_status(date, record, today, joining_date),
                display_duration: display_duration(date, record, today),
            }
        })
        .collect();

    debug!(
        month = %month_start.format("%Y-%m"),
        grid_start = %grid_start,
        grid_end = %grid_end,
        cells = cells.len(),
        "built month grid"
    );

    MonthGrid { month_start, cells }
}

/// The seven days of the week containing `week_anchor`. Statuses are left to
/// the caller.
pub fn build_week_strip(week_anchor: NaiveDate) -> WeekStrip {
    let start = start_of_week(week_anchor);
    WeekStrip {
        days: std::array::from_fn(|offset| {
            start
                .checked_add_days(Days::new(offset as u64))
                .unwrap_or(NaiveDate::MAX)
        }),
    }
}

/// Status shown for one day of the month grid.
///
/// Days before joining, after today, or with no known joining date are blank.
/// Inside those bounds a record's own status wins; otherwise Sunday is blank
/// and any other day is `Absent`.
pub fn effective_status(
    date: NaiveDate,
    record: Option<&AttendanceRecord>,
    today: NaiveDate,
    joining_date: Option<NaiveDate>,
) -> Option<AttendanceStatus> {
    let joined = joining_date?;
    if date < joined || date > today {
        return None;
    }

    if let Some(status) = record.and_then(|record| record.status) {
        return Some(status);
    }

    if is_weekend(date) {
        None
    } else {
        Some(AttendanceStatus::Absent)
    }
}

pub fn display_duration(
    date: NaiveDate,
    record: Option<&AttendanceRecord>,
    today: NaiveDate,
) -> String {
    if date > today {
        return String::new();
    }

    record
        .and_then(|record| record.duration.as_ref())
        .map(|duration| duration.display().to_string())
        .unwrap_or_default()
}

pub fn is_weekend(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sun
}

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (next_year, next_month) = if date.month() >= 12 {
        (date.year().saturating_add(1), 1_u32)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

/// Sunday on or before `date`, saturating at the earliest representable day.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    let diff = (7 + date.weekday().num_days_from_sunday() - WEEK_START.num_days_from_sunday()) % 7;
    date.checked_sub_days(Days::new(u64::from(diff)))
        .unwrap_or(NaiveDate::MIN)
}

/// Saturday on or after `date`, saturating at the latest representable day.
pub fn end_of_week(date: NaiveDate) -> NaiveDate {
    start_of_week(date)
        .checked_add_days(Days::new(6))
        .unwrap_or(NaiveDate::MAX)
}

/// `None` when the result falls outside the representable calendar.
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

/// Moves by whole months, clamping the day to the target month's length.
pub fn shift_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let step = Months::new(months.unsigned_abs());
    if months >= 0 {
        date.checked_add_months(step)
    } else {
        date.checked_sub_months(step)
    }
}

pub fn shift_weeks(date: NaiveDate, weeks: i64) -> Option<NaiveDate> {
    add_days(date, weeks.checked_mul(7)?)
}
