use chrono::{Datelike, NaiveDate, Weekday};
use roster_core::api::{HistorySource, JsonHistoryFile, load_lookup, parse_history};
use roster_core::calendar::build_month_grid;
use roster_core::record::{AttendanceStatus, RecordLookup};
use roster_core::severity::{Severity, month_severity, week_severity};
use roster_core::summary::MonthSummary;
use tempfile::tempdir;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

const HISTORY: &str = r#"{
  "data": [
    {"date": "2025-03-03T00:00:00.000Z", "status": "Present", "duration": "09:01:00",
     "location": {"checkIn": {"displayName": "Head Office"}}},
    {"date": "2025-03-05", "status": "Present", "duration": "08:15:30"},
    {"date": "2025-03-06", "status": "half day", "duration": "04:00"},
    {"date": "2025-03-07", "status": "Leave"},
    {"date": "2025-03-07", "status": "Absent"},
    {"date": "2025-03-10", "status": "Teleported"},
    {"status": "Present"},
    {"date": "2025-03-20", "status": "Present", "duration": "08:00:00"}
  ]
}"#;

#[test]
fn history_file_to_month_grid() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("history.json");
    std::fs::write(&path, HISTORY).expect("write history");

    let source = JsonHistoryFile::new(&path);
    assert_eq!(source.fetch_history().expect("fetch").len(), 8);

    let records = load_lookup(&source).expect("load lookup");
    // Undated entry dropped, duplicate 7 March collapsed.
    assert_eq!(records.len(), 6);
    assert_eq!(
        records.get(day(2025, 3, 7)).and_then(|r| r.status),
        Some(AttendanceStatus::Absent)
    );

    let today = day(2025, 3, 12);
    let grid = build_month_grid(today, &records, Some(day(2025, 1, 1)), today);

    assert_eq!(grid.cells().len() % 7, 0);
    assert_eq!(grid.cells()[0].date.weekday(), Weekday::Sun);
    assert_eq!(
        grid.cells().last().map(|cell| cell.date.weekday()),
        Some(Weekday::Sat)
    );

    let status = |d: u32| grid.cell(day(2025, 3, d)).and_then(|cell| cell.effective_status);
    assert_eq!(status(3), Some(AttendanceStatus::Present));
    assert_eq!(status(4), Some(AttendanceStatus::Absent));
    assert_eq!(status(6), Some(AttendanceStatus::HalfDay));
    assert_eq!(status(9), None, "Sunday without a record stays blank");
    // Unknown status is treated as missing, so a weekday falls back to Absent.
    assert_eq!(status(10), Some(AttendanceStatus::Absent));
    // After today nothing is shown, even with a record.
    assert_eq!(status(20), None);
    assert_eq!(
        grid.cell(day(2025, 3, 20)).map(|cell| cell.display_duration.as_str()),
        Some("")
    );

    let summary = MonthSummary::from_grid(&grid, &records);
    assert_eq!(summary.count(AttendanceStatus::Present), 2);
    assert_eq!(summary.count(AttendanceStatus::HalfDay), 1);
    assert_eq!(summary.worked_days, 3);
}

#[test]
fn missing_history_file_is_empty() {
    let temp = tempdir().expect("tempdir");
    let source = JsonHistoryFile::new(temp.path().join("absent.json"));
    let records = load_lookup(&source).expect("load lookup");
    assert!(records.is_empty());
}

#[test]
fn grid_without_joining_date_is_blank() {
    let records = RecordLookup::from_raw(parse_history(HISTORY).expect("parse history"));
    let today = day(2025, 3, 12);
    let grid = build_month_grid(today, &records, None, today);

    assert!(grid.cells().iter().all(|cell| cell.effective_status.is_none()));
    // Durations are still shown for past days with a record.
    assert_eq!(
        grid.cell(day(2025, 3, 5)).map(|cell| cell.display_duration.as_str()),
        Some("08:15:30")
    );
}

#[test]
fn joining_date_bounds_the_grid() {
    let records = RecordLookup::new();
    let grid = build_month_grid(day(2025, 1, 15), &records, Some(day(2025, 1, 10)), day(2025, 1, 15));

    assert_eq!(
        grid.cell(day(2025, 1, 5)).and_then(|cell| cell.effective_status),
        None
    );
    assert_eq!(
        grid.cell(day(2025, 1, 13)).and_then(|cell| cell.effective_status),
        Some(AttendanceStatus::Absent)
    );
}

#[test]
fn month_and_week_classifiers_disagree_on_leave() {
    assert_eq!(month_severity(Some(AttendanceStatus::Leave)), Severity::Info);
    assert_eq!(week_severity(Some(AttendanceStatus::Leave)), Severity::Warning);
    assert_eq!(
        month_severity(Some(AttendanceStatus::Present)),
        week_severity(Some(AttendanceStatus::Present))
    );
}
