use std::collections::BTreeMap;

use chrono::Duration;

use crate::calendar::MonthGrid;
use crate::record::{AttendanceStatus, RecordLookup};

/// Tally of one month grid, counting only days of the displayed month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthSummary {
    pub counts: BTreeMap<AttendanceStatus, usize>,
    pub blank_days: usize,
    pub worked: Duration,
    pub worked_days: usize,
}

impl MonthSummary {
    pub fn from_grid(grid: &MonthGrid, records: &RecordLookup) -> Self {
        let mut counts = BTreeMap::new();
        let mut blank_days = 0;
        let mut worked = Duration::zero();
        let mut worked_days = 0;

        for cell in grid.in_period() {
            match cell.effective_status {
                Some(status) => *counts.entry(status).or_insert(0) += 1,
                None => blank_days += 1,
            }

            // Shown durations already exclude future days.
            if cell.display_duration.is_empty() {
                continue;
            }
            if let Some(duration) = records.get(cell.date).and_then(|r| r.duration.as_ref()) {
                worked += duration.as_duration();
                worked_days += 1;
            }
        }

        Self {
            counts,
            blank_days,
            worked,
            worked_days,
        }
    }

    pub fn count(&self, status: AttendanceStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}

/// `HH:MM:SS`, with hours allowed past 24.
pub fn format_total(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
