use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{EventStatus, Granularity};
use super::subject::Subject;

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Selects raw event records for one subject within a window.
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub subject: Subject,
    /// `None` means every division (system-wide).
    pub division_id: Option<String>,
    pub range: DateRange,
    pub allowed_states: Vec<EventStatus>,
}

/// Selects imported aggregate rows for one subject within a window.
#[derive(Debug, Clone)]
pub struct ImportFilter {
    pub subject: Subject,
    pub division_id: Option<String>,
    pub range: DateRange,
}

/// Identity of a persisted forecast series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForecastKey {
    pub subject: Subject,
    pub division_id: Option<String>,
    pub granularity: Granularity,
}

impl ForecastKey {
    /// Storage form of the division: empty string for system-wide.
    pub fn division_key(&self) -> &str {
        self.division_id.as_deref().unwrap_or("")
    }
}
