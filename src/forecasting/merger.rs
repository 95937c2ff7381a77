//! Historical Series Merger.
//!
//! Builds one gap-free, date-ordered count series from two sources:
//! raw event records (each counts 1) and imported aggregate tallies.
//! The sources are additive; they are assumed to describe disjoint
//! populations (paper-era tallies vs. digital records) and are never
//! deduplicated against each other.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use super::calendar::{bucket_start, buckets_in_range};
use super::error::ForecastError;
use crate::db::{self, DatabaseError};
use crate::models::enums::{EventStatus, Granularity};
use crate::models::{
    DateRange, EventFilter, HistoricalPoint, ImportFilter, ImportedAggregateRecord,
    RawEventRecord, Subject,
};

// ═══════════════════════════════════════════════════════════
// Source readers
// ═══════════════════════════════════════════════════════════

/// Reads raw event records. Two access paths, see [`CountStrategy`].
pub trait EventRecordReader: Send + Sync {
    /// Per-date tallies computed by the backend.
    fn count_by_date(
        &self,
        conn: &Connection,
        filter: &EventFilter,
    ) -> Result<Vec<(NaiveDate, u64)>, DatabaseError>;

    /// Every qualifying record, one row each.
    fn list_events(
        &self,
        conn: &Connection,
        filter: &EventFilter,
    ) -> Result<Vec<RawEventRecord>, DatabaseError>;
}

/// Reads manually imported aggregate tallies.
pub trait ImportedRecordReader: Send + Sync {
    fn list_imports(
        &self,
        conn: &Connection,
        filter: &ImportFilter,
    ) -> Result<Vec<ImportedAggregateRecord>, DatabaseError>;
}

/// SQLite-backed reader for both sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteRecordReader;

impl EventRecordReader for SqliteRecordReader {
    fn count_by_date(
        &self,
        conn: &Connection,
        filter: &EventFilter,
    ) -> Result<Vec<(NaiveDate, u64)>, DatabaseError> {
        db::count_events_by_date(conn, filter)
    }

    fn list_events(
        &self,
        conn: &Connection,
        filter: &EventFilter,
    ) -> Result<Vec<RawEventRecord>, DatabaseError> {
        db::list_events(conn, filter)
    }
}

impl ImportedRecordReader for SqliteRecordReader {
    fn list_imports(
        &self,
        conn: &Connection,
        filter: &ImportFilter,
    ) -> Result<Vec<ImportedAggregateRecord>, DatabaseError> {
        db::list_imports(conn, filter)
    }
}

// ═══════════════════════════════════════════════════════════
// Count strategies
// ═══════════════════════════════════════════════════════════

/// How raw event counts are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountStrategy {
    /// Backend `GROUP BY date` aggregate.
    DailyAggregate,
    /// Fetch every record and count one per row.
    RecordScan,
}

/// Strategies are tried in this order; the first that succeeds wins.
pub const COUNT_STRATEGY_PRECEDENCE: [CountStrategy; 2] =
    [CountStrategy::DailyAggregate, CountStrategy::RecordScan];

/// A source row normalized to a date and a count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contribution {
    /// One raw event record.
    Event { date: NaiveDate },
    /// A backend tally of raw events on one date.
    EventTally { date: NaiveDate, count: u64 },
    /// One imported aggregate row.
    Imported { date: NaiveDate, count: u64 },
}

impl Contribution {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Event { date } | Self::EventTally { date, .. } | Self::Imported { date, .. } => *date,
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            Self::Event { .. } => 1,
            Self::EventTally { count, .. } | Self::Imported { count, .. } => *count,
        }
    }
}

impl From<&RawEventRecord> for Contribution {
    fn from(event: &RawEventRecord) -> Self {
        Contribution::Event { date: event.event_date }
    }
}

impl From<&ImportedAggregateRecord> for Contribution {
    fn from(record: &ImportedAggregateRecord) -> Self {
        Contribution::Imported {
            date: record.record_date,
            count: u64::from(record.count),
        }
    }
}

fn fetch_event_contributions(
    conn: &Connection,
    reader: &dyn EventRecordReader,
    filter: &EventFilter,
    strategy: CountStrategy,
) -> Result<Vec<Contribution>, DatabaseError> {
    match strategy {
        CountStrategy::DailyAggregate => Ok(reader
            .count_by_date(conn, filter)?
            .into_iter()
            .map(|(date, count)| Contribution::EventTally { date, count })
            .collect()),
        CountStrategy::RecordScan => Ok(reader
            .list_events(conn, filter)?
            .iter()
            .map(Contribution::from)
            .collect()),
    }
}

// ═══════════════════════════════════════════════════════════
// Merge
// ═══════════════════════════════════════════════════════════

/// What to merge.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub subject: Subject,
    pub division_id: Option<String>,
    pub range: DateRange,
    pub granularity: Granularity,
    pub allowed_states: Vec<EventStatus>,
}

/// Merged series plus provenance of its counts.
#[derive(Debug, Clone, Serialize)]
pub struct MergedSeries {
    /// Empty when neither source had any rows in the window.
    pub points: Vec<HistoricalPoint>,
    pub strategy: CountStrategy,
    pub event_total: u64,
    pub imported_total: u64,
}

/// Bucket contributions into a gap-free series covering `range`.
///
/// Every bucket in the range is seeded with zero. Contributions outside
/// the range are ignored.
pub fn merge_contributions(
    range: &DateRange,
    granularity: Granularity,
    contributions: &[Contribution],
) -> Vec<HistoricalPoint> {
    let mut buckets: BTreeMap<NaiveDate, u64> = buckets_in_range(range, granularity)
        .into_iter()
        .map(|date| (date, 0))
        .collect();

    for contribution in contributions {
        if !range.contains(contribution.date()) {
            continue;
        }
        let bucket = bucket_start(contribution.date(), granularity);
        if let Some(total) = buckets.get_mut(&bucket) {
            *total += contribution.count();
        }
    }

    buckets
        .into_iter()
        .map(|(date, value)| HistoricalPoint { date, value })
        .collect()
}

/// Fetch both sources and merge them into one series.
///
/// Event counts follow [`COUNT_STRATEGY_PRECEDENCE`]: a failing aggregate
/// falls back to a record scan. Failure of the last strategy, or of the
/// import reader, is returned to the caller.
pub fn merge_history(
    conn: &Connection,
    events: &dyn EventRecordReader,
    imports: &dyn ImportedRecordReader,
    request: &MergeRequest,
) -> Result<MergedSeries, ForecastError> {
    let event_filter = EventFilter {
        subject: request.subject.clone(),
        division_id: request.division_id.clone(),
        range: request.range,
        allowed_states: request.allowed_states.clone(),
    };
    let import_filter = ImportFilter {
        subject: request.subject.clone(),
        division_id: request.division_id.clone(),
        range: request.range,
    };

    let mut contributions: Vec<Contribution> = Vec::new();
    let mut used = None;
    let mut last_error = None;
    for strategy in COUNT_STRATEGY_PRECEDENCE {
        match fetch_event_contributions(conn, events, &event_filter, strategy) {
            Ok(found) => {
                contributions = found;
                used = Some(strategy);
                break;
            }
            Err(e) => {
                tracing::warn!(?strategy, error = %e, "Event count strategy failed");
                last_error = Some(e);
            }
        }
    }
    let strategy = match (used, last_error) {
        (Some(strategy), _) => strategy,
        (None, Some(e)) => return Err(ForecastError::Database(e)),
        (None, None) => CountStrategy::RecordScan,
    };

    let event_total: u64 = contributions.iter().map(Contribution::count).sum();

    let imported: Vec<Contribution> = imports
        .list_imports(conn, &import_filter)?
        .iter()
        .map(Contribution::from)
        .collect();
    let imported_total: u64 = imported.iter().map(Contribution::count).sum();

    let has_rows = !contributions.is_empty() || !imported.is_empty();
    contributions.extend(imported);

    let points = if has_rows {
        merge_contributions(&request.range, request.granularity, &contributions)
    } else {
        Vec::new()
    };

    tracing::debug!(
        subject = %request.subject,
        granularity = %request.granularity,
        ?strategy,
        points = points.len(),
        event_total,
        imported_total,
        "Merged historical series"
    );

    Ok(MergedSeries {
        points,
        strategy,
        event_total,
        imported_total,
    })
}
