//! Forecasting commands.
//!
//! Five commands:
//! - `generate_forecast`: recompute, optionally replacing the stored batch
//! - `fetch_forecast`: chart data, from the stored batch when present
//! - `invalidate_forecast`: drop stored points for a date range
//! - `import_aggregates`: bulk-insert manually entered historical tallies
//! - `list_divisions`: geographic filters available to the UI

use chrono::Utc;

use crate::authorization::Caller;
use crate::core_state::CoreState;
use crate::forecasting::{
    FetchRequest, FetchResponse, GenerateRequest, GenerateResponse, ImportResponse, ImportRow,
    InvalidateRequest,
};
use crate::models::Division;

/// Runs the forecasting pipeline for one subject.
pub fn generate_forecast(
    state: &CoreState,
    caller: &Caller,
    request: GenerateRequest,
) -> Result<GenerateResponse, String> {
    let conn = state.open_db().map_err(|e| e.to_string())?;
    state
        .service()
        .generate(&conn, state.division_cache(), caller, &request, Utc::now())
        .map_err(|e| e.to_string())
}

/// Historical actuals and forecast for charting.
pub fn fetch_forecast(
    state: &CoreState,
    caller: &Caller,
    request: FetchRequest,
) -> Result<FetchResponse, String> {
    let conn = state.open_db().map_err(|e| e.to_string())?;
    state
        .service()
        .fetch(&conn, state.division_cache(), caller, &request, Utc::now())
        .map_err(|e| e.to_string())
}

/// Returns the number of stored points removed.
pub fn invalidate_forecast(
    state: &CoreState,
    caller: &Caller,
    request: InvalidateRequest,
) -> Result<usize, String> {
    let conn = state.open_db().map_err(|e| e.to_string())?;
    state
        .service()
        .invalidate(&conn, caller, &request)
        .map_err(|e| e.to_string())
}

pub fn import_aggregates(
    state: &CoreState,
    caller: &Caller,
    rows: Vec<ImportRow>,
) -> Result<ImportResponse, String> {
    if rows.len() > 10_000 {
        return Err("Too many rows in one import (max 10000)".into());
    }
    let conn = state.open_db().map_err(|e| e.to_string())?;
    state
        .service()
        .import_aggregates(&conn, state.division_cache(), caller, &rows, Utc::now())
        .map_err(|e| e.to_string())
}

pub fn list_divisions(state: &CoreState) -> Result<Vec<Division>, String> {
    let conn = state.open_db().map_err(|e| e.to_string())?;
    let mut divisions = state.lock_divisions().map_err(|e| e.to_string())?;
    divisions.list(&conn, Utc::now()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastConfig;
    use crate::db::repository::upsert_division;
    use crate::models::enums::Granularity;
    use crate::models::{DateRange, Subject};
    use chrono::{Duration, NaiveDate};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn state(dir: &tempfile::TempDir) -> CoreState {
        CoreState::new(dir.path().join("forecast.db"), ForecastConfig::default())
    }

    fn rows(start: NaiveDate, values: &[i64]) -> Vec<ImportRow> {
        values
            .iter()
            .enumerate()
            .map(|(i, &count)| ImportRow {
                subject: Subject::disease("dengue"),
                division_id: None,
                record_date: start + Duration::days(i as i64),
                count,
                provenance: "surveillance ledger".into(),
                note: None,
            })
            .collect()
    }

    #[test]
    fn import_generate_fetch_invalidate_round() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let caller = Caller::scoped("epi-nurse", Subject::disease("dengue"));

        let imported = import_aggregates(&state, &caller, rows(d(2024, 7, 1), &[3, 4, 6, 5, 7, 4, 5, 6, 8, 5])).unwrap();
        assert_eq!(imported.inserted, 10);

        let generated = generate_forecast(&state, &caller, GenerateRequest {
            subject: Subject::disease("dengue"),
            division_id: None,
            horizon: 7,
            granularity: Granularity::Daily,
            auto_save: true,
            periods_back: Some(10),
            as_of: Some(d(2024, 7, 10)),
        })
        .unwrap();
        assert!(generated.saved);
        assert_eq!(generated.saved_count, 7);

        let fetch = FetchRequest {
            subject: Subject::disease("dengue"),
            division_id: None,
            granularity: Granularity::Daily,
            periods_back: Some(10),
            periods_forecast: 7,
            as_of: Some(d(2024, 7, 10)),
        };
        let cached = fetch_forecast(&state, &caller, fetch.clone()).unwrap();
        assert!(cached.used_cache);
        assert_eq!(cached.forecast, generated.points);

        let removed = invalidate_forecast(&state, &caller, InvalidateRequest {
            subject: Subject::disease("dengue"),
            division_id: None,
            granularity: Granularity::Daily,
            range: DateRange { start: d(2024, 7, 11), end: d(2024, 7, 17) },
        })
        .unwrap();
        assert_eq!(removed, 7);

        let recomputed = fetch_forecast(&state, &caller, fetch).unwrap();
        assert!(!recomputed.used_cache);
        assert_eq!(recomputed.forecast.len(), 7);
    }

    #[test]
    fn errors_surface_as_messages() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let caller = Caller::scoped("tb-coordinator", Subject::disease("tuberculosis"));

        let err = generate_forecast(&state, &caller, GenerateRequest {
            subject: Subject::disease("dengue"),
            division_id: None,
            horizon: 7,
            granularity: Granularity::Daily,
            auto_save: false,
            periods_back: Some(10),
            as_of: Some(d(2024, 7, 10)),
        })
        .unwrap_err();
        assert!(err.contains("not authorized"), "{err}");

        let err = import_aggregates(&state, &Caller::global("mho-01"), rows(d(2024, 7, 1), &[-2])).unwrap_err();
        assert!(err.starts_with("Invalid request"), "{err}");
    }

    #[test]
    fn generate_request_parses_from_json() {
        let request: GenerateRequest = serde_json::from_str(
            r#"{
                "subject": {"kind": "service", "id": "immunization"},
                "horizon": 6,
                "granularity": "monthly"
            }"#,
        )
        .unwrap();
        assert_eq!(request.granularity, Granularity::Monthly);
        assert!(!request.auto_save);
        assert!(request.division_id.is_none() && request.periods_back.is_none());
    }

    #[test]
    fn division_cache_free_after_command() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let conn = state.open_db().unwrap();
        upsert_division(&conn, &Division { id: "brgy-07".into(), name: "Mabini".into() }).unwrap();
        let caller = Caller::global("mho-01");

        let mut import = rows(d(2024, 7, 1), &[2, 3, 4, 3, 5, 4, 3, 4]);
        for row in &mut import {
            row.division_id = Some("brgy-07".into());
        }
        import_aggregates(&state, &caller, import).unwrap();
        let fetched = fetch_forecast(&state, &caller, FetchRequest {
            subject: Subject::disease("dengue"),
            division_id: Some("brgy-07".into()),
            granularity: Granularity::Daily,
            periods_back: Some(8),
            periods_forecast: 3,
            as_of: Some(d(2024, 7, 8)),
        })
        .unwrap();
        assert_eq!(fetched.forecast.len(), 3);

        let cache = state.division_cache().try_lock();
        assert!(cache.is_ok_and(|c| c.is_fresh(Utc::now())));
    }

    #[test]
    fn list_divisions_reads_through_cache() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let conn = state.open_db().unwrap();
        upsert_division(&conn, &Division { id: "brgy-07".into(), name: "Mabini".into() }).unwrap();

        let all = list_divisions(&state).unwrap();
        assert_eq!(all, vec![Division { id: "brgy-07".into(), name: "Mabini".into() }]);
    }
}
