//! Geographic division lookup cache.
//!
//! Divisions change rarely and are checked on every filtered request, so the
//! table is loaded once and reused until the TTL lapses. The cache is owned
//! by [`crate::core_state::CoreState`] and callers pass `now` explicitly, so
//! tests control staleness without sleeping.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::db::{self, DatabaseError};
use crate::models::Division;

struct Loaded {
    by_id: HashMap<String, Division>,
    loaded_at: DateTime<Utc>,
}

pub struct DivisionCache {
    ttl: Duration,
    loaded: Option<Loaded>,
}

impl DivisionCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs.max(0)),
            loaded: None,
        }
    }

    /// True when a load exists and is younger than the TTL at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.loaded
            .as_ref()
            .is_some_and(|l| now.signed_duration_since(l.loaded_at) < self.ttl)
    }

    fn ensure_loaded(&mut self, conn: &Connection, now: DateTime<Utc>) -> Result<&Loaded, DatabaseError> {
        if !self.is_fresh(now) {
            let divisions = db::list_divisions(conn)?;
            tracing::debug!(count = divisions.len(), "Loaded division table");
            self.loaded = Some(Loaded {
                by_id: divisions.into_iter().map(|d| (d.id.clone(), d)).collect(),
                loaded_at: now,
            });
        }
        match &self.loaded {
            Some(loaded) => Ok(loaded),
            None => Err(DatabaseError::NotFound {
                entity_type: "divisions".into(),
                id: "*".into(),
            }),
        }
    }

    /// Look up one division, reloading the table first if stale.
    pub fn get(
        &mut self,
        conn: &Connection,
        division_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Division>, DatabaseError> {
        Ok(self.ensure_loaded(conn, now)?.by_id.get(division_id).cloned())
    }

    /// Every division, ordered by name.
    pub fn list(&mut self, conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Division>, DatabaseError> {
        let mut all: Vec<Division> = self.ensure_loaded(conn, now)?.by_id.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    /// Drop the loaded table; the next lookup reads the database.
    pub fn invalidate(&mut self) {
        self.loaded = None;
    }
}
