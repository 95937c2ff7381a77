//! Transport-agnostic application state.
//!
//! `CoreState` is built once at startup and shared (behind `Arc`) by
//! whatever transport serves the command layer. Request work opens its own
//! connection; the only state shared between requests is the division cache.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::authorization::{AccessGate, RoleAccessGate};
use crate::config::{self, ConfigError, ForecastConfig};
use crate::db;
use crate::division_cache::DivisionCache;
use crate::forecasting::ForecastService;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    /// SQLite database file. Created with its parent directory on first open.
    pub db_path: PathBuf,
    config: ForecastConfig,
    gate: Box<dyn AccessGate>,
    /// Geographic divisions, reloaded after `division_cache_ttl_secs`.
    division_cache: Mutex<DivisionCache>,
}

impl CoreState {
    pub fn new(db_path: PathBuf, config: ForecastConfig) -> Self {
        let division_cache = Mutex::new(DivisionCache::new(config.division_cache_ttl_secs));
        Self {
            db_path,
            config,
            gate: Box::new(RoleAccessGate),
            division_cache,
        }
    }

    /// State rooted at the application data directory, with the config
    /// file applied if present.
    pub fn from_app_data() -> Result<Self, CoreError> {
        let config = ForecastConfig::load(&config::config_path())?;
        Ok(Self::new(config::database_path(), config))
    }

    /// Replace the default role-based access gate.
    pub fn with_gate(mut self, gate: Box<dyn AccessGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a migrated connection to the database.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    /// Forecasting service over this state's config and gate.
    pub fn service(&self) -> ForecastService<'_> {
        ForecastService::new(&self.config, self.gate.as_ref())
    }

    /// Shared division cache. The service locks it only around a lookup.
    pub fn division_cache(&self) -> &Mutex<DivisionCache> {
        &self.division_cache
    }

    pub fn lock_divisions(&self) -> Result<MutexGuard<'_, DivisionCache>, CoreError> {
        self.division_cache.lock().map_err(|_| CoreError::LockPoisoned)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::{AccessDecision, Caller};
    use crate::models::Subject;

    #[test]
    fn open_db_creates_migrated_database() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::new(dir.path().join("nested").join("forecast.db"), ForecastConfig::default());

        let conn = state.open_db().unwrap();
        assert_eq!(db::count_tables(&conn).unwrap(), 6);
        assert!(state.db_path().exists());
    }

    #[test]
    fn division_cache_uses_configured_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let config = ForecastConfig { division_cache_ttl_secs: 0, ..ForecastConfig::default() };
        let state = CoreState::new(dir.path().join("forecast.db"), config);
        let conn = state.open_db().unwrap();

        let mut divisions = state.lock_divisions().unwrap();
        divisions.list(&conn, chrono::Utc::now()).unwrap();
        assert!(!divisions.is_fresh(chrono::Utc::now()));
    }

    struct DenyAll;

    impl AccessGate for DenyAll {
        fn authorize(&self, _: &Caller, _: &Subject) -> AccessDecision {
            RoleAccessGate.authorize(
                &Caller { id: "nobody".into(), role: crate::authorization::Role::Viewer, assigned_subject: None },
                &Subject::service("any"),
            )
        }
    }

    #[test]
    fn custom_gate_replaces_default() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::new(dir.path().join("forecast.db"), ForecastConfig::default())
            .with_gate(Box::new(DenyAll));
        let decision = state.gate.authorize(&Caller::global("mho-01"), &Subject::service("prenatal"));
        assert!(!decision.allowed);
    }
}
