use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::subject::Subject;

/// A manually entered historical tally (legacy paper records, field reports).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedAggregateRecord {
    pub id: Uuid,
    pub subject: Subject,
    pub division_id: Option<String>,
    pub record_date: NaiveDate,
    pub count: u32,
    pub provenance: String,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
}
