use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::EventStatus;
use super::subject::Subject;

/// One real occurrence (a completed transaction, a confirmed case).
/// Counts as 1 toward its date when its status is countable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEventRecord {
    pub id: Uuid,
    pub subject: Subject,
    pub division_id: Option<String>,
    pub event_date: NaiveDate,
    pub status: EventStatus,
}
