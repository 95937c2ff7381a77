use serde::{Deserialize, Serialize};

/// Administrative subdivision usable as a geographic filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Division {
    pub id: String,
    pub name: String,
}
