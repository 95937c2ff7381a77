use serde::{Deserialize, Serialize};

use super::enums::SubjectKind;

/// The entity being forecast: a service category or a disease category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub kind: SubjectKind,
    pub id: String,
}

impl Subject {
    pub fn service(id: impl Into<String>) -> Self {
        Self { kind: SubjectKind::Service, id: id.into() }
    }

    pub fn disease(id: impl Into<String>) -> Self {
        Self { kind: SubjectKind::Disease, id: id.into() }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
