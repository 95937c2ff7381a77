//! Subject-level access control for forecasting requests.
//!
//! Role cascade, checked in order, default deny:
//! 1. Global operator → any subject
//! 2. Scoped operator → only the assigned subject
//! 3. Anything else → DENY
//!
//! The gate is consulted before any database access or computation.

use serde::{Deserialize, Serialize};

use crate::models::Subject;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Municipal health office staff: every service and disease.
    Global,
    /// Program coordinator: one assigned subject.
    Scoped,
    /// Read-only dashboard user. Cannot run forecasts.
    Viewer,
}

/// Identity of whoever is asking for a forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub role: Role,
    /// Only meaningful for [`Role::Scoped`].
    #[serde(default)]
    pub assigned_subject: Option<Subject>,
}

impl Caller {
    pub fn global(id: impl Into<String>) -> Self {
        Self { id: id.into(), role: Role::Global, assigned_subject: None }
    }

    pub fn scoped(id: impl Into<String>, subject: Subject) -> Self {
        Self { id: id.into(), role: Role::Scoped, assigned_subject: Some(subject) }
    }
}

/// Why access was granted or denied, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    GlobalOperator,
    AssignedSubject,
    /// Scoped caller asking for a subject other than their own.
    NotAssigned,
    /// Role never grants forecasting.
    RoleDenied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    fn allow(reason: AccessReason) -> Self {
        Self { allowed: true, reason }
    }

    fn deny(reason: AccessReason) -> Self {
        Self { allowed: false, reason }
    }
}

// ═══════════════════════════════════════════════════════════
// Gate
// ═══════════════════════════════════════════════════════════

pub trait AccessGate: Send + Sync {
    fn authorize(&self, caller: &Caller, subject: &Subject) -> AccessDecision;
}

/// Default gate: decides from the caller's role alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleAccessGate;

impl AccessGate for RoleAccessGate {
    fn authorize(&self, caller: &Caller, subject: &Subject) -> AccessDecision {
        let decision = match caller.role {
            Role::Global => AccessDecision::allow(AccessReason::GlobalOperator),
            Role::Scoped if caller.assigned_subject.as_ref() == Some(subject) => {
                AccessDecision::allow(AccessReason::AssignedSubject)
            }
            Role::Scoped => AccessDecision::deny(AccessReason::NotAssigned),
            Role::Viewer => AccessDecision::deny(AccessReason::RoleDenied),
        };
        if !decision.allowed {
            tracing::warn!(
                caller = %caller.id,
                subject = %subject,
                reason = ?decision.reason,
                "Forecast access denied"
            );
        }
        decision
    }
}
