//! Audit ledger domain model.
//!
//! Entries are append-only and denormalize enough actor/target context
//! to stay readable without joining to mutable tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed taxonomy of auditable actions. The `user_*` and
/// `password_changed` kinds originate from the identity subsystem,
/// which shares this ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    RequestCreated,
    RequestApprovedLevel1,
    RequestApprovedLevel2,
    RequestRejected,
    RequestDeleted,
    CredentialIssued,
    CredentialRegenerated,
    CredentialScanSuccess,
    CredentialScanFailed,
    UserCreated,
    UserRoleChanged,
    UserStatusChanged,
    UserDeleted,
    PasswordChanged,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::RequestCreated => "request_created",
            AuditKind::RequestApprovedLevel1 => "request_approved_level1",
            AuditKind::RequestApprovedLevel2 => "request_approved_level2",
            AuditKind::RequestRejected => "request_rejected",
            AuditKind::RequestDeleted => "request_deleted",
            AuditKind::CredentialIssued => "credential_issued",
            AuditKind::CredentialRegenerated => "credential_regenerated",
            AuditKind::CredentialScanSuccess => "credential_scan_success",
            AuditKind::CredentialScanFailed => "credential_scan_failed",
            AuditKind::UserCreated => "user_created",
            AuditKind::UserRoleChanged => "user_role_changed",
            AuditKind::UserStatusChanged => "user_status_changed",
            AuditKind::UserDeleted => "user_deleted",
            AuditKind::PasswordChanged => "password_changed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "request_created" => AuditKind::RequestCreated,
            "request_approved_level1" => AuditKind::RequestApprovedLevel1,
            "request_approved_level2" => AuditKind::RequestApprovedLevel2,
            "request_rejected" => AuditKind::RequestRejected,
            "request_deleted" => AuditKind::RequestDeleted,
            "credential_issued" => AuditKind::CredentialIssued,
            "credential_regenerated" => AuditKind::CredentialRegenerated,
            "credential_scan_success" => AuditKind::CredentialScanSuccess,
            "credential_scan_failed" => AuditKind::CredentialScanFailed,
            "user_created" => AuditKind::UserCreated,
            "user_role_changed" => AuditKind::UserRoleChanged,
            "user_status_changed" => AuditKind::UserStatusChanged,
            "user_deleted" => AuditKind::UserDeleted,
            "password_changed" => AuditKind::PasswordChanged,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub kind: AuditKind,
    pub description: String,
    pub actor_id: Uuid,
    /// Actor display name at the time of the action. Kept even if the
    /// account later changes.
    pub actor_name: String,
    pub target_user_id: Option<Uuid>,
    pub target_request_id: Option<Uuid>,
    /// Denormalized target context (e.g. vehicle plate).
    pub target_description: Option<String>,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditEntry {
    pub kind: AuditKind,
    pub description: String,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub target_user_id: Option<Uuid>,
    pub target_request_id: Option<Uuid>,
    pub target_description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}
