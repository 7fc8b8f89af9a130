//! Credential domain model.
//!
//! A credential is the scannable artifact bundle bound to one fully
//! approved request. The payload is a self-describing reference: enough
//! redundant identity/vehicle data for a checkpoint to sanity-check
//! offline, but no authority of its own — the live request status is
//! always re-checked at validation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The structured document encoded into the scannable artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialPayload {
    pub request_id: Uuid,
    pub plate: String,
    pub requester_name: String,
    pub national_id: String,
    pub issued_at: DateTime<Utc>,
}

impl CredentialPayload {
    /// The exact string encoded into the scannable artifact.
    pub fn to_scan_string(&self) -> String {
        // Serialization of this struct cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a raw scanned string. `None` means malformed.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: Uuid,
    /// The request this credential is bound to. At most one *active*
    /// credential exists per request.
    pub request_id: Uuid,
    /// Serialized [`CredentialPayload`] as encoded in the artifact.
    pub payload: String,
    /// Renderer-produced scannable image artifact.
    pub image_ref: String,
    /// Renderer-produced printable document artifact.
    pub document_ref: String,
    pub active: bool,
    pub issued_at: DateTime<Utc>,
    /// `None` = no expiry (retention window disabled).
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t < now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCredential {
    pub request_id: Uuid,
    pub payload: String,
    pub image_ref: String,
    pub document_ref: String,
    pub expires_at: Option<DateTime<Utc>>,
}
