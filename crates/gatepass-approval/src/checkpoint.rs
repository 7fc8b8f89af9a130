//! Checkpoint validator.
//!
//! Judges a scanned payload right now: resolve the credential, check
//! expiry, then re-fetch the live request and require `approved`. The
//! payload is only a hint — the live record is the authority. Every
//! scan, grant or deny, is audit-logged best-effort with the operator
//! identity.

use chrono::Utc;
use gatepass_core::error::{GatepassError, GatepassResult};
use gatepass_core::models::access_request::{AccessRequest, RequestStatus};
use gatepass_core::models::actor::Actor;
use gatepass_core::models::audit::{AuditKind, CreateAuditEntry};
use gatepass_core::models::credential::{Credential, CredentialPayload};
use gatepass_core::repository::{
    AccessRequestRepository, AuditLogRepository, CredentialRepository,
};
use tracing::warn;

/// Sanitized subject/vehicle summary shown to the gate operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectSummary {
    pub request_id: uuid::Uuid,
    pub requester_name: String,
    pub national_id: String,
    pub vehicle_plate: String,
    pub vehicle_model: Option<String>,
    pub vehicle_color: Option<String>,
    pub vehicle_photo: Option<String>,
    pub document_photo: Option<String>,
    pub expires_at: Option<chrono::DateTime<Utc>>,
}

impl SubjectSummary {
    /// Full summary from the live request plus credential expiry.
    fn from_request(request: &AccessRequest, credential: &Credential) -> Self {
        Self {
            request_id: request.id,
            requester_name: request.requester_name.clone(),
            national_id: request.national_id.clone(),
            vehicle_plate: request.vehicle_plate.clone(),
            vehicle_model: Some(request.vehicle_model.clone()),
            vehicle_color: Some(request.vehicle_color.clone()),
            vehicle_photo: request.vehicle_photo.clone(),
            document_photo: request.document_photo.clone(),
            expires_at: credential.expires_at,
        }
    }

    /// Partial summary reconstructed from the payload alone, for
    /// operator context on a deny.
    fn from_payload(payload: &CredentialPayload, credential: &Credential) -> Self {
        Self {
            request_id: payload.request_id,
            requester_name: payload.requester_name.clone(),
            national_id: payload.national_id.clone(),
            vehicle_plate: payload.plate.clone(),
            vehicle_model: None,
            vehicle_color: None,
            vehicle_photo: None,
            document_photo: None,
            expires_at: credential.expires_at,
        }
    }
}

/// Why access was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    MalformedPayload,
    CredentialNotFound,
    Expired,
    RequestNotApproved(RequestStatus),
}

impl DenyReason {
    fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MalformedPayload => "malformed_payload",
            DenyReason::CredentialNotFound => "credential_not_found",
            DenyReason::Expired => "expired",
            DenyReason::RequestNotApproved(_) => "request_not_approved",
        }
    }
}

/// The checkpoint judgement for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Grant(SubjectSummary),
    Deny {
        reason: DenyReason,
        summary: Option<SubjectSummary>,
    },
}

impl ScanOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, ScanOutcome::Grant(_))
    }
}

/// Validates scanned payloads against live request/credential state.
///
/// Read-only with respect to requests and credentials; only emits
/// audit entries.
pub struct CheckpointValidator<R, C, A>
where
    R: AccessRequestRepository,
    C: CredentialRepository,
    A: AuditLogRepository,
{
    requests: R,
    credentials: C,
    audit: A,
}

impl<R, C, A> CheckpointValidator<R, C, A>
where
    R: AccessRequestRepository,
    C: CredentialRepository,
    A: AuditLogRepository,
{
    pub fn new(requests: R, credentials: C, audit: A) -> Self {
        Self {
            requests,
            credentials,
            audit,
        }
    }

    /// Judge a raw scanned payload and audit the outcome.
    ///
    /// Business outcomes (including every deny) come back as
    /// `Ok(ScanOutcome)`; only storage failures surface as errors.
    pub async fn validate(&self, operator: &Actor, raw_payload: &str) -> GatepassResult<ScanOutcome> {
        let outcome = self.judge(raw_payload).await?;
        self.record_scan(operator, raw_payload, &outcome).await;
        Ok(outcome)
    }

    async fn judge(&self, raw_payload: &str) -> GatepassResult<ScanOutcome> {
        // 1. Parse.
        let Some(payload) = CredentialPayload::parse(raw_payload) else {
            return Ok(ScanOutcome::Deny {
                reason: DenyReason::MalformedPayload,
                summary: None,
            });
        };

        // 2. Resolve the active credential.
        let credential = match self
            .credentials
            .get_active_by_request(payload.request_id)
            .await
        {
            Ok(c) => c,
            Err(GatepassError::NotFound { .. }) => {
                return Ok(ScanOutcome::Deny {
                    reason: DenyReason::CredentialNotFound,
                    summary: None,
                });
            }
            Err(e) => return Err(e),
        };

        // 3. Expiry — still return the identity summary for operator
        //    context.
        if credential.is_expired(Utc::now()) {
            return Ok(ScanOutcome::Deny {
                reason: DenyReason::Expired,
                summary: Some(SubjectSummary::from_payload(&payload, &credential)),
            });
        }

        // 4. Mandatory live re-check of the request.
        let request = match self.requests.get_by_id(payload.request_id).await {
            Ok(r) => r,
            Err(GatepassError::NotFound { .. }) => {
                return Ok(ScanOutcome::Deny {
                    reason: DenyReason::CredentialNotFound,
                    summary: Some(SubjectSummary::from_payload(&payload, &credential)),
                });
            }
            Err(e) => return Err(e),
        };

        if request.status != RequestStatus::Approved {
            return Ok(ScanOutcome::Deny {
                reason: DenyReason::RequestNotApproved(request.status),
                summary: Some(SubjectSummary::from_payload(&payload, &credential)),
            });
        }

        // 5. Grant.
        Ok(ScanOutcome::Grant(SubjectSummary::from_request(
            &request,
            &credential,
        )))
    }

    /// Best-effort audit of a scan. A failed append is reported but
    /// never fails the scan itself.
    async fn record_scan(&self, operator: &Actor, raw_payload: &str, outcome: &ScanOutcome) {
        let (kind, description, target_request_id, target_description, metadata) = match outcome {
            ScanOutcome::Grant(summary) => (
                AuditKind::CredentialScanSuccess,
                format!("access granted for plate {}", summary.vehicle_plate),
                Some(summary.request_id),
                Some(format!("plate {}", summary.vehicle_plate)),
                serde_json::json!({ "outcome": "grant" }),
            ),
            ScanOutcome::Deny { reason, summary } => (
                AuditKind::CredentialScanFailed,
                format!("access denied: {}", reason.as_str()),
                summary.as_ref().map(|s| s.request_id),
                summary.as_ref().map(|s| format!("plate {}", s.vehicle_plate)),
                serde_json::json!({
                    "outcome": "deny",
                    "reason": reason.as_str(),
                    "raw_payload": raw_payload,
                }),
            ),
        };

        let entry = CreateAuditEntry {
            kind,
            description,
            actor_id: operator.id,
            actor_name: operator.name.clone(),
            target_user_id: None,
            target_request_id,
            target_description,
            metadata: Some(metadata),
        };

        if let Err(e) = self.audit.append(entry).await {
            warn!(error = %e, "Failed to append scan audit entry");
        }
    }
}
