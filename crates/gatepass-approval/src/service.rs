//! Approval service — workflow orchestration.
//!
//! Every mutation follows the same shape: fetch the current record,
//! run the pure state machine, persist the decision with an optimistic
//! version check, and only then react — audit the transition and
//! execute side effects. A lost race on the write surfaces as a
//! retryable conflict and is re-driven from fresh state, so a
//! concurrent double-submit can never violate the idempotency guards
//! or double-trigger issuance.

use chrono::Utc;
use gatepass_core::error::{GatepassError, GatepassResult};
use gatepass_core::models::access_request::{
    AccessRequest, ApprovalLevel, CreateAccessRequest, RequestStatus,
};
use gatepass_core::models::actor::{Actor, Authority};
use gatepass_core::models::audit::{AuditKind, CreateAuditEntry};
use gatepass_core::models::credential::Credential;
use gatepass_core::repository::{
    AccessRequestRepository, AuditFilter, AuditLogRepository, CredentialRepository,
    PaginatedResult, Pagination,
};
use gatepass_core::state::{Action, Decision, SideEffect, decide};
use tracing::{info, warn};

use crate::config::ApprovalConfig;
use crate::issuer::CredentialIssuer;
use crate::render::ArtifactRenderer;

/// Result of an approval call. The transition is committed even when
/// issuance afterwards fails; `issuance_error` reports that failure
/// without undoing the approval — `regenerate` recovers it.
#[derive(Debug)]
pub struct ApprovalOutcome {
    pub request: AccessRequest,
    pub credential: Option<Credential>,
    pub issuance_error: Option<String>,
}

/// Orchestrates the permit workflow over the repository contracts.
pub struct ApprovalService<R, C, A, X>
where
    R: AccessRequestRepository,
    C: CredentialRepository + Clone,
    A: AuditLogRepository,
    X: ArtifactRenderer,
{
    requests: R,
    credentials: C,
    audit: A,
    issuer: CredentialIssuer<C, X>,
    config: ApprovalConfig,
}

impl<R, C, A, X> ApprovalService<R, C, A, X>
where
    R: AccessRequestRepository,
    C: CredentialRepository + Clone,
    A: AuditLogRepository,
    X: ArtifactRenderer,
{
    pub fn new(requests: R, credentials: C, audit: A, renderer: X, config: ApprovalConfig) -> Self {
        let issuer = CredentialIssuer::new(credentials.clone(), renderer, config.clone());
        Self {
            requests,
            credentials,
            audit,
            issuer,
            config,
        }
    }

    // -------------------------------------------------------------------
    // Submission
    // -------------------------------------------------------------------

    /// Create a new request in `pending`.
    ///
    /// Covers both the requester path and the on-behalf-of path: when
    /// the submitting actor is not the requester, an authority level
    /// is required and the `created_by_admin` flag plus creator
    /// reference are set. The vehicle plate is normalized to
    /// uppercase.
    pub async fn submit(
        &self,
        actor: &Actor,
        mut input: CreateAccessRequest,
    ) -> GatepassResult<AccessRequest> {
        validate_submission(&input)?;
        input.vehicle_plate = input.vehicle_plate.trim().to_uppercase();

        let on_behalf = input.requester_id != Some(actor.id);
        if on_behalf {
            if actor.authority == Authority::None {
                return Err(GatepassError::Validation {
                    message: "only an authority may submit a request on \
                              someone's behalf"
                        .into(),
                });
            }
            input.created_by_admin = true;
            input.created_by = Some(actor.id);
        } else {
            input.created_by_admin = false;
            input.created_by = None;
        }

        let request = self.requests.create(input).await?;
        info!(request_id = %request.id, on_behalf, "Access request created");

        self.record_audit(CreateAuditEntry {
            kind: AuditKind::RequestCreated,
            description: format!(
                "access request created for plate {}",
                request.vehicle_plate
            ),
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            target_user_id: request.requester_id,
            target_request_id: Some(request.id),
            target_description: Some(format!("plate {}", request.vehicle_plate)),
            metadata: Some(serde_json::json!({ "on_behalf": on_behalf })),
        })
        .await;

        Ok(request)
    }

    // -------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------

    /// Approve one slot of a request.
    ///
    /// On the transition into fully approved, issuance runs after the
    /// commit; its failure is reported in the outcome, never as an
    /// error that reverts the approval.
    pub async fn approve(
        &self,
        actor: &Actor,
        request_id: uuid::Uuid,
        level: ApprovalLevel,
        comments: Option<String>,
    ) -> GatepassResult<ApprovalOutcome> {
        let decision = self
            .apply(request_id, actor, || Action::Approve {
                level,
                comments: comments.clone(),
            })
            .await?;
        let request = decision.request;

        let kind = match level {
            ApprovalLevel::Level1 => AuditKind::RequestApprovedLevel1,
            ApprovalLevel::Level2 => AuditKind::RequestApprovedLevel2,
        };
        self.record_audit(CreateAuditEntry {
            kind,
            description: format!(
                "request approved at {level} for plate {}",
                request.vehicle_plate
            ),
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            target_user_id: request.requester_id,
            target_request_id: Some(request.id),
            target_description: Some(format!("plate {}", request.vehicle_plate)),
            metadata: comments
                .as_ref()
                .map(|c| serde_json::json!({ "comments": c })),
        })
        .await;

        let mut outcome = ApprovalOutcome {
            request,
            credential: None,
            issuance_error: None,
        };

        if decision.effects.contains(&SideEffect::IssueCredential) {
            // React after commit: the approval is durable regardless
            // of what happens here.
            match self.issuer.issue(&outcome.request).await {
                Ok(credential) => {
                    self.record_audit(CreateAuditEntry {
                        kind: AuditKind::CredentialIssued,
                        description: format!(
                            "credential issued for plate {}",
                            outcome.request.vehicle_plate
                        ),
                        actor_id: actor.id,
                        actor_name: actor.name.clone(),
                        target_user_id: outcome.request.requester_id,
                        target_request_id: Some(outcome.request.id),
                        target_description: Some(format!(
                            "plate {}",
                            outcome.request.vehicle_plate
                        )),
                        metadata: Some(serde_json::json!({
                            "credential_id": credential.id,
                        })),
                    })
                    .await;
                    outcome.credential = Some(credential);
                }
                Err(e) => {
                    warn!(
                        request_id = %outcome.request.id,
                        error = %e,
                        "Credential issuance failed after committed approval"
                    );
                    outcome.issuance_error = Some(e.to_string());
                }
            }
        }

        Ok(outcome)
    }

    /// Reject a request with a mandatory reason. Legal from any
    /// non-terminal status.
    pub async fn reject(
        &self,
        actor: &Actor,
        request_id: uuid::Uuid,
        reason: String,
    ) -> GatepassResult<AccessRequest> {
        let decision = self
            .apply(request_id, actor, || Action::Reject {
                reason: reason.clone(),
            })
            .await?;
        let request = decision.request;

        self.record_audit(CreateAuditEntry {
            kind: AuditKind::RequestRejected,
            description: format!(
                "request rejected for plate {}: {reason}",
                request.vehicle_plate
            ),
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            target_user_id: request.requester_id,
            target_request_id: Some(request.id),
            target_description: Some(format!("plate {}", request.vehicle_plate)),
            metadata: Some(serde_json::json!({ "reason": reason })),
        })
        .await;

        Ok(request)
    }

    /// Administrative purge. Restricted to the highest authority;
    /// retires any active credential and audit-logs before removal.
    pub async fn delete(&self, actor: &Actor, request_id: uuid::Uuid) -> GatepassResult<()> {
        let current = self.requests.get_by_id(request_id).await?;
        let decision = decide(&current, Action::Delete, actor, Utc::now())
            .map_err(GatepassError::Guard)?;

        // Log first: the entry must precede the removal it describes.
        self.record_audit(CreateAuditEntry {
            kind: AuditKind::RequestDeleted,
            description: format!(
                "request deleted for plate {}",
                current.vehicle_plate
            ),
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            target_user_id: current.requester_id,
            target_request_id: Some(current.id),
            target_description: Some(format!("plate {}", current.vehicle_plate)),
            metadata: Some(serde_json::json!({
                "status_at_deletion": format!("{:?}", current.status),
            })),
        })
        .await;

        if decision.effects.contains(&SideEffect::RetireCredentials) {
            let retired = self.credentials.retire_active(request_id).await?;
            if retired > 0 {
                info!(request_id = %request_id, retired, "Retired credentials on purge");
            }
        }

        self.requests.delete(request_id).await?;
        info!(request_id = %request_id, "Access request purged");
        Ok(())
    }

    /// Re-issue the credential for an approved request, retiring the
    /// prior one. Recovers from renderer failures during approval.
    pub async fn regenerate(
        &self,
        actor: &Actor,
        request_id: uuid::Uuid,
    ) -> GatepassResult<Credential> {
        if actor.authority == Authority::None {
            return Err(GatepassError::Validation {
                message: "only an authority may regenerate a credential".into(),
            });
        }

        let request = self.requests.get_by_id(request_id).await?;
        let credential = self.issuer.regenerate(&request).await?;

        self.record_audit(CreateAuditEntry {
            kind: AuditKind::CredentialRegenerated,
            description: format!(
                "credential regenerated for plate {}",
                request.vehicle_plate
            ),
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            target_user_id: request.requester_id,
            target_request_id: Some(request.id),
            target_description: Some(format!("plate {}", request.vehicle_plate)),
            metadata: Some(serde_json::json!({
                "credential_id": credential.id,
            })),
        })
        .await;

        Ok(credential)
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    pub async fn get(&self, request_id: uuid::Uuid) -> GatepassResult<AccessRequest> {
        self.requests.get_by_id(request_id).await
    }

    pub async fn list(
        &self,
        statuses: &[RequestStatus],
        pagination: Pagination,
    ) -> GatepassResult<PaginatedResult<AccessRequest>> {
        self.requests.list(statuses, pagination).await
    }

    pub async fn list_by_requester(
        &self,
        requester_id: uuid::Uuid,
        pagination: Pagination,
    ) -> GatepassResult<PaginatedResult<AccessRequest>> {
        self.requests.list_by_requester(requester_id, pagination).await
    }

    /// Browse the audit ledger (e.g. scan history via a kind filter).
    pub async fn audit_trail(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> GatepassResult<PaginatedResult<gatepass_core::models::audit::AuditEntry>> {
        self.audit.list(filter, pagination).await
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    /// Run one read-decide-write cycle, retrying a bounded number of
    /// times when the optimistic write loses the race. Guard
    /// violations abort immediately — they are decisions, not races.
    async fn apply(
        &self,
        request_id: uuid::Uuid,
        actor: &Actor,
        action: impl Fn() -> Action,
    ) -> GatepassResult<Decision> {
        let mut attempt = 0;
        loop {
            let current = self.requests.get_by_id(request_id).await?;
            let decision =
                decide(&current, action(), actor, Utc::now()).map_err(GatepassError::Guard)?;

            match self.requests.update_checked(decision.request.clone()).await {
                Ok(committed) => {
                    return Ok(Decision {
                        request: committed,
                        effects: decision.effects,
                    });
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_transition_retries => {
                    attempt += 1;
                    warn!(
                        request_id = %request_id,
                        attempt,
                        "Lost transition race, re-reading current state"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Best-effort audit append. Failures are reported, never rolled
    /// back into the transition they describe.
    async fn record_audit(&self, entry: CreateAuditEntry) {
        if let Err(e) = self.audit.append(entry).await {
            warn!(error = %e, "Failed to append audit entry");
        }
    }
}

fn validate_submission(input: &CreateAccessRequest) -> GatepassResult<()> {
    let required = [
        ("requester_name", &input.requester_name),
        ("national_id", &input.national_id),
        ("email", &input.email),
        ("phone", &input.phone),
        ("program", &input.program),
        ("vehicle_plate", &input.vehicle_plate),
        ("vehicle_model", &input.vehicle_model),
        ("vehicle_color", &input.vehicle_color),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(GatepassError::Validation {
                message: format!("{field} must not be empty"),
            });
        }
    }
    Ok(())
}
