//! Credential issuer.
//!
//! Mints the scannable credential bound to one fully approved request.
//! Issuance always retires any previously active credential first, so
//! a retried or duplicated trigger cannot leave two active credentials
//! behind — the invariant is at most one active credential per request.

use chrono::{Duration, Utc};
use gatepass_core::error::{GatepassError, GatepassResult};
use gatepass_core::models::access_request::{AccessRequest, RequestStatus};
use gatepass_core::models::credential::{CreateCredential, Credential, CredentialPayload};
use gatepass_core::repository::CredentialRepository;
use tracing::info;

use crate::config::ApprovalConfig;
use crate::render::ArtifactRenderer;

/// Mints credentials for fully approved requests.
pub struct CredentialIssuer<C: CredentialRepository, X: ArtifactRenderer> {
    credentials: C,
    renderer: X,
    config: ApprovalConfig,
}

impl<C: CredentialRepository, X: ArtifactRenderer> CredentialIssuer<C, X> {
    pub fn new(credentials: C, renderer: X, config: ApprovalConfig) -> Self {
        Self {
            credentials,
            renderer,
            config,
        }
    }

    /// Issue a credential for `request`. Callable only when the
    /// request is fully approved.
    ///
    /// Steps: build the payload, delegate rendering, compute expiry
    /// from the retention window, persist with `active = true`. Any
    /// stale active credential is retired first.
    pub async fn issue(&self, request: &AccessRequest) -> GatepassResult<Credential> {
        if request.status != RequestStatus::Approved {
            return Err(GatepassError::Validation {
                message: format!(
                    "credential issuance requires an approved request, \
                     found {:?}",
                    request.status
                ),
            });
        }

        let issued_at = Utc::now();
        let payload = CredentialPayload {
            request_id: request.id,
            plate: request.vehicle_plate.clone(),
            requester_name: request.requester_name.clone(),
            national_id: request.national_id.clone(),
            issued_at,
        };

        let artifacts = self
            .renderer
            .render(&payload, request)
            .await
            .map_err(|e| GatepassError::Renderer(e.to_string()))?;

        let expires_at = match self.config.credential_retention_days {
            0 => None,
            days => Some(issued_at + Duration::days(i64::from(days))),
        };

        let retired = self.credentials.retire_active(request.id).await?;
        if retired > 0 {
            info!(
                request_id = %request.id,
                retired,
                "Retired stale credentials before issuance"
            );
        }

        let credential = self
            .credentials
            .create(CreateCredential {
                request_id: request.id,
                payload: payload.to_scan_string(),
                image_ref: artifacts.image_ref,
                document_ref: artifacts.document_ref,
                expires_at,
            })
            .await?;

        info!(
            request_id = %request.id,
            credential_id = %credential.id,
            "Credential issued"
        );

        Ok(credential)
    }

    /// Re-run issuance for a request whose rendering previously failed
    /// or whose artifacts need refreshing. Retires the prior credential
    /// and mints a fresh one with a new issuance timestamp.
    pub async fn regenerate(&self, request: &AccessRequest) -> GatepassResult<Credential> {
        self.issue(request).await
    }
}
