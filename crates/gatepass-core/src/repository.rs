//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Mutations on access requests
//! must go through the state machine and be persisted with
//! [`AccessRequestRepository::update_checked`] so that read-decide-write
//! forms a single atomic unit per record; direct field writes are not a
//! supported path.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::GatepassResult;
use crate::models::{
    access_request::{AccessRequest, CreateAccessRequest, RequestStatus},
    audit::{AuditEntry, AuditKind, CreateAuditEntry},
    credential::{CreateCredential, Credential},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Access requests
// ---------------------------------------------------------------------------

pub trait AccessRequestRepository: Send + Sync {
    fn create(
        &self,
        input: CreateAccessRequest,
    ) -> impl Future<Output = GatepassResult<AccessRequest>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = GatepassResult<AccessRequest>> + Send;

    /// List requests whose status is in `statuses` (all statuses when
    /// empty), newest first.
    fn list(
        &self,
        statuses: &[RequestStatus],
        pagination: Pagination,
    ) -> impl Future<Output = GatepassResult<PaginatedResult<AccessRequest>>> + Send;

    /// List the requests owned by one requester, newest first.
    fn list_by_requester(
        &self,
        requester_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = GatepassResult<PaginatedResult<AccessRequest>>> + Send;

    /// Persist a state-machine decision. The write succeeds only if
    /// the stored version still equals `request.version`; otherwise a
    /// retryable `Conflict` is returned and the caller must re-read
    /// and re-decide. On success the returned record carries the
    /// bumped version.
    fn update_checked(
        &self,
        request: AccessRequest,
    ) -> impl Future<Output = GatepassResult<AccessRequest>> + Send;

    /// Hard-delete. Only the administrative purge path calls this, and
    /// only after retiring credentials and writing the audit entry.
    fn delete(&self, id: Uuid) -> impl Future<Output = GatepassResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

pub trait CredentialRepository: Send + Sync {
    fn create(
        &self,
        input: CreateCredential,
    ) -> impl Future<Output = GatepassResult<Credential>> + Send;

    /// Resolve the single active credential for a request.
    fn get_active_by_request(
        &self,
        request_id: Uuid,
    ) -> impl Future<Output = GatepassResult<Credential>> + Send;

    /// All credentials ever issued for a request, newest first.
    fn list_by_request(
        &self,
        request_id: Uuid,
    ) -> impl Future<Output = GatepassResult<Vec<Credential>>> + Send;

    /// Mark every active credential for a request inactive. Returns
    /// the number retired. Idempotent.
    fn retire_active(&self, request_id: Uuid) -> impl Future<Output = GatepassResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Audit ledger (append-only)
// ---------------------------------------------------------------------------

/// Query filters for audit entries.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub kind: Option<AuditKind>,
    pub actor_id: Option<Uuid>,
    pub target_request_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditEntry,
    ) -> impl Future<Output = GatepassResult<AuditEntry>> + Send;

    /// List entries matching `filter`, newest first.
    fn list(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> impl Future<Output = GatepassResult<PaginatedResult<AuditEntry>>> + Send;
}
