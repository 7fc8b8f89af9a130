//! Integration tests for checkpoint validation using in-memory
//! SurrealDB.

use chrono::{Duration, Utc};
use gatepass_approval::checkpoint::{CheckpointValidator, DenyReason, ScanOutcome};
use gatepass_approval::config::ApprovalConfig;
use gatepass_approval::render::{ArtifactRenderer, RenderError, RenderedArtifacts};
use gatepass_approval::service::ApprovalService;
use gatepass_core::models::access_request::{
    AccessRequest, ApprovalLevel, CreateAccessRequest, DenialRecord, RequestStatus,
};
use gatepass_core::models::actor::{Actor, Authority};
use gatepass_core::models::audit::AuditKind;
use gatepass_core::models::credential::{CreateCredential, CredentialPayload};
use gatepass_core::repository::{
    AccessRequestRepository, AuditFilter, AuditLogRepository, CredentialRepository, Pagination,
};
use gatepass_db::repository::{
    SurrealAccessRequestRepository, SurrealAuditLogRepository, SurrealCredentialRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

type Db = surrealdb::engine::local::Db;

#[derive(Clone)]
struct StubRenderer;

impl ArtifactRenderer for StubRenderer {
    async fn render(
        &self,
        payload: &CredentialPayload,
        _request: &AccessRequest,
    ) -> Result<RenderedArtifacts, RenderError> {
        Ok(RenderedArtifacts {
            image_ref: format!("/credentials/scan-{}.png", payload.request_id),
            document_ref: format!("/credentials/permit-{}.pdf", payload.request_id),
        })
    }
}

struct Fixture {
    service: ApprovalService<
        SurrealAccessRequestRepository<Db>,
        SurrealCredentialRepository<Db>,
        SurrealAuditLogRepository<Db>,
        StubRenderer,
    >,
    validator: CheckpointValidator<
        SurrealAccessRequestRepository<Db>,
        SurrealCredentialRepository<Db>,
        SurrealAuditLogRepository<Db>,
    >,
    requests: SurrealAccessRequestRepository<Db>,
    credentials: SurrealCredentialRepository<Db>,
    audit: SurrealAuditLogRepository<Db>,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    gatepass_db::run_migrations(&db).await.unwrap();

    let requests = SurrealAccessRequestRepository::new(db.clone());
    let credentials = SurrealCredentialRepository::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db.clone());

    let service = ApprovalService::new(
        requests.clone(),
        credentials.clone(),
        audit.clone(),
        StubRenderer,
        ApprovalConfig::default(),
    );
    let validator =
        CheckpointValidator::new(requests.clone(), credentials.clone(), audit.clone());

    Fixture {
        service,
        validator,
        requests,
        credentials,
        audit,
    }
}

fn operator() -> Actor {
    Actor::new(Uuid::new_v4(), "Gate Operator", Authority::None)
}

fn submission(requester_id: Uuid, plate: &str) -> CreateAccessRequest {
    CreateAccessRequest {
        requester_id: Some(requester_id),
        created_by_admin: false,
        created_by: None,
        requester_name: "Maria Gonzalez".into(),
        national_id: "12345678-5".into(),
        email: "maria@example.com".into(),
        phone: "+56 9 1234 5678".into(),
        program: "Automotive Mechanics".into(),
        vehicle_plate: plate.into(),
        vehicle_model: "Toyota Corolla".into(),
        vehicle_color: "Red".into(),
        garage_location: None,
        modification_notes: None,
        vehicle_photo: None,
        document_photo: None,
    }
}

/// Submit and fully approve a request; returns it with the scannable
/// payload of its issued credential.
async fn approved_request(fx: &Fixture, plate: &str) -> (AccessRequest, String) {
    let requester = Actor::new(Uuid::new_v4(), "Maria Gonzalez", Authority::None);
    let request = fx
        .service
        .submit(&requester, submission(requester.id, plate))
        .await
        .unwrap();

    fx.service
        .approve(
            &Actor::new(Uuid::new_v4(), "Reviewer One", Authority::Level1),
            request.id,
            ApprovalLevel::Level1,
            None,
        )
        .await
        .unwrap();
    let outcome = fx
        .service
        .approve(
            &Actor::new(Uuid::new_v4(), "Reviewer Two", Authority::Level2),
            request.id,
            ApprovalLevel::Level2,
            None,
        )
        .await
        .unwrap();

    let credential = outcome.credential.unwrap();
    (outcome.request, credential.payload)
}

#[tokio::test]
async fn valid_credential_is_granted_with_subject_summary() {
    let fx = setup().await;
    let (request, payload) = approved_request(&fx, "SCAN01").await;

    let outcome = fx.validator.validate(&operator(), &payload).await.unwrap();
    let ScanOutcome::Grant(summary) = outcome else {
        panic!("expected grant, got {outcome:?}");
    };

    assert_eq!(summary.request_id, request.id);
    assert_eq!(summary.vehicle_plate, "SCAN01");
    assert_eq!(summary.requester_name, "Maria Gonzalez");
    assert_eq!(summary.vehicle_model.as_deref(), Some("Toyota Corolla"));
    assert!(summary.expires_at.is_some());
}

#[tokio::test]
async fn malformed_payload_is_denied() {
    let fx = setup().await;

    let outcome = fx
        .validator
        .validate(&operator(), "not a payload {")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Deny {
            reason: DenyReason::MalformedPayload,
            summary: None,
        }
    );
}

#[tokio::test]
async fn unknown_credential_is_denied() {
    let fx = setup().await;

    // Syntactically valid payload that references no stored credential.
    let payload = CredentialPayload {
        request_id: Uuid::new_v4(),
        plate: "GHOST1".into(),
        requester_name: "Nobody".into(),
        national_id: "00000000-0".into(),
        issued_at: Utc::now(),
    };

    let outcome = fx
        .validator
        .validate(&operator(), &payload.to_scan_string())
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        ScanOutcome::Deny {
            reason: DenyReason::CredentialNotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn expired_credential_is_denied_with_summary() {
    let fx = setup().await;

    // Store an already-expired credential directly.
    let request_id = Uuid::new_v4();
    let payload = CredentialPayload {
        request_id,
        plate: "OLD001".into(),
        requester_name: "Maria Gonzalez".into(),
        national_id: "12345678-5".into(),
        issued_at: Utc::now() - Duration::days(60),
    };
    fx.credentials
        .create(CreateCredential {
            request_id,
            payload: payload.to_scan_string(),
            image_ref: "/credentials/scan-old.png".into(),
            document_ref: "/credentials/permit-old.pdf".into(),
            expires_at: Some(Utc::now() - Duration::days(30)),
        })
        .await
        .unwrap();

    let outcome = fx
        .validator
        .validate(&operator(), &payload.to_scan_string())
        .await
        .unwrap();
    let ScanOutcome::Deny { reason, summary } = outcome else {
        panic!("expected deny");
    };
    assert_eq!(reason, DenyReason::Expired);
    // Identity summary still returned for operator context.
    let summary = summary.unwrap();
    assert_eq!(summary.vehicle_plate, "OLD001");
    assert_eq!(summary.requester_name, "Maria Gonzalez");
}

#[tokio::test]
async fn stale_payload_is_denied_after_status_drift() {
    let fx = setup().await;
    let (request, payload) = approved_request(&fx, "STALE1").await;

    // Simulate drift: the request is retracted after issuance while
    // its credential is still active.
    let mut stored = fx.requests.get_by_id(request.id).await.unwrap();
    stored.denial = Some(DenialRecord {
        reason: "permit withdrawn".into(),
        level: ApprovalLevel::Level2,
        denied_by: Uuid::new_v4(),
        denied_at: Utc::now(),
    });
    stored.recompute_status();
    fx.requests.update_checked(stored).await.unwrap();

    let outcome = fx.validator.validate(&operator(), &payload).await.unwrap();
    let ScanOutcome::Deny { reason, .. } = outcome else {
        panic!("expected deny");
    };
    assert_eq!(reason, DenyReason::RequestNotApproved(RequestStatus::Rejected));
}

#[tokio::test]
async fn deleted_request_scan_is_denied_credential_not_found() {
    let fx = setup().await;
    let (request, payload) = approved_request(&fx, "GONE01").await;

    // Purge flips the credential inactive; re-scanning the same
    // payload now fails resolution.
    let admin = Actor::new(Uuid::new_v4(), "Site Admin", Authority::Highest);
    fx.service.delete(&admin, request.id).await.unwrap();

    let outcome = fx.validator.validate(&operator(), &payload).await.unwrap();
    assert!(matches!(
        outcome,
        ScanOutcome::Deny {
            reason: DenyReason::CredentialNotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn every_scan_is_audited_with_operator_identity() {
    let fx = setup().await;
    let (_, payload) = approved_request(&fx, "AUDIT1").await;

    let op = operator();
    fx.validator.validate(&op, &payload).await.unwrap();
    fx.validator.validate(&op, "garbage").await.unwrap();

    let successes = fx
        .audit
        .list(
            AuditFilter {
                kind: Some(AuditKind::CredentialScanSuccess),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(successes.total, 1);
    assert_eq!(successes.items[0].actor_id, op.id);
    assert_eq!(successes.items[0].actor_name, "Gate Operator");

    let failures = fx
        .audit
        .list(
            AuditFilter {
                kind: Some(AuditKind::CredentialScanFailed),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(failures.total, 1);
    assert_eq!(failures.items[0].metadata["reason"], "malformed_payload");
}
