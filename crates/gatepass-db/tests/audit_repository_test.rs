//! Integration tests for the append-only audit-log repository using
//! in-memory SurrealDB.

use gatepass_core::models::audit::{AuditKind, CreateAuditEntry};
use gatepass_core::repository::{AuditFilter, AuditLogRepository, Pagination};
use gatepass_db::repository::SurrealAuditLogRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    gatepass_db::run_migrations(&db).await.unwrap();
    db
}

fn entry(kind: AuditKind, actor_id: Uuid, target_request_id: Option<Uuid>) -> CreateAuditEntry {
    CreateAuditEntry {
        kind,
        description: format!("{} by test actor", kind.as_str()),
        actor_id,
        actor_name: "Reviewer One".into(),
        target_user_id: None,
        target_request_id,
        target_description: target_request_id.map(|_| "plate ABCD12".into()),
        metadata: Some(serde_json::json!({ "source": "test" })),
    }
}

#[tokio::test]
async fn append_and_read_back() {
    let db = setup().await;
    let repo = SurrealAuditLogRepository::new(db);

    let actor = Uuid::new_v4();
    let request = Uuid::new_v4();
    let appended = repo
        .append(entry(AuditKind::RequestCreated, actor, Some(request)))
        .await
        .unwrap();

    assert_eq!(appended.kind, AuditKind::RequestCreated);
    assert_eq!(appended.actor_id, actor);
    assert_eq!(appended.actor_name, "Reviewer One");
    assert_eq!(appended.target_request_id, Some(request));
    assert_eq!(appended.target_description.as_deref(), Some("plate ABCD12"));
    assert_eq!(appended.metadata["source"], "test");

    let list = repo
        .list(AuditFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(list.total, 1);
    assert_eq!(list.items[0].id, appended.id);
}

#[tokio::test]
async fn list_is_newest_first() {
    let db = setup().await;
    let repo = SurrealAuditLogRepository::new(db);

    let actor = Uuid::new_v4();
    for kind in [
        AuditKind::RequestCreated,
        AuditKind::RequestApprovedLevel1,
        AuditKind::RequestApprovedLevel2,
    ] {
        repo.append(entry(kind, actor, None)).await.unwrap();
    }

    let list = repo
        .list(AuditFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(list.total, 3);
    for window in list.items.windows(2) {
        assert!(window[0].timestamp >= window[1].timestamp);
    }
}

#[tokio::test]
async fn filter_by_kind() {
    let db = setup().await;
    let repo = SurrealAuditLogRepository::new(db);

    let actor = Uuid::new_v4();
    repo.append(entry(AuditKind::CredentialScanSuccess, actor, None))
        .await
        .unwrap();
    repo.append(entry(AuditKind::CredentialScanSuccess, actor, None))
        .await
        .unwrap();
    repo.append(entry(AuditKind::CredentialScanFailed, actor, None))
        .await
        .unwrap();

    // Scan history: successful scans only.
    let scans = repo
        .list(
            AuditFilter {
                kind: Some(AuditKind::CredentialScanSuccess),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(scans.total, 2);
    assert!(
        scans
            .items
            .iter()
            .all(|e| e.kind == AuditKind::CredentialScanSuccess)
    );
}

#[tokio::test]
async fn filter_by_actor_and_target_request() {
    let db = setup().await;
    let repo = SurrealAuditLogRepository::new(db);

    let actor_a = Uuid::new_v4();
    let actor_b = Uuid::new_v4();
    let request = Uuid::new_v4();

    repo.append(entry(AuditKind::RequestCreated, actor_a, Some(request)))
        .await
        .unwrap();
    repo.append(entry(AuditKind::RequestRejected, actor_b, Some(request)))
        .await
        .unwrap();
    repo.append(entry(AuditKind::UserCreated, actor_b, None))
        .await
        .unwrap();

    let by_actor = repo
        .list(
            AuditFilter {
                actor_id: Some(actor_b),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_actor.total, 2);

    let by_request = repo
        .list(
            AuditFilter {
                target_request_id: Some(request),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_request.total, 2);

    let combined = repo
        .list(
            AuditFilter {
                actor_id: Some(actor_b),
                target_request_id: Some(request),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(combined.total, 1);
    assert_eq!(combined.items[0].kind, AuditKind::RequestRejected);
}

#[tokio::test]
async fn pagination_limits_results() {
    let db = setup().await;
    let repo = SurrealAuditLogRepository::new(db);

    let actor = Uuid::new_v4();
    for _ in 0..5 {
        repo.append(entry(AuditKind::CredentialScanFailed, actor, None))
            .await
            .unwrap();
    }

    let page = repo
        .list(
            AuditFilter::default(),
            Pagination {
                offset: 0,
                limit: 3,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.total, 5);

    let rest = repo
        .list(
            AuditFilter::default(),
            Pagination {
                offset: 3,
                limit: 3,
            },
        )
        .await
        .unwrap();
    assert_eq!(rest.items.len(), 2);
}

#[tokio::test]
async fn identity_subsystem_kinds_share_the_ledger() {
    let db = setup().await;
    let repo = SurrealAuditLogRepository::new(db);

    let actor = Uuid::new_v4();
    let target_user = Uuid::new_v4();
    let appended = repo
        .append(CreateAuditEntry {
            kind: AuditKind::UserRoleChanged,
            description: "role changed from requester to reviewer".into(),
            actor_id: actor,
            actor_name: "Site Admin".into(),
            target_user_id: Some(target_user),
            target_request_id: None,
            target_description: Some("user maria@example.com".into()),
            metadata: None,
        })
        .await
        .unwrap();

    assert_eq!(appended.kind, AuditKind::UserRoleChanged);
    assert_eq!(appended.target_user_id, Some(target_user));
}
