//! SurrealDB implementation of [`CredentialRepository`].
//!
//! The invariant of at most one active credential per request is
//! maintained by the issuance path: callers retire before creating.
//! `retire_active` is idempotent so a duplicated trigger cannot leave
//! two active credentials behind.

use chrono::{DateTime, Utc};
use gatepass_core::error::GatepassResult;
use gatepass_core::models::credential::{CreateCredential, Credential};
use gatepass_core::repository::CredentialRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct CredentialRow {
    request_id: String,
    payload: String,
    image_ref: String,
    document_ref: String,
    active: bool,
    issued_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct CredentialRowWithId {
    record_id: String,
    request_id: String,
    payload: String,
    image_ref: String,
    document_ref: String,
    active: bool,
    issued_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl CredentialRow {
    fn into_credential(self, id: Uuid) -> Result<Credential, DbError> {
        let request_id = Uuid::parse_str(&self.request_id)
            .map_err(|e| DbError::Migration(format!("invalid request UUID: {e}")))?;
        Ok(Credential {
            id,
            request_id,
            payload: self.payload,
            image_ref: self.image_ref,
            document_ref: self.document_ref,
            active: self.active,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        })
    }
}

impl CredentialRowWithId {
    fn try_into_credential(self) -> Result<Credential, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Migration(format!("invalid UUID: {e}")))?;
        let request_id = Uuid::parse_str(&self.request_id)
            .map_err(|e| DbError::Migration(format!("invalid request UUID: {e}")))?;
        Ok(Credential {
            id,
            request_id,
            payload: self.payload,
            image_ref: self.image_ref,
            document_ref: self.document_ref,
            active: self.active,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        })
    }
}

/// SurrealDB implementation of the credential repository.
#[derive(Clone)]
pub struct SurrealCredentialRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCredentialRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> CredentialRepository for SurrealCredentialRepository<C> {
    async fn create(&self, input: CreateCredential) -> GatepassResult<Credential> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('credential', $id) SET \
                 request_id = $request_id, \
                 payload = $payload, \
                 image_ref = $image_ref, \
                 document_ref = $document_ref, \
                 active = true, \
                 expires_at = $expires_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("request_id", input.request_id.to_string()))
            .bind(("payload", input.payload))
            .bind(("image_ref", input.image_ref))
            .bind(("document_ref", input.document_ref))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<CredentialRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "credential".into(),
            id: id_str,
        })?;

        Ok(row.into_credential(id)?)
    }

    async fn get_active_by_request(&self, request_id: Uuid) -> GatepassResult<Credential> {
        let request_str = request_id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM credential \
                 WHERE request_id = $request_id AND active = true \
                 ORDER BY issued_at DESC LIMIT 1",
            )
            .bind(("request_id", request_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CredentialRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "credential".into(),
            id: format!("request={request_str}"),
        })?;

        Ok(row.try_into_credential()?)
    }

    async fn list_by_request(&self, request_id: Uuid) -> GatepassResult<Vec<Credential>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM credential \
                 WHERE request_id = $request_id \
                 ORDER BY issued_at DESC",
            )
            .bind(("request_id", request_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CredentialRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_credential())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(items)
    }

    async fn retire_active(&self, request_id: Uuid) -> GatepassResult<u64> {
        let mut result = self
            .db
            .query(
                "UPDATE credential SET active = false \
                 WHERE request_id = $request_id AND active = true",
            )
            .bind(("request_id", request_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CredentialRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }
}
