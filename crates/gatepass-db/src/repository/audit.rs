//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! Append-only: the schema disables update and delete on the
//! `audit_log` table, and this implementation exposes no mutation
//! beyond `append`.

use chrono::{DateTime, Utc};
use gatepass_core::error::GatepassResult;
use gatepass_core::models::audit::{AuditEntry, AuditKind, CreateAuditEntry};
use gatepass_core::repository::{AuditFilter, AuditLogRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct AuditRow {
    kind: String,
    description: String,
    actor_id: String,
    actor_name: String,
    target_user_id: Option<String>,
    target_request_id: Option<String>,
    target_description: Option<String>,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct AuditRowWithId {
    record_id: String,
    kind: String,
    description: String,
    actor_id: String,
    actor_name: String,
    target_user_id: Option<String>,
    target_request_id: Option<String>,
    target_description: Option<String>,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_kind(s: &str) -> Result<AuditKind, DbError> {
    AuditKind::parse(s).ok_or_else(|| DbError::Migration(format!("unknown audit kind: {s}")))
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::Migration(format!("invalid {what} UUID: {e}")))
}

impl AuditRow {
    fn into_entry(self, id: Uuid) -> Result<AuditEntry, DbError> {
        Ok(AuditEntry {
            id,
            kind: parse_kind(&self.kind)?,
            description: self.description,
            actor_id: parse_uuid(&self.actor_id, "actor")?,
            actor_name: self.actor_name,
            target_user_id: self
                .target_user_id
                .as_deref()
                .map(|v| parse_uuid(v, "target user"))
                .transpose()?,
            target_request_id: self
                .target_request_id
                .as_deref()
                .map(|v| parse_uuid(v, "target request"))
                .transpose()?,
            target_description: self.target_description,
            metadata: self.metadata,
            timestamp: self.timestamp,
        })
    }
}

impl AuditRowWithId {
    fn try_into_entry(self) -> Result<AuditEntry, DbError> {
        let id = parse_uuid(&self.record_id, "audit entry")?;
        let row = AuditRow {
            kind: self.kind,
            description: self.description,
            actor_id: self.actor_id,
            actor_name: self.actor_name,
            target_user_id: self.target_user_id,
            target_request_id: self.target_request_id,
            target_description: self.target_description,
            metadata: self.metadata,
            timestamp: self.timestamp,
        };
        row.into_entry(id)
    }
}

/// SurrealDB implementation of the audit-log repository.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditEntry) -> GatepassResult<AuditEntry> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let metadata = input
            .metadata
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 kind = $kind, \
                 description = $description, \
                 actor_id = $actor_id, \
                 actor_name = $actor_name, \
                 target_user_id = $target_user_id, \
                 target_request_id = $target_request_id, \
                 target_description = $target_description, \
                 metadata = $metadata",
            )
            .bind(("id", id_str.clone()))
            .bind(("kind", input.kind.as_str().to_string()))
            .bind(("description", input.description))
            .bind(("actor_id", input.actor_id.to_string()))
            .bind(("actor_name", input.actor_name))
            .bind((
                "target_user_id",
                input.target_user_id.map(|u| u.to_string()),
            ))
            .bind((
                "target_request_id",
                input.target_request_id.map(|u| u.to_string()),
            ))
            .bind(("target_description", input.target_description))
            .bind(("metadata", metadata))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<AuditRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;

        Ok(row.into_entry(id)?)
    }

    async fn list(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> GatepassResult<PaginatedResult<AuditEntry>> {
        let mut conds = Vec::new();
        if filter.kind.is_some() {
            conds.push("kind = $kind");
        }
        if filter.actor_id.is_some() {
            conds.push("actor_id = $actor_id");
        }
        if filter.target_request_id.is_some() {
            conds.push("target_request_id = $target_request_id");
        }
        if filter.from.is_some() {
            conds.push("timestamp >= $from");
        }
        if filter.to.is_some() {
            conds.push("timestamp <= $to");
        }

        let where_clause = if conds.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conds.join(" AND "))
        };

        let count_query =
            format!("SELECT count() AS total FROM audit_log{where_clause} GROUP ALL");
        let list_query = format!(
            "SELECT meta::id(id) AS record_id, * FROM audit_log{where_clause} \
             ORDER BY timestamp DESC LIMIT $limit START $offset"
        );

        let mut count_builder = self.db.query(&count_query);
        let mut list_builder = self
            .db
            .query(&list_query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));

        if let Some(kind) = filter.kind {
            count_builder = count_builder.bind(("kind", kind.as_str().to_string()));
            list_builder = list_builder.bind(("kind", kind.as_str().to_string()));
        }
        if let Some(actor_id) = filter.actor_id {
            count_builder = count_builder.bind(("actor_id", actor_id.to_string()));
            list_builder = list_builder.bind(("actor_id", actor_id.to_string()));
        }
        if let Some(target) = filter.target_request_id {
            count_builder = count_builder.bind(("target_request_id", target.to_string()));
            list_builder = list_builder.bind(("target_request_id", target.to_string()));
        }
        if let Some(from) = filter.from {
            count_builder = count_builder.bind(("from", from));
            list_builder = list_builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            count_builder = count_builder.bind(("to", to));
            list_builder = list_builder.bind(("to", to));
        }

        let mut count_result = count_builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = list_builder.await.map_err(DbError::from)?;
        let rows: Vec<AuditRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_entry())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
