//! SurrealDB implementation of [`AccessRequestRepository`].
//!
//! The approval and denial sub-records are flattened into columns;
//! the nested domain shape is rebuilt when rows are read back. The
//! `version` column carries the optimistic-concurrency check for
//! [`update_checked`]: the UPDATE only matches when the stored version
//! equals the one the caller read, which makes read-decide-write a
//! single atomic unit per record.
//!
//! [`update_checked`]: AccessRequestRepository::update_checked

use chrono::{DateTime, Utc};
use gatepass_core::error::GatepassResult;
use gatepass_core::models::access_request::{
    AccessRequest, ApprovalLevel, ApprovalRecord, CreateAccessRequest, DenialRecord,
    RequestStatus,
};
use gatepass_core::repository::{AccessRequestRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct RequestRow {
    requester_id: Option<String>,
    created_by_admin: bool,
    created_by: Option<String>,
    requester_name: String,
    national_id: String,
    email: String,
    phone: String,
    program: String,
    vehicle_plate: String,
    vehicle_model: String,
    vehicle_color: String,
    garage_location: Option<String>,
    modification_notes: Option<String>,
    vehicle_photo: Option<String>,
    document_photo: Option<String>,
    status: String,
    level1_approved: bool,
    level1_approved_by: Option<String>,
    level1_approved_at: Option<DateTime<Utc>>,
    level1_comments: Option<String>,
    level2_approved: bool,
    level2_approved_by: Option<String>,
    level2_approved_at: Option<DateTime<Utc>>,
    level2_comments: Option<String>,
    denial_reason: Option<String>,
    denied_by_level: Option<String>,
    denied_by: Option<String>,
    denied_at: Option<DateTime<Utc>>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct RequestRowWithId {
    record_id: String,
    requester_id: Option<String>,
    created_by_admin: bool,
    created_by: Option<String>,
    requester_name: String,
    national_id: String,
    email: String,
    phone: String,
    program: String,
    vehicle_plate: String,
    vehicle_model: String,
    vehicle_color: String,
    garage_location: Option<String>,
    modification_notes: Option<String>,
    vehicle_photo: Option<String>,
    document_photo: Option<String>,
    status: String,
    level1_approved: bool,
    level1_approved_by: Option<String>,
    level1_approved_at: Option<DateTime<Utc>>,
    level1_comments: Option<String>,
    level2_approved: bool,
    level2_approved_by: Option<String>,
    level2_approved_at: Option<DateTime<Utc>>,
    level2_comments: Option<String>,
    denial_reason: Option<String>,
    denied_by_level: Option<String>,
    denied_by: Option<String>,
    denied_at: Option<DateTime<Utc>>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn status_to_string(status: &RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "pending",
        RequestStatus::Level1Approved => "level1_approved",
        RequestStatus::Level2Approved => "level2_approved",
        RequestStatus::Approved => "approved",
        RequestStatus::Rejected => "rejected",
    }
}

fn parse_status(s: &str) -> Result<RequestStatus, DbError> {
    match s {
        "pending" => Ok(RequestStatus::Pending),
        "level1_approved" => Ok(RequestStatus::Level1Approved),
        "level2_approved" => Ok(RequestStatus::Level2Approved),
        "approved" => Ok(RequestStatus::Approved),
        "rejected" => Ok(RequestStatus::Rejected),
        other => Err(DbError::Migration(format!(
            "unknown request status: {other}"
        ))),
    }
}

fn level_to_string(level: ApprovalLevel) -> &'static str {
    match level {
        ApprovalLevel::Level1 => "level1",
        ApprovalLevel::Level2 => "level2",
    }
}

fn parse_level(s: &str) -> Result<ApprovalLevel, DbError> {
    match s {
        "level1" => Ok(ApprovalLevel::Level1),
        "level2" => Ok(ApprovalLevel::Level2),
        other => Err(DbError::Migration(format!(
            "unknown approval level: {other}"
        ))),
    }
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::Migration(format!("invalid {what} UUID: {e}")))
}

fn parse_opt_uuid(s: Option<&str>, what: &str) -> Result<Option<Uuid>, DbError> {
    s.map(|v| parse_uuid(v, what)).transpose()
}

fn build_denial(
    reason: Option<String>,
    level: Option<String>,
    denied_by: Option<String>,
    denied_at: Option<DateTime<Utc>>,
) -> Result<Option<DenialRecord>, DbError> {
    match reason {
        None => Ok(None),
        Some(reason) => {
            let (Some(level), Some(denied_by), Some(denied_at)) = (level, denied_by, denied_at)
            else {
                return Err(DbError::Migration(
                    "incomplete denial record on access_request".into(),
                ));
            };
            Ok(Some(DenialRecord {
                reason,
                level: parse_level(&level)?,
                denied_by: parse_uuid(&denied_by, "denier")?,
                denied_at,
            }))
        }
    }
}

impl RequestRow {
    fn into_request(self, id: Uuid) -> Result<AccessRequest, DbError> {
        Ok(AccessRequest {
            id,
            requester_id: parse_opt_uuid(self.requester_id.as_deref(), "requester")?,
            created_by_admin: self.created_by_admin,
            created_by: parse_opt_uuid(self.created_by.as_deref(), "creator")?,
            requester_name: self.requester_name,
            national_id: self.national_id,
            email: self.email,
            phone: self.phone,
            program: self.program,
            vehicle_plate: self.vehicle_plate,
            vehicle_model: self.vehicle_model,
            vehicle_color: self.vehicle_color,
            garage_location: self.garage_location,
            modification_notes: self.modification_notes,
            vehicle_photo: self.vehicle_photo,
            document_photo: self.document_photo,
            level1: ApprovalRecord {
                approved: self.level1_approved,
                approved_by: parse_opt_uuid(self.level1_approved_by.as_deref(), "approver")?,
                approved_at: self.level1_approved_at,
                comments: self.level1_comments,
            },
            level2: ApprovalRecord {
                approved: self.level2_approved,
                approved_by: parse_opt_uuid(self.level2_approved_by.as_deref(), "approver")?,
                approved_at: self.level2_approved_at,
                comments: self.level2_comments,
            },
            denial: build_denial(
                self.denial_reason,
                self.denied_by_level,
                self.denied_by,
                self.denied_at,
            )?,
            status: parse_status(&self.status)?,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl RequestRowWithId {
    fn try_into_request(self) -> Result<AccessRequest, DbError> {
        let id = parse_uuid(&self.record_id, "request")?;
        let row = RequestRow {
            requester_id: self.requester_id,
            created_by_admin: self.created_by_admin,
            created_by: self.created_by,
            requester_name: self.requester_name,
            national_id: self.national_id,
            email: self.email,
            phone: self.phone,
            program: self.program,
            vehicle_plate: self.vehicle_plate,
            vehicle_model: self.vehicle_model,
            vehicle_color: self.vehicle_color,
            garage_location: self.garage_location,
            modification_notes: self.modification_notes,
            vehicle_photo: self.vehicle_photo,
            document_photo: self.document_photo,
            status: self.status,
            level1_approved: self.level1_approved,
            level1_approved_by: self.level1_approved_by,
            level1_approved_at: self.level1_approved_at,
            level1_comments: self.level1_comments,
            level2_approved: self.level2_approved,
            level2_approved_by: self.level2_approved_by,
            level2_approved_at: self.level2_approved_at,
            level2_comments: self.level2_comments,
            denial_reason: self.denial_reason,
            denied_by_level: self.denied_by_level,
            denied_by: self.denied_by,
            denied_at: self.denied_at,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        row.into_request(id)
    }
}

/// SurrealDB implementation of the access-request repository.
#[derive(Clone)]
pub struct SurrealAccessRequestRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAccessRequestRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AccessRequestRepository for SurrealAccessRequestRepository<C> {
    async fn create(&self, input: CreateAccessRequest) -> GatepassResult<AccessRequest> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('access_request', $id) SET \
                 requester_id = $requester_id, \
                 created_by_admin = $created_by_admin, \
                 created_by = $created_by, \
                 requester_name = $requester_name, \
                 national_id = $national_id, \
                 email = $email, phone = $phone, program = $program, \
                 vehicle_plate = $vehicle_plate, \
                 vehicle_model = $vehicle_model, \
                 vehicle_color = $vehicle_color, \
                 garage_location = $garage_location, \
                 modification_notes = $modification_notes, \
                 vehicle_photo = $vehicle_photo, \
                 document_photo = $document_photo, \
                 status = 'pending', \
                 level1_approved = false, level2_approved = false, \
                 version = 1",
            )
            .bind(("id", id_str.clone()))
            .bind(("requester_id", input.requester_id.map(|u| u.to_string())))
            .bind(("created_by_admin", input.created_by_admin))
            .bind(("created_by", input.created_by.map(|u| u.to_string())))
            .bind(("requester_name", input.requester_name))
            .bind(("national_id", input.national_id))
            .bind(("email", input.email))
            .bind(("phone", input.phone))
            .bind(("program", input.program))
            .bind(("vehicle_plate", input.vehicle_plate))
            .bind(("vehicle_model", input.vehicle_model))
            .bind(("vehicle_color", input.vehicle_color))
            .bind(("garage_location", input.garage_location))
            .bind(("modification_notes", input.modification_notes))
            .bind(("vehicle_photo", input.vehicle_photo))
            .bind(("document_photo", input.document_photo))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<RequestRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "access_request".into(),
            id: id_str,
        })?;

        Ok(row.into_request(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> GatepassResult<AccessRequest> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('access_request', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RequestRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "access_request".into(),
            id: id_str,
        })?;

        Ok(row.into_request(id)?)
    }

    async fn list(
        &self,
        statuses: &[RequestStatus],
        pagination: Pagination,
    ) -> GatepassResult<PaginatedResult<AccessRequest>> {
        let status_strings: Vec<String> = statuses
            .iter()
            .map(|s| status_to_string(s).to_string())
            .collect();
        let filtered = !status_strings.is_empty();

        let count_query = if filtered {
            "SELECT count() AS total FROM access_request \
             WHERE status IN $statuses GROUP ALL"
        } else {
            "SELECT count() AS total FROM access_request GROUP ALL"
        };
        let mut count_result = self
            .db
            .query(count_query)
            .bind(("statuses", status_strings.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let list_query = if filtered {
            "SELECT meta::id(id) AS record_id, * FROM access_request \
             WHERE status IN $statuses \
             ORDER BY created_at DESC \
             LIMIT $limit START $offset"
        } else {
            "SELECT meta::id(id) AS record_id, * FROM access_request \
             ORDER BY created_at DESC \
             LIMIT $limit START $offset"
        };
        let mut result = self
            .db
            .query(list_query)
            .bind(("statuses", status_strings))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RequestRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_request())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_by_requester(
        &self,
        requester_id: Uuid,
        pagination: Pagination,
    ) -> GatepassResult<PaginatedResult<AccessRequest>> {
        let requester_str = requester_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM access_request \
                 WHERE requester_id = $requester_id GROUP ALL",
            )
            .bind(("requester_id", requester_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM access_request \
                 WHERE requester_id = $requester_id \
                 ORDER BY created_at DESC \
                 LIMIT $limit START $offset",
            )
            .bind(("requester_id", requester_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RequestRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_request())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn update_checked(&self, request: AccessRequest) -> GatepassResult<AccessRequest> {
        let id_str = request.id.to_string();
        let expected_version = request.version;

        let result = self
            .db
            .query(
                "UPDATE type::record('access_request', $id) SET \
                 status = $status, \
                 level1_approved = $level1_approved, \
                 level1_approved_by = $level1_approved_by, \
                 level1_approved_at = $level1_approved_at, \
                 level1_comments = $level1_comments, \
                 level2_approved = $level2_approved, \
                 level2_approved_by = $level2_approved_by, \
                 level2_approved_at = $level2_approved_at, \
                 level2_comments = $level2_comments, \
                 denial_reason = $denial_reason, \
                 denied_by_level = $denied_by_level, \
                 denied_by = $denied_by, \
                 denied_at = $denied_at, \
                 version = $new_version, \
                 updated_at = time::now() \
                 WHERE version = $expected_version",
            )
            .bind(("id", id_str.clone()))
            .bind(("status", status_to_string(&request.status).to_string()))
            .bind(("level1_approved", request.level1.approved))
            .bind((
                "level1_approved_by",
                request.level1.approved_by.map(|u| u.to_string()),
            ))
            .bind(("level1_approved_at", request.level1.approved_at))
            .bind(("level1_comments", request.level1.comments.clone()))
            .bind(("level2_approved", request.level2.approved))
            .bind((
                "level2_approved_by",
                request.level2.approved_by.map(|u| u.to_string()),
            ))
            .bind(("level2_approved_at", request.level2.approved_at))
            .bind(("level2_comments", request.level2.comments.clone()))
            .bind((
                "denial_reason",
                request.denial.as_ref().map(|d| d.reason.clone()),
            ))
            .bind((
                "denied_by_level",
                request
                    .denial
                    .as_ref()
                    .map(|d| level_to_string(d.level).to_string()),
            ))
            .bind((
                "denied_by",
                request.denial.as_ref().map(|d| d.denied_by.to_string()),
            ))
            .bind(("denied_at", request.denial.as_ref().map(|d| d.denied_at)))
            .bind(("new_version", expected_version + 1))
            .bind(("expected_version", expected_version))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<RequestRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(row.into_request(request.id)?),
            None => {
                // Zero rows matched: either the record is gone or the
                // version moved underneath us.
                let mut probe = self
                    .db
                    .query(
                        "SELECT count() AS total FROM \
                         type::record('access_request', $id) GROUP ALL",
                    )
                    .bind(("id", id_str.clone()))
                    .await
                    .map_err(DbError::from)?;
                let count_rows: Vec<CountRow> = probe.take(0).map_err(DbError::from)?;
                let exists = count_rows.first().map(|r| r.total).unwrap_or(0) > 0;

                if exists {
                    Err(DbError::Conflict {
                        entity: "access_request".into(),
                        id: id_str,
                    }
                    .into())
                } else {
                    Err(DbError::NotFound {
                        entity: "access_request".into(),
                        id: id_str,
                    }
                    .into())
                }
            }
        }
    }

    async fn delete(&self, id: Uuid) -> GatepassResult<()> {
        self.db
            .query("DELETE type::record('access_request', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }
}
