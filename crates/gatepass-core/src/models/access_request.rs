//! Access request domain model.
//!
//! An [`AccessRequest`] is one permit application: requester and vehicle
//! data plus two independent approval slots and an optional denial
//! record. The cached `status` field is a projection of those three
//! sub-records — [`RequestStatus::derive`] is the only legal mapping,
//! and every mutation recomputes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two independent approval slots. Each authority level owns
/// exactly one slot per request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApprovalLevel {
    Level1,
    Level2,
}

impl std::fmt::Display for ApprovalLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalLevel::Level1 => write!(f, "level 1"),
            ApprovalLevel::Level2 => write!(f, "level 2"),
        }
    }
}

/// Cached, derived request status.
///
/// Never settable on its own: always equals
/// `RequestStatus::derive(level1.approved, level2.approved, denial)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Level1Approved,
    Level2Approved,
    Approved,
    Rejected,
}

impl RequestStatus {
    /// The single legal status derivation. Denial dominates; both
    /// approvals make `Approved`; one approval makes the matching
    /// partial status.
    pub fn derive(level1_approved: bool, level2_approved: bool, denied: bool) -> Self {
        if denied {
            RequestStatus::Rejected
        } else if level1_approved && level2_approved {
            RequestStatus::Approved
        } else if level1_approved {
            RequestStatus::Level1Approved
        } else if level2_approved {
            RequestStatus::Level2Approved
        } else {
            RequestStatus::Pending
        }
    }

    /// Terminal with respect to Approve/Reject (Delete stays available).
    pub fn is_final(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
}

/// One approval slot. `approved_by == None` means "not yet decided."
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approved: bool,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub comments: Option<String>,
}

/// Denial sub-record. Mutually exclusive with driving both approvals
/// to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenialRecord {
    pub reason: String,
    /// Which authority level denied.
    pub level: ApprovalLevel,
    pub denied_by: Uuid,
    pub denied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: Uuid,
    /// Owning identity. `None` when an authority created the request
    /// on someone's behalf (`created_by_admin` is then set).
    pub requester_id: Option<Uuid>,
    pub created_by_admin: bool,
    pub created_by: Option<Uuid>,

    pub requester_name: String,
    pub national_id: String,
    pub email: String,
    pub phone: String,
    /// Program / affiliation of the requester.
    pub program: String,

    /// Normalized to uppercase on submission.
    pub vehicle_plate: String,
    pub vehicle_model: String,
    pub vehicle_color: String,
    pub garage_location: Option<String>,
    pub modification_notes: Option<String>,
    pub vehicle_photo: Option<String>,
    pub document_photo: Option<String>,

    pub level1: ApprovalRecord,
    pub level2: ApprovalRecord,
    pub denial: Option<DenialRecord>,
    pub status: RequestStatus,

    /// Optimistic-concurrency counter, bumped on every persisted
    /// mutation.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessRequest {
    pub fn approval(&self, level: ApprovalLevel) -> &ApprovalRecord {
        match level {
            ApprovalLevel::Level1 => &self.level1,
            ApprovalLevel::Level2 => &self.level2,
        }
    }

    pub fn approval_mut(&mut self, level: ApprovalLevel) -> &mut ApprovalRecord {
        match level {
            ApprovalLevel::Level1 => &mut self.level1,
            ApprovalLevel::Level2 => &mut self.level2,
        }
    }

    /// Status recomputed from the sub-records, ignoring the cached
    /// field. Decision logic always works from this.
    pub fn derived_status(&self) -> RequestStatus {
        RequestStatus::derive(
            self.level1.approved,
            self.level2.approved,
            self.denial.is_some(),
        )
    }

    /// Refresh the cached status from the sub-records.
    pub fn recompute_status(&mut self) {
        self.status = self.derived_status();
    }
}

/// Fields required to create a new access request. The status starts
/// at `Pending`; approval sub-records start empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccessRequest {
    pub requester_id: Option<Uuid>,
    pub created_by_admin: bool,
    pub created_by: Option<Uuid>,

    pub requester_name: String,
    pub national_id: String,
    pub email: String,
    pub phone: String,
    pub program: String,

    pub vehicle_plate: String,
    pub vehicle_model: String,
    pub vehicle_color: String,
    pub garage_location: Option<String>,
    pub modification_notes: Option<String>,
    pub vehicle_photo: Option<String>,
    pub document_photo: Option<String>,
}
