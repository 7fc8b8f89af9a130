//! Approval state machine — pure decision logic.
//!
//! [`decide`] takes the current request, an intended action, and the
//! acting identity, and computes either the next request state plus
//! side effects, or a [`GuardViolation`]. It performs no I/O: the
//! caller is responsible for persisting the decision atomically
//! (read-decide-write as one unit) and for reacting to side effects
//! only after the transition is committed.
//!
//! Decisions always work from the status *derived* from the approval
//! and denial sub-records, never from the cached `status` field.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::access_request::{
    AccessRequest, ApprovalLevel, DenialRecord, RequestStatus,
};
use crate::models::actor::{Actor, Authority};

/// An intended transition on an access request.
#[derive(Debug, Clone)]
pub enum Action {
    Approve {
        level: ApprovalLevel,
        comments: Option<String>,
    },
    Reject {
        reason: String,
    },
    Delete,
}

/// Side effects the caller must execute after the transition commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// The request just became fully approved: mint a credential.
    IssueCredential,
    /// The request is being removed: retire any active credential.
    RetireCredentials,
}

/// A computed transition: the updated record plus the effects to run
/// once it is durably committed.
#[derive(Debug, Clone)]
pub struct Decision {
    pub request: AccessRequest,
    pub effects: Vec<SideEffect>,
}

/// Synchronous guard rejections. Never partially applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardViolation {
    #[error("request is already in terminal status {status:?}")]
    AlreadyFinal { status: RequestStatus },

    #[error("request is already approved at {level}")]
    AlreadyApproved { level: ApprovalLevel },

    #[error("a rejection requires a non-empty reason")]
    EmptyRejectionReason,

    #[error("authority {authority} may not {action}")]
    WrongAuthority {
        authority: Authority,
        action: &'static str,
    },
}

/// Compute the transition for `action` on `request` by `actor` at
/// `now`, or reject it.
pub fn decide(
    request: &AccessRequest,
    action: Action,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Decision, GuardViolation> {
    match action {
        Action::Approve { level, comments } => approve(request, level, comments, actor, now),
        Action::Reject { reason } => reject(request, reason, actor, now),
        Action::Delete => delete(request, actor),
    }
}

fn approve(
    request: &AccessRequest,
    level: ApprovalLevel,
    comments: Option<String>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Decision, GuardViolation> {
    if !actor.authority.can_approve(level) {
        return Err(GuardViolation::WrongAuthority {
            authority: actor.authority,
            action: match level {
                ApprovalLevel::Level1 => "approve at level 1",
                ApprovalLevel::Level2 => "approve at level 2",
            },
        });
    }

    let status = request.derived_status();
    if status == RequestStatus::Rejected {
        return Err(GuardViolation::AlreadyFinal { status });
    }
    if request.approval(level).approved {
        // Idempotency guard: re-approval by the same level is an
        // error, not a silent success.
        return Err(GuardViolation::AlreadyApproved { level });
    }

    let mut updated = request.clone();
    {
        let slot = updated.approval_mut(level);
        slot.approved = true;
        slot.approved_by = Some(actor.id);
        slot.approved_at = Some(now);
        slot.comments = comments;
    }
    updated.recompute_status();
    updated.updated_at = now;

    let mut effects = Vec::new();
    if updated.status == RequestStatus::Approved {
        effects.push(SideEffect::IssueCredential);
    }

    Ok(Decision {
        request: updated,
        effects,
    })
}

fn reject(
    request: &AccessRequest,
    reason: String,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Decision, GuardViolation> {
    let Some(level) = actor.authority.approval_level() else {
        return Err(GuardViolation::WrongAuthority {
            authority: actor.authority,
            action: "reject a request",
        });
    };

    let reason = reason.trim().to_string();
    if reason.is_empty() {
        return Err(GuardViolation::EmptyRejectionReason);
    }

    // Rejection is legal from any non-terminal status, regardless of
    // prior partial approval.
    let status = request.derived_status();
    if status.is_final() {
        return Err(GuardViolation::AlreadyFinal { status });
    }

    let mut updated = request.clone();
    updated.denial = Some(DenialRecord {
        reason,
        level,
        denied_by: actor.id,
        denied_at: now,
    });
    updated.recompute_status();
    updated.updated_at = now;

    Ok(Decision {
        request: updated,
        effects: Vec::new(),
    })
}

fn delete(request: &AccessRequest, actor: &Actor) -> Result<Decision, GuardViolation> {
    if !actor.authority.can_delete() {
        return Err(GuardViolation::WrongAuthority {
            authority: actor.authority,
            action: "delete a request",
        });
    }

    // Deletable from any status; the caller retires credentials and
    // audit-logs before removal.
    Ok(Decision {
        request: request.clone(),
        effects: vec![SideEffect::RetireCredentials],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::access_request::ApprovalRecord;
    use uuid::Uuid;

    fn sample_request() -> AccessRequest {
        let now = Utc::now();
        AccessRequest {
            id: Uuid::new_v4(),
            requester_id: Some(Uuid::new_v4()),
            created_by_admin: false,
            created_by: None,
            requester_name: "Maria Gonzalez".into(),
            national_id: "12345678-5".into(),
            email: "maria@example.com".into(),
            phone: "+56 9 1234 5678".into(),
            program: "Automotive Mechanics".into(),
            vehicle_plate: "ABCD12".into(),
            vehicle_model: "Toyota Corolla".into(),
            vehicle_color: "Red".into(),
            garage_location: Some("Bay 4".into()),
            modification_notes: None,
            vehicle_photo: None,
            document_photo: None,
            level1: ApprovalRecord::default(),
            level2: ApprovalRecord::default(),
            denial: None,
            status: RequestStatus::Pending,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn level1_actor() -> Actor {
        Actor::new(Uuid::new_v4(), "Reviewer One", Authority::Level1)
    }

    fn level2_actor() -> Actor {
        Actor::new(Uuid::new_v4(), "Reviewer Two", Authority::Level2)
    }

    fn highest_actor() -> Actor {
        Actor::new(Uuid::new_v4(), "Site Admin", Authority::Highest)
    }

    fn approve_action(level: ApprovalLevel) -> Action {
        Action::Approve {
            level,
            comments: Some("ok".into()),
        }
    }

    #[test]
    fn status_derivation_is_the_only_mapping() {
        assert_eq!(
            RequestStatus::derive(false, false, false),
            RequestStatus::Pending
        );
        assert_eq!(
            RequestStatus::derive(true, false, false),
            RequestStatus::Level1Approved
        );
        assert_eq!(
            RequestStatus::derive(false, true, false),
            RequestStatus::Level2Approved
        );
        assert_eq!(
            RequestStatus::derive(true, true, false),
            RequestStatus::Approved
        );
        // Denial dominates, even over both approvals.
        assert_eq!(
            RequestStatus::derive(true, true, true),
            RequestStatus::Rejected
        );
        assert_eq!(
            RequestStatus::derive(false, false, true),
            RequestStatus::Rejected
        );
    }

    #[test]
    fn approve_level1_records_slot_and_partial_status() {
        let request = sample_request();
        let actor = level1_actor();

        let decision = decide(
            &request,
            approve_action(ApprovalLevel::Level1),
            &actor,
            Utc::now(),
        )
        .unwrap();

        let updated = decision.request;
        assert_eq!(updated.status, RequestStatus::Level1Approved);
        assert!(updated.level1.approved);
        assert_eq!(updated.level1.approved_by, Some(actor.id));
        assert_eq!(updated.level1.comments.as_deref(), Some("ok"));
        assert!(!updated.level2.approved);
        assert!(decision.effects.is_empty());
        // Cached status always equals the derived projection.
        assert_eq!(updated.status, updated.derived_status());
    }

    #[test]
    fn approval_is_commutative_and_issues_exactly_once() {
        for (first, second) in [
            (ApprovalLevel::Level1, ApprovalLevel::Level2),
            (ApprovalLevel::Level2, ApprovalLevel::Level1),
        ] {
            let request = sample_request();
            let first_actor = match first {
                ApprovalLevel::Level1 => level1_actor(),
                ApprovalLevel::Level2 => level2_actor(),
            };
            let second_actor = match second {
                ApprovalLevel::Level1 => level1_actor(),
                ApprovalLevel::Level2 => level2_actor(),
            };

            let partial = decide(&request, approve_action(first), &first_actor, Utc::now())
                .unwrap();
            assert!(partial.effects.is_empty());
            assert!(!partial.request.status.is_final());

            let full = decide(
                &partial.request,
                approve_action(second),
                &second_actor,
                Utc::now(),
            )
            .unwrap();
            assert_eq!(full.request.status, RequestStatus::Approved);
            assert_eq!(full.effects, vec![SideEffect::IssueCredential]);
        }
    }

    #[test]
    fn reapproval_by_same_level_is_rejected() {
        let request = sample_request();
        let actor = level1_actor();

        let once = decide(
            &request,
            approve_action(ApprovalLevel::Level1),
            &actor,
            Utc::now(),
        )
        .unwrap();

        let err = decide(
            &once.request,
            approve_action(ApprovalLevel::Level1),
            &actor,
            Utc::now(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            GuardViolation::AlreadyApproved {
                level: ApprovalLevel::Level1
            }
        );
    }

    #[test]
    fn approve_after_rejection_is_already_final() {
        let request = sample_request();
        let rejected = decide(
            &request,
            Action::Reject {
                reason: "incomplete paperwork".into(),
            },
            &level2_actor(),
            Utc::now(),
        )
        .unwrap();

        let err = decide(
            &rejected.request,
            approve_action(ApprovalLevel::Level1),
            &level1_actor(),
            Utc::now(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            GuardViolation::AlreadyFinal {
                status: RequestStatus::Rejected
            }
        );
    }

    #[test]
    fn each_authority_owns_exactly_one_slot() {
        let request = sample_request();

        // Level-1 authority cannot fill slot 2, and vice versa.
        let err = decide(
            &request,
            approve_action(ApprovalLevel::Level2),
            &level1_actor(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, GuardViolation::WrongAuthority { .. }));

        let err = decide(
            &request,
            approve_action(ApprovalLevel::Level1),
            &level2_actor(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, GuardViolation::WrongAuthority { .. }));

        // The highest authority owns delete, not an approval slot.
        let err = decide(
            &request,
            approve_action(ApprovalLevel::Level1),
            &highest_actor(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, GuardViolation::WrongAuthority { .. }));
    }

    #[test]
    fn rejection_requires_a_reason() {
        let request = sample_request();
        let err = decide(
            &request,
            Action::Reject {
                reason: "   ".into(),
            },
            &level1_actor(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, GuardViolation::EmptyRejectionReason);
    }

    #[test]
    fn rejection_is_legal_after_partial_approval() {
        let request = sample_request();
        let actor1 = level1_actor();
        let partial = decide(
            &request,
            approve_action(ApprovalLevel::Level1),
            &actor1,
            Utc::now(),
        )
        .unwrap();

        let actor2 = level2_actor();
        let rejected = decide(
            &partial.request,
            Action::Reject {
                reason: "vehicle not registered".into(),
            },
            &actor2,
            Utc::now(),
        )
        .unwrap();

        let denial = rejected.request.denial.as_ref().unwrap();
        assert_eq!(rejected.request.status, RequestStatus::Rejected);
        assert_eq!(denial.level, ApprovalLevel::Level2);
        assert_eq!(denial.denied_by, actor2.id);
        assert!(rejected.effects.is_empty());
    }

    #[test]
    fn rejection_from_terminal_status_is_already_final() {
        let request = sample_request();

        // Drive to approved.
        let partial = decide(
            &request,
            approve_action(ApprovalLevel::Level1),
            &level1_actor(),
            Utc::now(),
        )
        .unwrap();
        let approved = decide(
            &partial.request,
            approve_action(ApprovalLevel::Level2),
            &level2_actor(),
            Utc::now(),
        )
        .unwrap();

        let err = decide(
            &approved.request,
            Action::Reject {
                reason: "too late".into(),
            },
            &level1_actor(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GuardViolation::AlreadyFinal {
                status: RequestStatus::Approved
            }
        );

        // Re-rejecting an already-rejected request is also final.
        let rejected = decide(
            &request,
            Action::Reject {
                reason: "first".into(),
            },
            &level1_actor(),
            Utc::now(),
        )
        .unwrap();
        let err = decide(
            &rejected.request,
            Action::Reject {
                reason: "second".into(),
            },
            &level2_actor(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GuardViolation::AlreadyFinal {
                status: RequestStatus::Rejected
            }
        );
    }

    #[test]
    fn delete_is_restricted_to_highest_authority() {
        let request = sample_request();

        for actor in [level1_actor(), level2_actor()] {
            let err = decide(&request, Action::Delete, &actor, Utc::now()).unwrap_err();
            assert!(matches!(err, GuardViolation::WrongAuthority { .. }));
        }

        let decision = decide(&request, Action::Delete, &highest_actor(), Utc::now()).unwrap();
        assert_eq!(decision.effects, vec![SideEffect::RetireCredentials]);
    }

    #[test]
    fn delete_is_available_from_terminal_statuses() {
        let request = sample_request();
        let rejected = decide(
            &request,
            Action::Reject {
                reason: "no".into(),
            },
            &level1_actor(),
            Utc::now(),
        )
        .unwrap();

        let decision = decide(
            &rejected.request,
            Action::Delete,
            &highest_actor(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(decision.effects, vec![SideEffect::RetireCredentials]);
    }
}
