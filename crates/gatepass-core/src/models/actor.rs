//! Actor identity threaded into every state-machine call.
//!
//! The identity/session provider (external to this core) supplies the
//! actor id, display name, and authority level. The core trusts this
//! input and performs no credential verification itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::access_request::ApprovalLevel;

/// Authority level of an actor with respect to the approval workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Authority {
    /// No approval rights (requesters, checkpoint operators).
    None,
    /// Owns approval slot 1.
    Level1,
    /// Owns approval slot 2.
    Level2,
    /// Delete/purge rights; owns neither approval slot.
    Highest,
}

impl Authority {
    /// The approval slot this authority owns, if any.
    pub fn approval_level(&self) -> Option<ApprovalLevel> {
        match self {
            Authority::Level1 => Some(ApprovalLevel::Level1),
            Authority::Level2 => Some(ApprovalLevel::Level2),
            Authority::None | Authority::Highest => None,
        }
    }

    pub fn can_approve(&self, level: ApprovalLevel) -> bool {
        self.approval_level() == Some(level)
    }

    pub fn can_reject(&self) -> bool {
        matches!(self, Authority::Level1 | Authority::Level2)
    }

    pub fn can_delete(&self) -> bool {
        matches!(self, Authority::Highest)
    }
}

impl std::fmt::Display for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authority::None => write!(f, "none"),
            Authority::Level1 => write!(f, "level 1"),
            Authority::Level2 => write!(f, "level 2"),
            Authority::Highest => write!(f, "highest"),
        }
    }
}

/// An authenticated caller, as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    /// Display name, denormalized into audit entries.
    pub name: String,
    pub authority: Authority,
}

impl Actor {
    pub fn new(id: Uuid, name: impl Into<String>, authority: Authority) -> Self {
        Self {
            id,
            name: name.into(),
            authority,
        }
    }
}
