//! Workflow configuration.

/// Configuration for the approval workflow and credential policy.
#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    /// Credential retention window in days. `0` disables expiry.
    pub credential_retention_days: u32,
    /// Maximum re-read attempts when an optimistic write loses the
    /// race on a concurrent transition.
    pub max_transition_retries: u32,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            credential_retention_days: 30,
            max_transition_retries: 3,
        }
    }
}
