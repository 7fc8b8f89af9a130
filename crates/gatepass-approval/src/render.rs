//! Artifact renderer collaborator contract.
//!
//! The concrete engine that turns a credential payload into a
//! scannable image and a printable document lives outside this core.
//! The workflow only needs the produced artifact references, and it
//! must tolerate failure: a failed render never reverts a committed
//! approval.

use gatepass_core::models::access_request::AccessRequest;
use gatepass_core::models::credential::CredentialPayload;
use thiserror::Error;

/// References to the rendered artifact pair, owned by the credential.
#[derive(Debug, Clone)]
pub struct RenderedArtifacts {
    /// Scannable image artifact (e.g. a QR image).
    pub image_ref: String,
    /// Printable document artifact embedding subject data, vehicle
    /// photos if present, and the scannable artifact.
    pub document_ref: String,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer failed: {0}")]
    Failed(String),
}

/// External rendering engine.
pub trait ArtifactRenderer: Send + Sync {
    /// Render the artifact pair for a payload. The request supplies
    /// the subject data embedded into the printable document.
    fn render(
        &self,
        payload: &CredentialPayload,
        request: &AccessRequest,
    ) -> impl Future<Output = Result<RenderedArtifacts, RenderError>> + Send;
}
