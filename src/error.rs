//! Error kinds for the provisioning run.
//!
//! Every failure is fatal for the run: there are no retries. The variants
//! mirror the distinct failure stages so the operator can tell a missing
//! local artifact from a remote API rejection.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Required environment configuration is absent. No remote call has been
    /// attempted when this is raised.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The token endpoint rejected the client credentials or returned an
    /// unusable response.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A local build artifact the bundle depends on is missing. This is a
    /// precondition of the run, not a packaging failure.
    #[error("required build artifact for '{resource}' is missing: {}", path.display())]
    Precondition { resource: String, path: PathBuf },

    /// Assembling the bundle archive failed (I/O or zip error).
    #[error("failed to assemble bundle archive: {0}")]
    Packaging(String),

    /// A remote lookup/create/update/delete/upload/commit call failed.
    /// Carries the resource the call was operating on.
    #[error("remote call failed for '{resource}': {message}")]
    RemoteCall { resource: String, message: String },

    /// Operator input could not be obtained (stream closed or too many
    /// invalid answers).
    #[error("operator input error: {0}")]
    Input(String),
}

impl ProvisionError {
    pub fn remote(resource: impl Into<String>, message: impl ToString) -> Self {
        ProvisionError::RemoteCall {
            resource: resource.into(),
            message: message.to_string(),
        }
    }
}
