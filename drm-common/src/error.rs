//! Shared error types for the DRM workspace.

use thiserror::Error;

/// Common result type for `drm-common` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can arise while decoding secrets or song metadata, shared
/// across every crate in the workspace.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("secrets table error: {0}")]
    Secrets(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
