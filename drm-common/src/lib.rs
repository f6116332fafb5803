//! # drm-common
//!
//! Shared types for the audio DRM controller workspace:
//! - the secrets table (regions, users, symmetric keys)
//! - the shared command channel's wire types
//! - the on-disk/shared-buffer song container layout
//! - build-time constants and the workspace error type

pub mod channel;
pub mod constants;
pub mod error;
pub mod secrets;
pub mod song;

pub use error::{Error, Result};
pub use secrets::Secrets;
