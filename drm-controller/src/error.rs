//! Controller error types (`spec.md` §7).
//!
//! These are all distinct `Error` variants so each maps onto exactly one of
//! `spec.md` §7's named error kinds, but they are not all handled the same
//! way: authentication/authorization variants are caught by the command
//! handlers and turned into the documented silent/out-of-band signal
//! (`wav_size = 0`, `login_status = 0`, a fixed sleep); crypto and DMA
//! failures abort the in-flight operation; `Init` failures are propagated
//! out of `main` and halt the controller.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("no user is logged in")]
    NotLoggedIn,

    #[error("already logged in")]
    AlreadyLoggedIn,

    #[error("unknown user")]
    UnknownUser,

    #[error("incorrect PIN")]
    BadPin,

    #[error("user is not the song's owner")]
    NotOwner,

    #[error("song's user table is full")]
    UserTableFull,

    #[error("HMAC tag mismatch")]
    HmacMismatch,

    #[error("AES-CBC decryption failed: {0}")]
    DecryptFailed(String),

    #[error("invalid PKCS#7 padding")]
    BadPadding,

    #[error("malformed song metadata: {0}")]
    MalformedMetadata(String),

    #[error("DMA transfer error: {0}")]
    DmaError(String),

    #[error("controller initialization failed: {0}")]
    InitFailed(String),
}

impl From<drm_common::Error> for Error {
    fn from(e: drm_common::Error) -> Self {
        Error::MalformedMetadata(e.to_string())
    }
}
