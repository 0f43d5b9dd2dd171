use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while opening an envelope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The authentication trailer did not verify: wrong credential,
    /// corrupted bytes, or a truncated body.
    #[error("HMAC mismatch: wrong credential or corrupted envelope")]
    HmacMismatch,

    /// The leading bytes do not describe any supported envelope format.
    #[error("unrecognized envelope header")]
    UnknownHeader,

    /// The stream ended before a complete header could be read.
    #[error("envelope truncated: stream ended mid-header")]
    MessageTooShort,

    /// The envelope was sealed with the other credential kind.
    #[error("credential kind does not match the envelope mode")]
    InvalidCredentialType,

    /// A byte string has the wrong length for the field it was meant to
    /// fill.
    #[error("invalid {what} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}
