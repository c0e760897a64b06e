use std::num::ParseIntError;

use thiserror::Error;

/// Errors that may occur when encoding or parsing a password token
#[derive(Debug, Error)]
pub enum PasswordError {
    /// Indicates that the user of a type or function has specified an invalid parameter or
    /// set of parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// Indicates that a token was expected to be valid, but is structurally broken (a missing
    /// delimiter, bad base64, a non-hexadecimal iteration count, and so on).
    ///
    /// The offending token is kept in `input` for diagnostics. It is deliberately left out of
    /// the `Display` output because the token embeds the password hash.
    #[error("Malformed encoded password: {reason}")]
    Malformed {
        /// What was wrong with the token
        reason: &'static str,
        /// The token that failed to parse
        input: String,
        /// The decoding failure underneath, if there was one
        #[source]
        cause: Option<DecodeCause>,
    },

    /// The token's leading field is a well-formed version number that this build does not
    /// know how to read
    #[error("Unsupported encoded password version: {0}")]
    UnsupportedVersion(String),

    /// The operating system's random number generator failed to produce a salt
    #[error("Unable to generate salt: {0}")]
    SaltGeneration(#[source] rand::Error),

    /// The key derivation function rejected its inputs
    #[error("Key derivation failed: {0}")]
    KeyDerivation(&'static str),
}

/// The underlying failure behind a [`PasswordError::Malformed`] error
#[derive(Debug, Error)]
pub enum DecodeCause {
    /// The salt or hash field is not valid standard base64
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    /// The iterations field is not a valid hexadecimal `u32`
    #[error(transparent)]
    Iterations(#[from] ParseIntError),
}

impl PasswordError {
    pub(crate) fn malformed(reason: &'static str, input: &str) -> Self {
        PasswordError::Malformed {
            reason,
            input: input.to_owned(),
            cause: None,
        }
    }

    pub(crate) fn malformed_by<C>(reason: &'static str, input: &str, cause: C) -> Self
    where
        C: Into<DecodeCause>,
    {
        PasswordError::Malformed {
            reason,
            input: input.to_owned(),
            cause: Some(cause.into()),
        }
    }
}

/// Result type alias for token operations
pub type PasswordResult<T> = Result<T, PasswordError>;
