#![deny(missing_docs)]

//! A library for turning passwords into portable, versioned hash tokens and for checking
//! passwords against those tokens later.
//!
//! A token is a single string that holds everything needed to verify a password: the format
//! version, the salt, the iteration count and the derived hash. Store one token per user and
//! hand it back to [`matches()`] at login time.
//!
//! ```text
//! <version: decimal>.<salt: base64>.<iterations: hex>.<hash: base64>
//! ```
//!
//! Hashes are derived with PBKDF2-HMAC-SHA512 by default, salted with 64 bytes from the
//! operating system's secure random number generator. Verification compares hashes in
//! constant time and fails closed: a token that is corrupted, truncated, tampered with or in
//! an unknown format simply does not match.
//!
//! # Usage
//!
//! To use pbkdf2-token, add the following to your Cargo.toml:
//!
//! ```toml
//! [dependencies]
//! pbkdf2-token = "0.1"
//! ```
//!
//! # Examples
//!
//! Encode a password, then verify it:
//!
//! ```rust
//! let token = pbkdf2_token::encode("password").unwrap();
//!
//! assert!(pbkdf2_token::matches("password", &token));
//! assert!(!pbkdf2_token::matches("another-password", &token));
//! ```
//!
//! Malformed tokens never cause an error from `matches`, they just fail to match:
//!
//! ```rust
//! assert!(!pbkdf2_token::matches("password", "not-a-realhash"));
//! assert!(!pbkdf2_token::matches("password", ".."));
//! ```
//!
//! Change the parameters used for encoding:
//!
//! ```rust
//! use pbkdf2_token::{EncodedPassword, PasswordEncoder};
//!
//! let encoder = PasswordEncoder::new()
//!         .iterations(300_000)
//!         .salt_length(96)
//!         .hash_length(32);
//!
//! let token = encoder.encode("password").unwrap();
//! let encoded = EncodedPassword::parse(&token).unwrap();
//!
//! assert_eq!(encoded.iterations(), 300_000);
//! assert_eq!(encoded.salt().len(), 96);
//! assert_eq!(encoded.password_hash().len(), 32);
//! assert!(encoder.matches("password", &token));
//! ```
//!
//! Tell a malformed token apart from a wrong password:
//!
//! ```rust
//! use pbkdf2_token::{EncodedPassword, PasswordError};
//!
//! let result = EncodedPassword::parse("2.AQIDBAUGBwg=.1f5.ypJ3pKxN4aWG");
//!
//! assert!(matches!(result, Err(PasswordError::UnsupportedVersion(_))));
//! ```
//!
//! Upgrade stored tokens when the work factor is raised:
//!
//! ```rust
//! use pbkdf2_token::PasswordEncoder;
//!
//! let old_token = pbkdf2_token::encode_with_iterations("password", 1_000).unwrap();
//! let encoder = PasswordEncoder::default();
//!
//! if encoder.matches("password", &old_token) && encoder.needs_rehash(&old_token) {
//!     let new_token = encoder.encode("password").unwrap();
//!     assert!(!encoder.needs_rehash(&new_token));
//! }
//! ```

mod encoded;
mod encoder;
mod error;
mod kdf;
mod lexer;

pub use encoded::{EncodedPassword, CURRENT_VERSION};
pub use encoder::{
    PasswordEncoder, DEFAULT_HASH_LENGTH, DEFAULT_ITERATIONS, MIN_HASH_LENGTH, MIN_SALT_LENGTH,
};
pub use error::{DecodeCause, PasswordError, PasswordResult};
pub use kdf::{KeyDerivation, OsRngSalt, Pbkdf2Sha512, SaltSource};
pub use lexer::{DELIMITER, MAX_ENCODED_PASSWORD_LEN};

/// Encodes `password` with a default [`PasswordEncoder`], returning the token string
pub fn encode<P>(password: &P) -> PasswordResult<String>
where
    P: AsRef<[u8]> + ?Sized,
{
    PasswordEncoder::default().encode(password)
}

/// Encodes `password` with a default [`PasswordEncoder`] and the given iteration count
pub fn encode_with_iterations<P>(password: &P, iterations: u32) -> PasswordResult<String>
where
    P: AsRef<[u8]> + ?Sized,
{
    PasswordEncoder::default().encode_with_iterations(password, iterations)
}

/// Checks `password` against a token with a default [`PasswordEncoder`]. Any token that
/// cannot be read gives `false`.
pub fn matches<P>(password: &P, encoded: &str) -> bool
where
    P: AsRef<[u8]> + ?Sized,
{
    PasswordEncoder::default().matches(password, encoded)
}
