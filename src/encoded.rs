use crate::encoder::MIN_HASH_LENGTH;
use crate::error::{PasswordError, PasswordResult};
use crate::kdf::KeyDerivation;
use crate::lexer::{TokenizedPassword, DELIMITER, MAX_ENCODED_PASSWORD_LEN};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use std::fmt::{self, Write as _};
use std::str::FromStr;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// The token format version written by this build
pub const CURRENT_VERSION: u8 = 1;

/// Standard alphabet. Padding is written on output and optional on input.
const B64_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A snapshot of one password encoding: the format version, the salt, the iteration count
/// and the derived hash.
///
/// The fields cannot be changed after construction. Accessors hand out shared borrows only.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedPassword {
    version: u8,
    salt: Vec<u8>,
    iterations: u32,
    hash: Vec<u8>,
}

impl EncodedPassword {
    /// Assembles an `EncodedPassword` in the current format version from the outputs of a key
    /// derivation.
    ///
    /// No checks are made here. The encoder is responsible for salt length, hash length and
    /// iteration count. Empty salts and hashes survive a round trip through the token string;
    /// zero iterations do not, since `parse` rejects them.
    pub fn new(salt: Vec<u8>, iterations: u32, password_hash: Vec<u8>) -> Self {
        Self {
            version: CURRENT_VERSION,
            salt,
            iterations,
            hash: password_hash,
        }
    }

    /// Reads a token of the form `<version>.<salt: base64>.<iterations: hex>.<hash: base64>`.
    ///
    /// Any problem with the token fails the whole parse. Tokens in a version this build does
    /// not know, including the legacy three-field layout without a version, are rejected.
    pub fn parse(s: &str) -> PasswordResult<Self> {
        let tokens = TokenizedPassword::tokenize(s)?;

        let salt = B64_STANDARD
            .decode(tokens.b64_salt)
            .map_err(|e| PasswordError::malformed_by("Invalid base64-encoded salt", s, e))?;

        let iterations = parse_hex_iterations(tokens.hex_iterations, s)?;

        let hash = B64_STANDARD
            .decode(tokens.b64_hash)
            .map_err(|e| PasswordError::malformed_by("Invalid base64-encoded hash", s, e))?;

        Ok(Self {
            version: tokens.version,
            salt,
            iterations,
            hash,
        })
    }

    /// Renders the token string. This is the exact inverse of [`EncodedPassword::parse`].
    pub fn as_encoded_string(&self) -> String {
        self.to_string()
    }

    /// The format version this value was created with or read from
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns a reference to a byte slice of the salt used to generate the hash.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// The key derivation work factor
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Returns a reference to a byte slice of the derived hash.
    pub fn password_hash(&self) -> &[u8] {
        &self.hash
    }

    /// Re-derives a hash from `password` using this value's salt and iteration count and
    /// checks it against the stored hash.
    ///
    /// The comparison runs over the whole hash regardless of where the first differing byte
    /// is. The recomputed hash is wiped from memory once the comparison is done.
    ///
    /// A stored hash shorter than [`MIN_HASH_LENGTH`](crate::MIN_HASH_LENGTH) never matches;
    /// such a short hash would let a guessed password through far too often.
    pub fn verify_with<K>(&self, kdf: &K, password: &[u8]) -> PasswordResult<bool>
    where
        K: KeyDerivation + ?Sized,
    {
        if self.hash.len() < MIN_HASH_LENGTH {
            return Ok(false);
        }

        let candidate = Zeroizing::new(kdf.derive_hash(
            password,
            &self.salt,
            self.iterations,
            self.hash.len(),
        )?);

        Ok(candidate.as_slice().ct_eq(self.hash.as_slice()).into())
    }
}

/// Iterations are bare hexadecimal digits. `from_str_radix` on its own would also take a
/// leading `+`.
fn parse_hex_iterations(field: &str, s: &str) -> PasswordResult<u32> {
    if !field.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(PasswordError::malformed(
            "Iterations should be a hexadecimal number",
            s,
        ));
    }

    let iterations = u32::from_str_radix(field, 16)
        .map_err(|e| PasswordError::malformed_by("Iterations out of range", s, e))?;

    if iterations == 0 {
        return Err(PasswordError::malformed("Iterations must be at least 1", s));
    }

    Ok(iterations)
}

impl fmt::Display for EncodedPassword {
    /// Writes the token string, for example:
    ///
    /// _1.AQIDBAUGBwg=.1f5.ypJ3pKxN4aWGkwMv0TOb08OIzwrfK1SZWy64vyTLKo8=_
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut token = String::with_capacity(MAX_ENCODED_PASSWORD_LEN);

        write!(token, "{}", self.version)?;
        token.push(DELIMITER);
        B64_STANDARD.encode_string(&self.salt, &mut token);
        token.push(DELIMITER);
        write!(token, "{:x}", self.iterations)?;
        token.push(DELIMITER);
        B64_STANDARD.encode_string(&self.hash, &mut token);

        f.write_str(&token)
    }
}

impl FromStr for EncodedPassword {
    type Err = PasswordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for EncodedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedPassword")
            .field("version", &self.version)
            .field("salt", &format_args!("[{} bytes]", self.salt.len()))
            .field("iterations", &self.iterations)
            .field("hash", &format_args!("[REDACTED; {} bytes]", self.hash.len()))
            .finish()
    }
}
