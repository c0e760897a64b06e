use crate::error::{PasswordError, PasswordResult};

use rand::{rngs::OsRng, Fill};
use sha2::Sha512;

/// A deterministic, deliberately expensive function from a password, salt and iteration
/// count to a hash.
///
/// Verification re-runs the derivation with the salt and iteration count read back from a
/// token, so an implementation must always produce the same output for the same inputs.
pub trait KeyDerivation: Send + Sync {
    /// Derives a hash of exactly `hash_len` bytes
    fn derive_hash(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        hash_len: usize,
    ) -> PasswordResult<Vec<u8>>;
}

/// PBKDF2 with HMAC-SHA512 as the pseudorandom function
#[derive(Clone, Copy, Debug, Default)]
pub struct Pbkdf2Sha512;

impl KeyDerivation for Pbkdf2Sha512 {
    fn derive_hash(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        hash_len: usize,
    ) -> PasswordResult<Vec<u8>> {
        if iterations == 0 {
            return Err(PasswordError::KeyDerivation("Iterations must be at least 1"));
        }

        if hash_len == 0 {
            return Err(PasswordError::KeyDerivation("Hash length must be at least 1"));
        }

        let mut hash = vec![0u8; hash_len];
        pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut hash);

        Ok(hash)
    }
}

/// A source of salts. Salts must be unpredictable and must differ between calls.
pub trait SaltSource: Send + Sync {
    /// Produces a fresh salt of `len` bytes
    fn generate_salt(&self, len: usize) -> PasswordResult<Vec<u8>>;
}

/// Draws salts from the operating system's cryptographically-secure random number generator
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRngSalt;

impl SaltSource for OsRngSalt {
    fn generate_salt(&self, len: usize) -> PasswordResult<Vec<u8>> {
        let mut salt = vec![0u8; len];
        salt.try_fill(&mut OsRng).map_err(PasswordError::SaltGeneration)?;

        Ok(salt)
    }
}
