use crate::encoded::EncodedPassword;
use crate::error::{PasswordError, PasswordResult};
use crate::kdf::{KeyDerivation, OsRngSalt, Pbkdf2Sha512, SaltSource};

/// Work factor used by [`PasswordEncoder::encode`] unless configured otherwise. This follows
/// the OWASP recommendation for PBKDF2-HMAC-SHA512.
pub const DEFAULT_ITERATIONS: u32 = 210_000;

/// The shortest salt, in bytes, that the encoder will generate. Also the default.
pub const MIN_SALT_LENGTH: usize = 64;

/// Length of the derived hash, in bytes, unless configured otherwise
pub const DEFAULT_HASH_LENGTH: usize = 64;

/// The shortest derived hash, in bytes, that the encoder will produce
pub const MIN_HASH_LENGTH: usize = 16;

/// Turns raw passwords into tokens and checks raw passwords against tokens.
///
/// The encoder holds configuration only. Every call is independent of every other, so a
/// single encoder can be shared freely between threads.
#[derive(Clone, Debug)]
pub struct PasswordEncoder<K = Pbkdf2Sha512, S = OsRngSalt> {
    iterations: u32,
    salt_len: usize,
    hash_len: usize,
    max_iterations: Option<u32>,
    kdf: K,
    salt_source: S,
}

impl Default for PasswordEncoder {
    /// Create a new `PasswordEncoder` with default values.
    ///
    /// The defaults are as follows:
    ///
    /// * Key derivation: PBKDF2-HMAC-SHA512
    /// * Iterations: 210,000
    /// * Salt Length: 64 bytes, from the operating system's secure random number generator
    /// * Hash Length: 64 bytes
    /// * Maximum Iterations: none
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            salt_len: MIN_SALT_LENGTH,
            hash_len: DEFAULT_HASH_LENGTH,
            max_iterations: None,
            kdf: Pbkdf2Sha512,
            salt_source: OsRngSalt,
        }
    }
}

impl PasswordEncoder {
    /// Create a new `PasswordEncoder` with default values. See
    /// [`PasswordEncoder::default()`].
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, S> PasswordEncoder<K, S>
where
    K: KeyDerivation,
    S: SaltSource,
{
    /// The number of iterations used by [`encode()`](Self::encode). Raise this as far as
    /// your login latency budget allows.
    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// The length of generated salts, in bytes. Values below [`MIN_SALT_LENGTH`] are
    /// rejected when encoding.
    pub fn salt_length(mut self, salt_len: usize) -> Self {
        self.salt_len = salt_len;
        self
    }

    /// The length of the derived hash, in bytes. Values below [`MIN_HASH_LENGTH`] are
    /// rejected when encoding.
    pub fn hash_length(mut self, hash_len: usize) -> Self {
        self.hash_len = hash_len;
        self
    }

    /// The most iterations [`matches()`](Self::matches) will run for a stored token. A token
    /// asking for more never matches and the key derivation is skipped, so a tampered token
    /// cannot tie up a thread for hours. Encoding is capped the same way.
    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Replaces the key derivation function.
    ///
    /// Tokens carry no record of which function produced them, so every encoder that reads
    /// a set of tokens must use the same function that wrote them.
    pub fn key_derivation<K2: KeyDerivation>(self, kdf: K2) -> PasswordEncoder<K2, S> {
        PasswordEncoder {
            iterations: self.iterations,
            salt_len: self.salt_len,
            hash_len: self.hash_len,
            max_iterations: self.max_iterations,
            kdf,
            salt_source: self.salt_source,
        }
    }

    /// Replaces the source of salts
    pub fn salt_source<S2: SaltSource>(self, salt_source: S2) -> PasswordEncoder<K, S2> {
        PasswordEncoder {
            iterations: self.iterations,
            salt_len: self.salt_len,
            hash_len: self.hash_len,
            max_iterations: self.max_iterations,
            kdf: self.kdf,
            salt_source,
        }
    }

    /// Hashes `password` with a fresh salt and the configured iteration count, returning the
    /// token string.
    ///
    /// This is an expensive operation. For some applications, it might make sense to move this
    /// operation to a separate thread to avoid blocking main threads.
    pub fn encode<P>(&self, password: &P) -> PasswordResult<String>
    where
        P: AsRef<[u8]> + ?Sized,
    {
        self.encode_with_iterations(password, self.iterations)
    }

    /// Like [`encode()`](Self::encode), but with an explicit iteration count
    pub fn encode_with_iterations<P>(
        &self,
        password: &P,
        iterations: u32,
    ) -> PasswordResult<String>
    where
        P: AsRef<[u8]> + ?Sized,
    {
        Ok(self.encode_password(password, iterations)?.as_encoded_string())
    }

    /// Hashes `password` with a fresh salt and returns the [`EncodedPassword`] rather than its
    /// token string.
    pub fn encode_password<P>(
        &self,
        password: &P,
        iterations: u32,
    ) -> PasswordResult<EncodedPassword>
    where
        P: AsRef<[u8]> + ?Sized,
    {
        if iterations == 0 {
            return Err(PasswordError::InvalidParameter("Iterations must be at least 1"));
        }

        if self.exceeds_max_iterations(iterations) {
            return Err(PasswordError::InvalidParameter(
                "Iterations exceed the configured maximum",
            ));
        }

        if self.salt_len < MIN_SALT_LENGTH {
            return Err(PasswordError::InvalidParameter("Salt length is too short"));
        }

        if self.hash_len < MIN_HASH_LENGTH {
            return Err(PasswordError::InvalidParameter("Hash length is too short"));
        }

        let salt = self.salt_source.generate_salt(self.salt_len)?;

        if salt.len() < self.salt_len {
            return Err(PasswordError::InvalidParameter(
                "Salt source produced a short salt",
            ));
        }

        let hash = self
            .kdf
            .derive_hash(password.as_ref(), &salt, iterations, self.hash_len)?;

        tracing::trace!(iterations, salt_len = salt.len(), "encoded password");

        Ok(EncodedPassword::new(salt, iterations, hash))
    }

    /// Checks if `encoded` is a token for `password`.
    ///
    /// Returns `false` both for a wrong password and for a token that cannot be read (bad
    /// structure, unknown version, undecodable fields). Callers who need to tell the two
    /// apart should use [`EncodedPassword::parse`] directly.
    ///
    /// Because verification requires re-hashing the password, this is an expensive operation.
    pub fn matches<P>(&self, password: &P, encoded: &str) -> bool
    where
        P: AsRef<[u8]> + ?Sized,
    {
        let verified = EncodedPassword::parse(encoded).and_then(|encoded| {
            if self.exceeds_max_iterations(encoded.iterations()) {
                tracing::debug!(
                    iterations = encoded.iterations(),
                    "encoded password exceeds the iteration limit"
                );
                return Ok(false);
            }

            encoded.verify_with(&self.kdf, password.as_ref())
        });

        match verified {
            Ok(is_match) => is_match,
            Err(e) => {
                tracing::debug!(error = %e, "unable to verify encoded password");
                false
            }
        }
    }

    /// Checks if a stored token was produced with weaker settings than this encoder's, or
    /// cannot be read at all. A caller that has just verified a password can use this to
    /// decide whether to re-encode it.
    pub fn needs_rehash(&self, encoded: &str) -> bool {
        let encoded = match EncodedPassword::parse(encoded) {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "rehash needed for unreadable encoded password");
                return true;
            }
        };

        let outdated = encoded.iterations() < self.iterations
            || encoded.salt().len() < self.salt_len
            || encoded.password_hash().len() < self.hash_len;

        if outdated {
            tracing::debug!(
                iterations = encoded.iterations(),
                salt_len = encoded.salt().len(),
                hash_len = encoded.password_hash().len(),
                "rehash needed for outdated encoded password"
            );
        }

        outdated
    }

    fn exceeds_max_iterations(&self, iterations: u32) -> bool {
        self.max_iterations.is_some_and(|max| iterations > max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoded::CURRENT_VERSION;

    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Always produces the same salt, so hashes can be compared across calls
    struct FixedSalt(u8);

    impl SaltSource for FixedSalt {
        fn generate_salt(&self, len: usize) -> PasswordResult<Vec<u8>> {
            Ok(vec![self.0; len])
        }
    }

    struct ShortSalt;

    impl SaltSource for ShortSalt {
        fn generate_salt(&self, _len: usize) -> PasswordResult<Vec<u8>> {
            Ok(vec![0; 8])
        }
    }

    struct FailingKdf;

    impl KeyDerivation for FailingKdf {
        fn derive_hash(&self, _: &[u8], _: &[u8], _: u32, _: usize) -> PasswordResult<Vec<u8>> {
            Err(PasswordError::KeyDerivation("Always fails"))
        }
    }

    #[derive(Default)]
    struct CountingKdf(AtomicUsize);

    impl KeyDerivation for CountingKdf {
        fn derive_hash(
            &self,
            password: &[u8],
            salt: &[u8],
            iterations: u32,
            hash_len: usize,
        ) -> PasswordResult<Vec<u8>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Pbkdf2Sha512.derive_hash(password, salt, iterations, hash_len)
        }
    }

    fn fast_encoder() -> PasswordEncoder {
        PasswordEncoder::new().iterations(8)
    }

    #[test]
    fn test_defaults() {
        let encoder = PasswordEncoder::default();

        assert_eq!(encoder.iterations, DEFAULT_ITERATIONS);
        assert_eq!(encoder.salt_len, MIN_SALT_LENGTH);
        assert_eq!(encoder.hash_len, DEFAULT_HASH_LENGTH);
    }

    #[test]
    fn test_encode_uses_configuration() {
        let encoder = fast_encoder().salt_length(80).hash_length(32);
        let encoded = EncodedPassword::parse(&encoder.encode("@Pa$$20rd-Test").unwrap()).unwrap();

        assert_eq!(encoded.version(), CURRENT_VERSION);
        assert_eq!(encoded.iterations(), 8);
        assert_eq!(encoded.salt().len(), 80);
        assert_eq!(encoded.password_hash().len(), 32);
    }

    #[test]
    fn test_encode_accepts_bytes() {
        let encoder = fast_encoder();
        let password = [0xffu8, 0x00, 0x2e];

        let token = encoder.encode(&password).unwrap();

        assert!(encoder.matches(&password, &token));
        assert!(!encoder.matches(&password[..2], &token));
    }

    #[test]
    fn test_encode_with_fixed_salt_is_deterministic() {
        let encoder = fast_encoder().salt_source(FixedSalt(3));

        let first = encoder.encode("password").unwrap();
        let second = encoder.encode("password").unwrap();

        assert_eq!(first, second);
        assert!(fast_encoder().matches("password", &first));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            fast_encoder().encode_with_iterations("password", 0),
            Err(PasswordError::InvalidParameter(_))
        ));
        assert!(matches!(
            fast_encoder().salt_length(MIN_SALT_LENGTH - 1).encode("password"),
            Err(PasswordError::InvalidParameter(_))
        ));
        assert!(matches!(
            fast_encoder().hash_length(MIN_HASH_LENGTH - 1).encode("password"),
            Err(PasswordError::InvalidParameter(_))
        ));
        assert!(matches!(
            fast_encoder().salt_source(ShortSalt).encode("password"),
            Err(PasswordError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_kdf_failure_propagates_from_encode() {
        assert!(matches!(
            fast_encoder().key_derivation(FailingKdf).encode("password"),
            Err(PasswordError::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_matches_fails_closed_on_kdf_failure() {
        let token = fast_encoder().encode("password").unwrap();
        assert!(!fast_encoder().key_derivation(FailingKdf).matches("password", &token));
    }

    #[test]
    fn test_matches_skips_kdf_for_unreadable_token() {
        let encoder = fast_encoder().key_derivation(CountingKdf::default());

        assert!(!encoder.matches("password", "not.a.realhash"));
        assert!(!encoder.matches("password", "2.AQIDBAUGBwg=.8.AQIDBAUGBwg="));
        assert_eq!(encoder.kdf.0.load(Ordering::SeqCst), 0);

        let token = encoder.encode("password").unwrap();
        assert!(encoder.matches("password", &token));
        assert_eq!(encoder.kdf.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_matches_rejects_tampered_hash() {
        let encoder = fast_encoder();
        let encoded = encoder.encode_password("password", 8).unwrap();

        let mut hash = encoded.password_hash().to_vec();
        let last = hash.len() - 1;
        hash[last] ^= 1;

        let tampered = EncodedPassword::new(encoded.salt().to_vec(), 8, hash);
        assert!(!encoder.matches("password", &tampered.as_encoded_string()));
        assert!(encoder.matches("password", &encoded.as_encoded_string()));
    }

    #[test]
    fn test_matches_rejects_short_stored_hash() {
        let encoder = PasswordEncoder::new().iterations(1);
        let encoded = encoder.encode_password("password", 1).unwrap();

        let one_byte = EncodedPassword::new(
            encoded.salt().to_vec(),
            1,
            encoded.password_hash()[..1].to_vec(),
        )
        .as_encoded_string();

        assert!(!encoder.matches("password", &one_byte));
        assert!((0..2000).all(|i| !encoder.matches(&format!("wrong-{i}"), &one_byte)));

        let just_short = EncodedPassword::new(
            encoded.salt().to_vec(),
            1,
            encoded.password_hash()[..MIN_HASH_LENGTH - 1].to_vec(),
        )
        .as_encoded_string();

        assert!(!encoder.matches("password", &just_short));

        let shortest = EncodedPassword::new(
            encoded.salt().to_vec(),
            1,
            encoded.password_hash()[..MIN_HASH_LENGTH].to_vec(),
        )
        .as_encoded_string();

        assert!(encoder.matches("password", &shortest));
    }

    #[test]
    fn test_max_iterations() {
        let counting = fast_encoder().key_derivation(CountingKdf::default());
        let token = counting.encode_with_iterations("password", 64).unwrap();
        let calls = counting.kdf.0.load(Ordering::SeqCst);

        let capped = counting.max_iterations(32);
        assert!(!capped.matches("password", &token));
        assert_eq!(capped.kdf.0.load(Ordering::SeqCst), calls);

        let capped = capped.max_iterations(64);
        assert!(capped.matches("password", &token));

        assert!(matches!(
            capped.encode_with_iterations("password", 65),
            Err(PasswordError::InvalidParameter(_))
        ));

        let huge = format!("1.{}.ffffffff.{}", "AA".repeat(43), "AA".repeat(43));
        assert!(!fast_encoder().max_iterations(1_000).matches("password", &huge));
    }

    #[test]
    fn test_needs_rehash() {
        let weak = fast_encoder();
        let strong = fast_encoder().iterations(16);

        let weak_token = weak.encode("password").unwrap();
        let strong_token = strong.encode("password").unwrap();

        assert!(!weak.needs_rehash(&weak_token));
        assert!(!weak.needs_rehash(&strong_token));
        assert!(strong.needs_rehash(&weak_token));
        assert!(!strong.needs_rehash(&strong_token));

        assert!(weak.salt_length(96).needs_rehash(&weak_token));
        assert!(fast_encoder().needs_rehash("not-a-realhash"));
    }
}
