use crate::encoded::CURRENT_VERSION;
use crate::error::{PasswordError, PasswordResult};

/// Separates the fields of a token. None of the field encodings (decimal, base64, hex) can
/// produce this character, so no escaping is needed.
pub const DELIMITER: char = '.';

/// Longest token, in bytes, that will be considered for parsing
pub const MAX_ENCODED_PASSWORD_LEN: usize = 1024;

type FieldParser = for<'a> fn(u8, &'a str, &'a str) -> PasswordResult<TokenizedPassword<'a>>;

/// Every token version this build can read, mapped to the parser for the fields that follow
/// the version field
const VERSION_PARSERS: &[(u8, FieldParser)] = &[(CURRENT_VERSION, tokenize_v1)];

/// The still-encoded fields of a token, borrowed from the input string
#[derive(Debug, PartialEq, Eq)]
pub struct TokenizedPassword<'a> {
    pub version: u8,
    pub b64_salt: &'a str,
    pub hex_iterations: &'a str,
    pub b64_hash: &'a str,
}

impl<'a> TokenizedPassword<'a> {
    pub fn tokenize(s: &'a str) -> PasswordResult<Self> {
        if s.len() > MAX_ENCODED_PASSWORD_LEN {
            return Err(PasswordError::malformed("Encoded password is too long", s));
        }

        let (version_field, body) = match s.split_once(DELIMITER) {
            Some(parts) => parts,
            None => {
                return Err(PasswordError::malformed(
                    "Encoded password should begin with a version",
                    s,
                ))
            }
        };

        let version = parse_version(version_field, s)?;

        let parser = VERSION_PARSERS
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, parser)| *parser)
            .ok_or_else(|| PasswordError::UnsupportedVersion(version_field.to_owned()))?;

        parser(version, body, s)
    }
}

/// Reads the leading version field. Only canonical decimal is accepted, so `01` is rejected
/// rather than being read as version 1.
fn parse_version(field: &str, s: &str) -> PasswordResult<u8> {
    if field.is_empty() {
        return Err(PasswordError::malformed("Missing version", s));
    }

    if !field.bytes().all(|b| b.is_ascii_digit()) || (field.len() > 1 && field.starts_with('0'))
    {
        return Err(PasswordError::malformed("Invalid version", s));
    }

    field
        .parse()
        .map_err(|_| PasswordError::UnsupportedVersion(field.to_owned()))
}

/// Version 1 layout: `<salt: base64>.<iterations: hex>.<hash: base64>`
///
/// An empty salt or hash field is an empty byte string. Only the iterations field must be
/// present.
fn tokenize_v1<'a>(
    version: u8,
    body: &'a str,
    s: &'a str,
) -> PasswordResult<TokenizedPassword<'a>> {
    enum FieldStates {
        Salt,
        Iterations,
        Hash,
    }

    let mut state = FieldStates::Salt;

    let mut salt = 0..0;
    let mut iterations = 0..0;
    let mut hash = 0..0;

    for (i, c) in body.char_indices() {
        match state {
            FieldStates::Salt => {
                if c == DELIMITER {
                    salt.end = i;
                    iterations = (i + 1)..(i + 1);
                    state = FieldStates::Iterations;
                }
            }

            FieldStates::Iterations => {
                if c == DELIMITER {
                    iterations.end = i;
                    hash = (i + 1)..body.len();
                    state = FieldStates::Hash;
                }
            }

            FieldStates::Hash => {
                if c == DELIMITER {
                    return Err(PasswordError::malformed("Unexpected delimiter in hash", s));
                }
            }
        }
    }

    match state {
        FieldStates::Salt => {
            return Err(PasswordError::malformed(
                "Encoded password should contain a salt",
                s,
            ))
        }
        FieldStates::Iterations => {
            return Err(PasswordError::malformed(
                "Encoded password should contain number of iterations",
                s,
            ))
        }
        FieldStates::Hash => (),
    }

    if iterations.is_empty() {
        return Err(PasswordError::malformed("Missing iterations", s));
    }

    Ok(TokenizedPassword {
        version,
        b64_salt: &body[salt],
        hex_iterations: &body[iterations],
        b64_hash: &body[hash],
    })
}
