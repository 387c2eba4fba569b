use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_PREFIX: &str = "PRJ";

/// Longest identifier accepted from outside.
pub const MAX_IDENTIFIER_LEN: usize = 128;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Identifier cannot be empty")]
    Empty,

    #[error("Identifier prefix must be uppercase letters or digits: {0}")]
    InvalidPrefix(String),

    #[error("Identifier is {0} bytes, longer than the 128 byte limit")]
    TooLong(usize),

    #[error("Malformed identifier: {0}")]
    Malformed(String),
}

/// Document number assigned to a submission (NDN).
///
/// Generated numbers look like `PREFIX-` followed by the millisecond
/// timestamp and five random digits, but stored records may carry older
/// shapes such as `NDN-PRJ-...`. Parsing therefore keeps the value exactly
/// as given and only rejects input no record could carry: blank, over-long,
/// or containing control characters. Whether the record exists is the
/// store's answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ndn(String);

impl Ndn {
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        if raw.trim().is_empty() {
            return Err(IdentifierError::Empty);
        }
        if raw.len() > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::TooLong(raw.len()));
        }
        if raw.chars().any(char::is_control) {
            return Err(IdentifierError::Malformed(raw.escape_debug().to_string()));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn prefix(&self) -> &str {
        self.0.split_once('-').map(|(p, _)| p).unwrap_or_default()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Ndn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ndn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Produces fresh document numbers.
///
/// Uniqueness is probabilistic: two calls only collide when they land on the
/// same millisecond and draw the same five random digits. The store's
/// uniqueness constraint is the actual guarantee.
#[derive(Debug, Clone)]
pub struct IdentifierGenerator {
    prefix: String,
}

impl IdentifierGenerator {
    pub fn new(prefix: &str) -> Result<Self, IdentifierError> {
        if !is_valid_prefix(prefix) {
            return Err(IdentifierError::InvalidPrefix(prefix.to_string()));
        }

        Ok(Self {
            prefix: prefix.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn generate(&self) -> Ndn {
        let millis = Utc::now().timestamp_millis();
        let (mid, unique) = random_draws();
        Ndn(format_identifier(&self.prefix, millis, mid, unique))
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

/// Lays out an identifier from its parts. `mid` is padded to two digits and
/// `unique` to three.
pub fn format_identifier(prefix: &str, millis: i64, mid: u8, unique: u16) -> String {
    format!("{prefix}-{millis}{mid:02}{unique:03}")
}

// Both draws come from the 122 random bits of a v4 UUID.
fn random_draws() -> (u8, u16) {
    let bits = uuid::Uuid::new_v4().as_u128();
    let mid = (bits % 100) as u8;
    let unique = ((bits >> 64) % 1000) as u16;
    (mid, unique)
}

fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
