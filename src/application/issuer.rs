use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IssuerError {
    #[error("Issuer token digest must be 64 hex characters")]
    InvalidDigest,
}

/// SHA-256 hex digest of an issuer token, the form operators configure.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Server-side capability check for issuing certificates.
///
/// Only the digest of the bearer token is held. With no digest configured
/// issuance is open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuerGate {
    digest: Option<[u8; 32]>,
}

impl IssuerGate {
    pub fn open() -> Self {
        Self { digest: None }
    }

    pub fn from_digest(digest_hex: &str) -> Result<Self, IssuerError> {
        let bytes = hex::decode(digest_hex.trim()).map_err(|_| IssuerError::InvalidDigest)?;
        let digest: [u8; 32] = bytes.try_into().map_err(|_| IssuerError::InvalidDigest)?;
        Ok(Self {
            digest: Some(digest),
        })
    }

    pub fn is_open(&self) -> bool {
        self.digest.is_none()
    }

    /// `authorization` is the raw `Authorization` header value.
    pub fn permits(&self, authorization: Option<&str>) -> bool {
        let Some(expected) = &self.digest else {
            return true;
        };

        let Some(token) = authorization.and_then(|h| h.strip_prefix("Bearer ")) else {
            return false;
        };

        let presented = Sha256::digest(token.trim().as_bytes());
        presented
            .iter()
            .zip(expected.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
