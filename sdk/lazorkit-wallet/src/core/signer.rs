use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::error::WalletError;

/// Opaque reference to a platform passkey.
///
/// Serialized as standard base64 so it survives text-only storage.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CredentialId(Vec<u8>);

impl CredentialId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

impl fmt::Debug for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialId({})", self.to_base64())
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl From<&str> for CredentialId {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl Serialize for CredentialId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for CredentialId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        if bytes.is_empty() {
            return Err(serde::de::Error::custom("empty credential id"));
        }
        Ok(Self(bytes))
    }
}

/// Result of a registration ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialHandle {
    pub credential_id: CredentialId,

    /// Compressed Secp256r1 public key (33 bytes)
    pub public_key: Vec<u8>,
}

/// Result of an authentication ceremony over a caller-supplied challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialAssertion {
    pub credential_id: CredentialId,
    pub signature: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub client_data_json: Vec<u8>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The user dismissed the prompt
    #[error("passkey prompt cancelled")]
    Cancelled,

    /// No platform authenticator, or the credential no longer exists
    #[error("passkey unavailable: {0}")]
    Unavailable(String),
}

impl From<CredentialError> for WalletError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Cancelled => WalletError::UserCancelled,
            CredentialError::Unavailable(reason) => WalletError::CredentialUnavailable(reason),
        }
    }
}

/// Platform biometric API bound to the credential portal origin.
///
/// Both calls suspend while the user interacts with the prompt.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Register a new passkey.
    async fn create_credential(&self, portal_url: &str)
        -> Result<CredentialHandle, CredentialError>;

    /// Assert an existing passkey over `challenge`.
    async fn sign(
        &self,
        portal_url: &str,
        credential_id: &CredentialId,
        challenge: &[u8],
    ) -> Result<CredentialAssertion, CredentialError>;
}
