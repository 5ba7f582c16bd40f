use reqwest::Url;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;

use crate::core::constants::{
    DEFAULT_PROGRAM_ID, DEVNET_PAYMASTER_URL, DEVNET_PORTAL_URL, DEVNET_RPC_URL,
    SESSION_STORAGE_KEY,
};
use crate::error::{Result, WalletError};

/// Process-wide configuration, supplied once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConfig {
    /// Solana JSON-RPC endpoint
    pub rpc_endpoint: String,

    /// Passkey portal origin the credential is bound to
    pub credential_portal_endpoint: String,

    /// Paymaster JSON-RPC endpoint
    pub sponsor_endpoint: String,

    /// LazorKit program that owns the smart wallet PDAs
    pub program_id: Pubkey,

    /// How long to poll for confirmation before reporting `Timeout`
    pub confirmation_timeout: Duration,

    pub poll_interval: Duration,

    /// Storage key of the session record
    pub storage_key: String,
}

impl WalletConfig {
    pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(
        rpc_endpoint: impl Into<String>,
        credential_portal_endpoint: impl Into<String>,
        sponsor_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            rpc_endpoint: rpc_endpoint.into(),
            credential_portal_endpoint: credential_portal_endpoint.into(),
            sponsor_endpoint: sponsor_endpoint.into(),
            program_id: DEFAULT_PROGRAM_ID,
            confirmation_timeout: Self::DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            storage_key: SESSION_STORAGE_KEY.to_string(),
        }
    }

    /// Public Solana devnet with the LazorKit portal and paymaster.
    /// For development only.
    pub fn devnet() -> Self {
        Self::new(DEVNET_RPC_URL, DEVNET_PORTAL_URL, DEVNET_PAYMASTER_URL)
    }

    pub fn with_program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = program_id;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_endpoint("rpc_endpoint", &self.rpc_endpoint)?;
        validate_endpoint(
            "credential_portal_endpoint",
            &self.credential_portal_endpoint,
        )?;
        validate_endpoint("sponsor_endpoint", &self.sponsor_endpoint)?;

        if self.poll_interval.is_zero() {
            return Err(WalletError::Validation(
                "poll_interval must be non-zero".into(),
            ));
        }
        if self.poll_interval > self.confirmation_timeout {
            return Err(WalletError::Validation(
                "poll_interval must not exceed confirmation_timeout".into(),
            ));
        }
        if self.storage_key.trim().is_empty() {
            return Err(WalletError::Validation("storage_key is required".into()));
        }
        Ok(())
    }
}

fn validate_endpoint(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WalletError::Validation(format!("{} is required", name)));
    }

    let url = Url::parse(value)
        .map_err(|e| WalletError::Validation(format!("{}: {}", name, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(WalletError::Validation(format!(
            "{}: unsupported scheme {:?}",
            name, other
        ))),
    }
}
