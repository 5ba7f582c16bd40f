//! Fee sponsor (paymaster) seam and its JSON-RPC client.
//!
//! The sponsor co-signs a transaction as fee payer so the smart wallet never
//! needs native balance for fees. The HTTP client speaks JSON-RPC 2.0:
//! `getPayerSigner` returns the fee-payer key, `signTransaction` takes a
//! base64 `bincode` transaction plus the passkey assertion and returns it
//! with the fee-payer signature filled in.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::core::signer::CredentialAssertion;
use crate::error::WalletError;
use crate::types::FeeToken;

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction carrying the user's passkey assertion but not yet the fee-payer signature.
#[derive(Debug, Clone)]
pub struct PartiallySignedTransaction {
    pub transaction: Transaction,
    pub assertion: CredentialAssertion,
    pub fee_token: FeeToken,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SponsorError {
    #[error("sponsor unreachable: {0}")]
    Unavailable(String),

    #[error("sponsor returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl From<SponsorError> for WalletError {
    fn from(err: SponsorError) -> Self {
        WalletError::SponsorUnavailable(err.to_string())
    }
}

/// Remote service that pays the transaction fee.
#[async_trait]
pub trait FeeSponsor: Send + Sync {
    /// Key that will sign as fee payer; compiled into the message before the user signs.
    async fn fee_payer(&self) -> Result<Pubkey, SponsorError>;

    /// Co-sign as fee payer. The returned transaction must carry the same message.
    async fn sponsor(&self, tx: PartiallySignedTransaction) -> Result<Transaction, SponsorError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: String,
    method: &'static str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct PayerSignerResult {
    signer_address: String,
}

#[derive(Debug, Deserialize)]
struct SignTransactionResult {
    signed_transaction: String,
}

/// JSON-RPC paymaster client.
#[derive(Debug, Clone)]
pub struct HttpFeeSponsor {
    endpoint: String,
    client: Client,
}

impl HttpFeeSponsor {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, SponsorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SponsorError::Unavailable(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn rpc_call(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, SponsorError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: REQUEST_ID.fetch_add(1, Ordering::Relaxed).to_string(),
            method,
            params,
        };

        debug!(method, endpoint = %self.endpoint, "sponsor rpc call");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| SponsorError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SponsorError::Unavailable(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| SponsorError::InvalidResponse(e.to_string()))?;

        if let Some(error) = rpc_response.error {
            return Err(SponsorError::Unavailable(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }

        rpc_response
            .result
            .ok_or_else(|| SponsorError::InvalidResponse("missing result".into()))
    }
}

#[async_trait]
impl FeeSponsor for HttpFeeSponsor {
    async fn fee_payer(&self) -> Result<Pubkey, SponsorError> {
        let result = self.rpc_call("getPayerSigner", json!({})).await?;
        let parsed: PayerSignerResult = serde_json::from_value(result)
            .map_err(|e| SponsorError::InvalidResponse(e.to_string()))?;
        Pubkey::from_str(&parsed.signer_address)
            .map_err(|e| SponsorError::InvalidResponse(format!("signer_address: {}", e)))
    }

    async fn sponsor(&self, tx: PartiallySignedTransaction) -> Result<Transaction, SponsorError> {
        let result = self
            .rpc_call("signTransaction", sign_transaction_params(&tx)?)
            .await?;
        let parsed: SignTransactionResult = serde_json::from_value(result)
            .map_err(|e| SponsorError::InvalidResponse(e.to_string()))?;
        decode_transaction(&parsed.signed_transaction)
    }
}

fn sign_transaction_params(
    tx: &PartiallySignedTransaction,
) -> Result<serde_json::Value, SponsorError> {
    let fee_token = match &tx.fee_token {
        FeeToken::Sponsored => serde_json::Value::Null,
        FeeToken::Token(mint) => json!(mint.to_string()),
    };

    Ok(json!({
        "transaction": encode_transaction(&tx.transaction)?,
        "fee_token": fee_token,
        "credential": {
            "id": tx.assertion.credential_id.to_base64(),
            "signature": STANDARD.encode(&tx.assertion.signature),
            "authenticator_data": STANDARD.encode(&tx.assertion.authenticator_data),
            "client_data_json": STANDARD.encode(&tx.assertion.client_data_json),
        },
    }))
}

pub(crate) fn encode_transaction(tx: &Transaction) -> Result<String, SponsorError> {
    let bytes = bincode::serialize(tx)
        .map_err(|e| SponsorError::InvalidResponse(format!("serialize: {}", e)))?;
    Ok(STANDARD.encode(bytes))
}

pub(crate) fn decode_transaction(encoded: &str) -> Result<Transaction, SponsorError> {
    let bytes = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| SponsorError::InvalidResponse(format!("base64: {}", e)))?;
    bincode::deserialize(&bytes)
        .map_err(|e| SponsorError::InvalidResponse(format!("transaction: {}", e)))
}
