use async_trait::async_trait;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, TransactionError};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Confirmation status of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed(TransactionError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger evaluated the transaction and refused it
    #[error("transaction rejected: {0}")]
    Rejected(TransactionError),

    /// The request never got an answer
    #[error("rpc transport error: {0}")]
    Transport(String),
}

/// Blockchain read/submit endpoint.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn get_latest_blockhash(&self) -> Result<Hash, LedgerError>;

    async fn submit(&self, tx: &Transaction) -> Result<Signature, LedgerError>;

    async fn get_status(&self, signature: &Signature) -> Result<TxStatus, LedgerError>;
}

/// `LedgerRpc` backed by a Solana JSON-RPC node.
pub struct RpcLedger {
    client: RpcClient,
}

impl RpcLedger {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self::with_client(RpcClient::new_with_commitment(
            rpc_url.into(),
            CommitmentConfig::confirmed(),
        ))
    }

    pub fn with_client(client: RpcClient) -> Self {
        Self { client }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

impl fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcLedger")
            .field("url", &self.client.url())
            .finish()
    }
}

/// Preflight failures carry the simulated `TransactionError`; keep it so the
/// relay can classify the rejection instead of reporting a bare transport error.
fn into_ledger_error(err: ClientError) -> LedgerError {
    match err.get_transaction_error() {
        Some(tx_err) => LedgerError::Rejected(tx_err),
        None => LedgerError::Transport(err.to_string()),
    }
}

#[async_trait]
impl LedgerRpc for RpcLedger {
    async fn get_latest_blockhash(&self) -> Result<Hash, LedgerError> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))
    }

    async fn submit(&self, tx: &Transaction) -> Result<Signature, LedgerError> {
        let signature = self
            .client
            .send_transaction(tx)
            .await
            .map_err(into_ledger_error)?;
        debug!(%signature, "transaction accepted by rpc node");
        Ok(signature)
    }

    async fn get_status(&self, signature: &Signature) -> Result<TxStatus, LedgerError> {
        let status = self
            .client
            .get_signature_status(signature)
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        Ok(match status {
            None => TxStatus::Pending,
            Some(Ok(())) => TxStatus::Confirmed,
            Some(Err(err)) => TxStatus::Failed(err),
        })
    }
}
