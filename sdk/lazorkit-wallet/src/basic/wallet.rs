use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::advanced::builders::build_transfer;
use crate::advanced::relay::{RelayClient, RelayResult};
use crate::basic::controller::ConnectionController;
use crate::basic::session::SessionStore;
use crate::config::WalletConfig;
use crate::core::connection::{LedgerRpc, RpcLedger};
use crate::core::signer::CredentialProvider;
use crate::core::sponsor::{FeeSponsor, HttpFeeSponsor};
use crate::core::storage::KeyValueStore;
use crate::error::{Result, WalletError};
use crate::types::{
    ConnectionState, DisconnectMode, PreparedTransaction, SendRequest, WalletSession,
};

/// Passkey smart wallet: the one entry point application code talks to.
///
/// Owns a single [`ConnectionController`] and a single [`RelayClient`].
pub struct PasskeyWallet {
    config: WalletConfig,
    controller: ConnectionController,
    relay: RelayClient,
}

impl PasskeyWallet {
    /// Assemble a wallet from explicit collaborators.
    ///
    /// # Errors
    /// `Validation` if `config` is incomplete or inconsistent.
    pub fn new(
        config: WalletConfig,
        provider: Arc<dyn CredentialProvider>,
        ledger: Arc<dyn LedgerRpc>,
        sponsor: Arc<dyn FeeSponsor>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        config.validate()?;

        let store = SessionStore::new(storage, config.storage_key.clone());
        let controller = ConnectionController::new(&config, provider.clone(), store);
        let relay = RelayClient::new(&config, provider, ledger, sponsor);

        Ok(Self {
            config,
            controller,
            relay,
        })
    }

    /// Wallet talking to the configured Solana RPC node and paymaster over HTTP.
    pub fn with_default_clients(
        config: WalletConfig,
        provider: Arc<dyn CredentialProvider>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        config.validate()?;

        let ledger = Arc::new(RpcLedger::new(config.rpc_endpoint.clone()));
        let sponsor = Arc::new(HttpFeeSponsor::new(config.sponsor_endpoint.clone())?);
        Self::new(config, provider, ledger, sponsor, storage)
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.controller.state().is_connected()
    }

    pub fn is_connecting(&self) -> bool {
        self.controller.state().is_connecting()
    }

    pub fn wallet_address(&self) -> Option<Pubkey> {
        self.controller.session().map(|s| *s.wallet_address())
    }

    pub fn session(&self) -> Option<WalletSession> {
        self.controller.session()
    }

    pub fn state(&self) -> ConnectionState {
        self.controller.state()
    }

    /// Receiver that always holds the latest state. Intermediate states may be skipped;
    /// use [`PasskeyWallet::on_state_change`] to observe every transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.controller.subscribe()
    }

    pub fn on_state_change<F>(&self, listener: F)
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.controller.on_state_change(listener)
    }

    /// Pick up the stored session without prompting. Call once at startup.
    pub fn restore(&self) -> Option<WalletSession> {
        self.controller.restore()
    }

    pub async fn connect(&self) -> Result<WalletSession> {
        self.controller.connect().await
    }

    pub fn disconnect(&self, mode: DisconnectMode) {
        self.controller.disconnect(mode)
    }

    /// Sign a transfer or raw instruction list with the passkey and relay it
    /// through the fee sponsor.
    ///
    /// Input is validated before any prompt or network call.
    pub async fn sign_and_send_transaction(&self, request: impl Into<SendRequest>) -> RelayResult {
        let session = self.controller.session().ok_or(WalletError::NotConnected)?;

        let prepared = match request.into() {
            SendRequest::Transfer(intent) => build_transfer(&intent, session.wallet_address())?,
            SendRequest::Instructions {
                instructions,
                fee_token,
            } => PreparedTransaction::from_instructions(instructions, fee_token)?,
        };

        let receipt = self.relay.send(&session, prepared).await?;
        info!(signature = %receipt.signature, "transaction sent");

        self.controller.record_use(&session);
        Ok(receipt)
    }
}
