//! Two-party signing relay.
//!
//! A send runs four strictly ordered steps: passkey signature over the
//! compiled message, sponsor co-signature as fee payer, submission, then
//! confirmation polling. The message is compiled once and its bytes are
//! never changed after the passkey signs them.

use parking_lot::Mutex;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::InstructionError;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, TransactionError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::WalletConfig;
use crate::core::connection::{LedgerError, LedgerRpc, TxStatus};
use crate::core::signer::{CredentialAssertion, CredentialProvider};
use crate::core::sponsor::{FeeSponsor, PartiallySignedTransaction};
use crate::error::{Result, WalletError};
use crate::types::{FeeToken, PreparedTransaction, WalletSession};
use crate::utils;

/// SPL Token `InsufficientFunds`
const TOKEN_ERR_INSUFFICIENT_FUNDS: u32 = 1;
/// SPL Token `MintMismatch`
const TOKEN_ERR_MINT_MISMATCH: u32 = 3;
/// SPL Token `OwnerMismatch`
const TOKEN_ERR_OWNER_MISMATCH: u32 = 4;

/// Confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReceipt {
    pub signature: Signature,
    pub fee_payer: Pubkey,
    pub fee_token: FeeToken,
}

impl RelayReceipt {
    pub fn explorer_url(&self, cluster: &str) -> String {
        utils::explorer_url(&self.signature, cluster)
    }
}

pub type RelayResult = Result<RelayReceipt>;

/// Drives sends for any number of wallet sessions, at most one at a time per wallet.
pub struct RelayClient {
    provider: Arc<dyn CredentialProvider>,
    ledger: Arc<dyn LedgerRpc>,
    sponsor: Arc<dyn FeeSponsor>,
    portal_url: String,
    confirmation_timeout: Duration,
    poll_interval: Duration,
    in_flight: Mutex<HashSet<Pubkey>>,
}

/// Releases the wallet's in-flight slot on every exit path.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<Pubkey>>,
    wallet: Pubkey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.wallet);
    }
}

impl RelayClient {
    pub fn new(
        config: &WalletConfig,
        provider: Arc<dyn CredentialProvider>,
        ledger: Arc<dyn LedgerRpc>,
        sponsor: Arc<dyn FeeSponsor>,
    ) -> Self {
        Self {
            provider,
            ledger,
            sponsor,
            portal_url: config.credential_portal_endpoint.clone(),
            confirmation_timeout: config.confirmation_timeout,
            poll_interval: config.poll_interval,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// True while a send for `wallet` is outstanding.
    pub fn is_sending(&self, wallet: &Pubkey) -> bool {
        self.in_flight.lock().contains(wallet)
    }

    fn acquire(&self, wallet: Pubkey) -> Result<InFlightGuard<'_>> {
        if !self.in_flight.lock().insert(wallet) {
            return Err(WalletError::AlreadyInProgress);
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            wallet,
        })
    }

    /// Sign, co-sign, submit and confirm `prepared` on behalf of `session`.
    ///
    /// A second call for the same wallet while one is outstanding fails with
    /// `AlreadyInProgress` without touching any collaborator.
    pub async fn send(
        &self,
        session: &WalletSession,
        prepared: PreparedTransaction,
    ) -> RelayResult {
        let wallet = *session.wallet_address();
        let _guard = self.acquire(wallet)?;

        let fee_token = prepared.fee_token();
        let (fee_payer, blockhash) = self.prepare().await?;
        let message = Message::new_with_blockhash(
            prepared.instructions(),
            Some(&fee_payer),
            &blockhash,
        );
        let message_bytes = message.serialize();
        info!(
            %wallet,
            %fee_payer,
            instructions = prepared.instructions().len(),
            "relaying transaction"
        );

        // 1. passkey signature over the exact message bytes
        let assertion = self.sign(session, &message_bytes).await?;

        // 2. sponsor co-signature
        let transaction = self
            .sponsor
            .sponsor(PartiallySignedTransaction {
                transaction: Transaction::new_unsigned(message),
                assertion,
                fee_token,
            })
            .await?;
        if transaction.message_data() != message_bytes {
            return Err(WalletError::SponsorUnavailable(
                "sponsor returned a different message than the one signed".into(),
            ));
        }

        // 3. submission
        let signature = self
            .ledger
            .submit(&transaction)
            .await
            .map_err(classify_submission)?;
        debug!(%signature, "transaction submitted");

        // 4. confirmation
        self.confirm(signature).await?;
        info!(%signature, "transaction confirmed");

        Ok(RelayReceipt {
            signature,
            fee_payer,
            fee_token,
        })
    }

    async fn prepare(&self) -> Result<(Pubkey, Hash)> {
        let fee_payer = self.sponsor.fee_payer().await?;
        let blockhash = self
            .ledger
            .get_latest_blockhash()
            .await
            .map_err(|e| WalletError::SubmissionFailed(e.to_string()))?;
        Ok((fee_payer, blockhash))
    }

    async fn sign(&self, session: &WalletSession, message: &[u8]) -> Result<CredentialAssertion> {
        let assertion = self
            .provider
            .sign(&self.portal_url, session.credential_id(), message)
            .await?;

        if &assertion.credential_id != session.credential_id() {
            return Err(WalletError::CredentialUnavailable(format!(
                "assertion came from credential {} instead of {}",
                assertion.credential_id,
                session.credential_id()
            )));
        }
        Ok(assertion)
    }

    async fn confirm(&self, signature: Signature) -> Result<()> {
        let deadline = Instant::now() + self.confirmation_timeout;
        let timed_out = || {
            warn!(%signature, "confirmation deadline reached");
            WalletError::Timeout { signature }
        };

        loop {
            let status = timeout_at(deadline, self.ledger.get_status(&signature))
                .await
                .map_err(|_| timed_out())?;

            match status {
                Ok(TxStatus::Confirmed) => return Ok(()),
                Ok(TxStatus::Failed(err)) => return Err(classify_failure(signature, err)),
                Ok(TxStatus::Pending) => {},
                Err(err) => warn!(%signature, error = %err, "status query failed, still polling"),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(timed_out());
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

enum Rejection {
    InsufficientFunds,
    InvalidAccount,
    Other,
}

fn rejection_of(err: &TransactionError) -> Rejection {
    use TransactionError as T;

    match err {
        T::InsufficientFundsForFee | T::InsufficientFundsForRent { .. } => {
            Rejection::InsufficientFunds
        },
        T::AccountNotFound
        | T::InvalidAccountForFee
        | T::ProgramAccountNotFound
        | T::InvalidAccountIndex => Rejection::InvalidAccount,
        T::InstructionError(_, ix_err) => match ix_err {
            InstructionError::InsufficientFunds
            | InstructionError::Custom(TOKEN_ERR_INSUFFICIENT_FUNDS) => {
                Rejection::InsufficientFunds
            },
            InstructionError::InvalidAccountData
            | InstructionError::InvalidAccountOwner
            | InstructionError::UninitializedAccount
            | InstructionError::Custom(TOKEN_ERR_MINT_MISMATCH)
            | InstructionError::Custom(TOKEN_ERR_OWNER_MISMATCH) => Rejection::InvalidAccount,
            _ => Rejection::Other,
        },
        _ => Rejection::Other,
    }
}

/// Map a step-3 failure onto the error taxonomy.
pub fn classify_submission(err: LedgerError) -> WalletError {
    match err {
        LedgerError::Transport(reason) => WalletError::SubmissionFailed(reason),
        LedgerError::Rejected(tx_err) => match rejection_of(&tx_err) {
            Rejection::InsufficientFunds => WalletError::InsufficientFunds(tx_err.to_string()),
            Rejection::InvalidAccount => WalletError::InvalidAccount(tx_err.to_string()),
            Rejection::Other => WalletError::SubmissionFailed(tx_err.to_string()),
        },
    }
}

/// Map an on-chain failure observed while polling.
pub fn classify_failure(signature: Signature, err: TransactionError) -> WalletError {
    match rejection_of(&err) {
        Rejection::InsufficientFunds => WalletError::InsufficientFunds(err.to_string()),
        Rejection::InvalidAccount => WalletError::InvalidAccount(err.to_string()),
        Rejection::Other => WalletError::TransactionFailed {
            signature,
            reason: err.to_string(),
        },
    }
}
