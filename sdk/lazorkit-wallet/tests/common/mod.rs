#![allow(dead_code)]

use async_trait::async_trait;
use lazorkit_wallet::{
    advanced::relay::RelayClient,
    core::constants::{ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID},
    derive_smart_wallet_address,
    utils::derive_associated_token_address,
    CredentialAssertion, CredentialError, CredentialHandle, CredentialId, CredentialProvider,
    FeeSponsor, KeyValueStore, LedgerError, LedgerRpc, MemoryStore, PartiallySignedTransaction,
    PasskeyWallet, SponsorError, StorageError, TxStatus, WalletConfig,
};
use parking_lot::Mutex;
use solana_sdk::{
    hash::Hash,
    instruction::InstructionError,
    pubkey::Pubkey,
    signature::Signature,
    system_program,
    transaction::{Transaction, TransactionError},
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub const PASSKEY_PUBLIC_KEY: [u8; 33] = [0x02; 33];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

//=============================================================================
// Credential provider
//=============================================================================

/// Parks a credential call until the test releases it.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

/// Authenticator with a single passkey and scripted failures.
pub struct ScriptedProvider {
    pub credential_id: CredentialId,
    pub public_key: Vec<u8>,
    create_failures: Mutex<VecDeque<CredentialError>>,
    sign_failures: Mutex<VecDeque<CredentialError>>,
    /// When set, assertions claim to come from this credential instead
    impostor: Mutex<Option<CredentialId>>,
    gate: Mutex<Option<Arc<Gate>>>,
    pub creates: AtomicUsize,
    pub signs: AtomicUsize,
    pub challenges: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            credential_id: CredentialId::from("c1"),
            public_key: PASSKEY_PUBLIC_KEY.to_vec(),
            create_failures: Mutex::new(VecDeque::new()),
            sign_failures: Mutex::new(VecDeque::new()),
            impostor: Mutex::new(None),
            gate: Mutex::new(None),
            creates: AtomicUsize::new(0),
            signs: AtomicUsize::new(0),
            challenges: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_next_create(&self, err: CredentialError) {
        self.create_failures.lock().push_back(err);
    }

    pub fn fail_next_sign(&self, err: CredentialError) {
        self.sign_failures.lock().push_back(err);
    }

    pub fn answer_as(&self, credential_id: CredentialId) {
        *self.impostor.lock() = Some(credential_id);
    }

    /// Hold every following credential call until `gate.release` is notified.
    pub fn gate(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn signs(&self) -> usize {
        self.signs.load(Ordering::SeqCst)
    }

    async fn wait_at_gate(&self) {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
    }
}

#[async_trait]
impl CredentialProvider for ScriptedProvider {
    async fn create_credential(
        &self,
        _portal_url: &str,
    ) -> Result<CredentialHandle, CredentialError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.wait_at_gate().await;

        if let Some(err) = self.create_failures.lock().pop_front() {
            return Err(err);
        }
        Ok(CredentialHandle {
            credential_id: self.credential_id.clone(),
            public_key: self.public_key.clone(),
        })
    }

    async fn sign(
        &self,
        _portal_url: &str,
        credential_id: &CredentialId,
        challenge: &[u8],
    ) -> Result<CredentialAssertion, CredentialError> {
        self.signs.fetch_add(1, Ordering::SeqCst);
        self.challenges.lock().push(challenge.to_vec());
        self.wait_at_gate().await;

        if let Some(err) = self.sign_failures.lock().pop_front() {
            return Err(err);
        }
        if credential_id != &self.credential_id {
            return Err(CredentialError::Unavailable("unknown credential".into()));
        }

        let answered_by = self
            .impostor
            .lock()
            .clone()
            .unwrap_or_else(|| credential_id.clone());
        Ok(CredentialAssertion {
            credential_id: answered_by,
            signature: vec![7; 64],
            authenticator_data: vec![1; 37],
            client_data_json: br#"{"type":"webauthn.get"}"#.to_vec(),
        })
    }
}

//=============================================================================
// Ledger simulator
//=============================================================================

#[derive(Default, Clone)]
struct Accounts {
    lamports: HashMap<Pubkey, u64>,
    /// token account address -> balance
    tokens: HashMap<Pubkey, u64>,
}

/// In-process ledger that executes system transfers, idempotent ATA creation
/// and checked token transfers.
pub struct SimLedger {
    blockhash: Hash,
    accounts: Mutex<Accounts>,
    statuses: Mutex<VecDeque<Result<TxStatus, LedgerError>>>,
    never_confirm: AtomicBool,
    hang_status: AtomicBool,
    pub submitted: Mutex<Vec<Transaction>>,
    pub accounts_created: AtomicUsize,
    pub status_queries: AtomicUsize,
}

impl SimLedger {
    pub fn new() -> Self {
        Self {
            blockhash: Hash::new_unique(),
            accounts: Mutex::new(Accounts::default()),
            statuses: Mutex::new(VecDeque::new()),
            never_confirm: AtomicBool::new(false),
            hang_status: AtomicBool::new(false),
            submitted: Mutex::new(Vec::new()),
            accounts_created: AtomicUsize::new(0),
            status_queries: AtomicUsize::new(0),
        }
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn fund(&self, owner: &Pubkey, lamports: u64) {
        *self.accounts.lock().lamports.entry(*owner).or_default() += lamports;
    }

    pub fn fund_token(&self, owner: &Pubkey, mint: &Pubkey, amount: u64) {
        let ata = derive_associated_token_address(owner, mint, &TOKEN_PROGRAM_ID);
        *self.accounts.lock().tokens.entry(ata).or_default() += amount;
    }

    pub fn lamports(&self, owner: &Pubkey) -> u64 {
        self.accounts.lock().lamports.get(owner).copied().unwrap_or(0)
    }

    pub fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Option<u64> {
        let ata = derive_associated_token_address(owner, mint, &TOKEN_PROGRAM_ID);
        self.accounts.lock().tokens.get(&ata).copied()
    }

    /// Statuses returned by the next `get_status` calls, before the default `Confirmed`.
    pub fn push_status(&self, status: Result<TxStatus, LedgerError>) {
        self.statuses.lock().push_back(status);
    }

    pub fn never_confirm(&self) {
        self.never_confirm.store(true, Ordering::SeqCst);
    }

    /// Status queries never answer, like an RPC node that accepted the
    /// connection and went silent.
    pub fn hang_status(&self) {
        self.hang_status.store(true, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> usize {
        self.submitted.lock().len()
    }

    fn execute(&self, tx: &Transaction) -> Result<(), TransactionError> {
        let mut accounts = self.accounts.lock();
        let mut next = accounts.clone();
        let message = &tx.message;

        for (index, ix) in message.instructions.iter().enumerate() {
            let index = index as u8;
            let program_id = message.account_keys[ix.program_id_index as usize];
            let keys: Vec<Pubkey> = ix
                .accounts
                .iter()
                .map(|i| message.account_keys[*i as usize])
                .collect();
            let fail = |err| TransactionError::InstructionError(index, err);

            let is_system_transfer = program_id == system_program::id()
                && ix.data.len() == 12
                && ix.data[..4] == 2u32.to_le_bytes();

            if is_system_transfer {
                let lamports = u64::from_le_bytes(ix.data[4..12].try_into().unwrap());
                let balance = next.lamports.get(&keys[0]).copied().unwrap_or(0);
                if balance < lamports {
                    // SystemError::ResultWithNegativeLamports
                    return Err(fail(InstructionError::Custom(1)));
                }
                next.lamports.insert(keys[0], balance - lamports);
                *next.lamports.entry(keys[1]).or_default() += lamports;
            } else if program_id == ASSOCIATED_TOKEN_PROGRAM_ID && ix.data == [1] {
                if !next.tokens.contains_key(&keys[1]) {
                    next.tokens.insert(keys[1], 0);
                    self.accounts_created.fetch_add(1, Ordering::SeqCst);
                }
            } else if program_id == TOKEN_PROGRAM_ID && ix.data.first() == Some(&12) {
                let amount = u64::from_le_bytes(ix.data[1..9].try_into().unwrap());
                let Some(balance) = next.tokens.get(&keys[0]).copied() else {
                    return Err(fail(InstructionError::UninitializedAccount));
                };
                if !next.tokens.contains_key(&keys[2]) {
                    return Err(fail(InstructionError::UninitializedAccount));
                }
                if balance < amount {
                    // TokenError::InsufficientFunds
                    return Err(fail(InstructionError::Custom(1)));
                }
                next.tokens.insert(keys[0], balance - amount);
                *next.tokens.entry(keys[2]).or_default() += amount;
            }
        }

        *accounts = next;
        Ok(())
    }
}

#[async_trait]
impl LedgerRpc for SimLedger {
    async fn get_latest_blockhash(&self) -> Result<Hash, LedgerError> {
        Ok(self.blockhash)
    }

    async fn submit(&self, tx: &Transaction) -> Result<Signature, LedgerError> {
        self.submitted.lock().push(tx.clone());
        self.execute(tx).map_err(LedgerError::Rejected)?;
        Ok(tx.signatures[0])
    }

    async fn get_status(&self, _signature: &Signature) -> Result<TxStatus, LedgerError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        if self.hang_status.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(status) = self.statuses.lock().pop_front() {
            return status;
        }
        if self.never_confirm.load(Ordering::SeqCst) {
            return Ok(TxStatus::Pending);
        }
        Ok(TxStatus::Confirmed)
    }
}

//=============================================================================
// Fee sponsor
//=============================================================================

/// Sponsor that records every request and signs with a fresh fee-payer signature.
pub struct RecordingSponsor {
    pub fee_payer: Pubkey,
    pub requests: Mutex<Vec<PartiallySignedTransaction>>,
    failures: Mutex<VecDeque<SponsorError>>,
    tamper: AtomicBool,
}

impl RecordingSponsor {
    pub fn new() -> Self {
        Self {
            fee_payer: Pubkey::new_unique(),
            requests: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            tamper: AtomicBool::new(false),
        }
    }

    pub fn fail_next(&self, err: SponsorError) {
        self.failures.lock().push_back(err);
    }

    /// Swap the blockhash before co-signing.
    pub fn tamper(&self) {
        self.tamper.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl FeeSponsor for RecordingSponsor {
    async fn fee_payer(&self) -> Result<Pubkey, SponsorError> {
        Ok(self.fee_payer)
    }

    async fn sponsor(&self, tx: PartiallySignedTransaction) -> Result<Transaction, SponsorError> {
        self.requests.lock().push(tx.clone());
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }

        let mut transaction = tx.transaction;
        if self.tamper.load(Ordering::SeqCst) {
            transaction.message.recent_blockhash = Hash::new_unique();
        }
        transaction.signatures[0] = Signature::new_unique();
        Ok(transaction)
    }
}

//=============================================================================
// Storage
//=============================================================================

/// Memory store whose reads or writes can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk unreadable".into()));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk full".into()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk full".into()));
        }
        self.inner.remove(key)
    }
}

//=============================================================================
// Test context
//=============================================================================

pub struct TestContext {
    pub config: WalletConfig,
    pub provider: Arc<ScriptedProvider>,
    pub ledger: Arc<SimLedger>,
    pub sponsor: Arc<RecordingSponsor>,
    pub storage: Arc<MemoryStore>,
}

impl TestContext {
    pub fn new() -> Self {
        init_tracing();
        Self {
            config: WalletConfig::devnet()
                .with_confirmation_timeout(Duration::from_secs(5))
                .with_poll_interval(Duration::from_millis(100)),
            provider: Arc::new(ScriptedProvider::new()),
            ledger: Arc::new(SimLedger::new()),
            sponsor: Arc::new(RecordingSponsor::new()),
            storage: Arc::new(MemoryStore::new()),
        }
    }

    /// A fresh wallet over the shared collaborators, as after a process restart.
    pub fn wallet(&self) -> PasskeyWallet {
        PasskeyWallet::new(
            self.config.clone(),
            self.provider.clone(),
            self.ledger.clone(),
            self.sponsor.clone(),
            self.storage.clone(),
        )
        .expect("valid test config")
    }

    /// Same as [`TestContext::wallet`] but persisting to `storage`.
    pub fn wallet_with_storage(&self, storage: Arc<dyn KeyValueStore>) -> PasskeyWallet {
        PasskeyWallet::new(
            self.config.clone(),
            self.provider.clone(),
            self.ledger.clone(),
            self.sponsor.clone(),
            storage,
        )
        .expect("valid test config")
    }

    pub fn relay(&self) -> RelayClient {
        RelayClient::new(
            &self.config,
            self.provider.clone(),
            self.ledger.clone(),
            self.sponsor.clone(),
        )
    }

    /// Wallet address of the scripted passkey.
    pub fn wallet_address(&self) -> Pubkey {
        derive_smart_wallet_address(&self.config.program_id, &PASSKEY_PUBLIC_KEY)
            .expect("valid passkey")
    }
}

pub fn setup_test_context() -> TestContext {
    TestContext::new()
}
