//! Client-side session and transaction relay for LazorKit passkey smart wallets.
//!
//! The crate exposes:
//! - collaborator seams (`CredentialProvider`, `LedgerRpc`, `FeeSponsor`, `KeyValueStore`)
//!   with default RPC, HTTP sponsor and storage implementations,
//! - a versioned `SessionStore` and the `ConnectionController` state machine,
//! - transfer assembly (`build_transfer`) and the two-party `RelayClient`,
//! - the `PasskeyWallet` facade that application code depends on.

pub mod advanced;
pub mod basic;
pub mod config;
pub mod core;
pub mod error;
pub mod types;
pub mod utils;

pub use crate::advanced::builders::build_transfer;
pub use crate::advanced::relay::{RelayClient, RelayReceipt, RelayResult};
pub use crate::basic::controller::ConnectionController;
pub use crate::basic::session::SessionStore;
pub use crate::basic::wallet::PasskeyWallet;
pub use crate::config::WalletConfig;
pub use crate::core::connection::{LedgerError, LedgerRpc, RpcLedger, TxStatus};
pub use crate::core::signer::{
    CredentialAssertion, CredentialError, CredentialHandle, CredentialId, CredentialProvider,
};
pub use crate::core::sponsor::{
    FeeSponsor, HttpFeeSponsor, PartiallySignedTransaction, SponsorError,
};
pub use crate::core::storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use crate::error::{ErrorKind, Result, WalletError};
pub use crate::types::{
    Amount, ConnectionState, DisconnectMode, FeeToken, PreparedTransaction, SendRequest,
    TokenMint, TransferIntent, WalletSession,
};
pub use crate::utils::derive_smart_wallet_address;
