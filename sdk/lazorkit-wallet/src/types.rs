use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;

use crate::core::constants::{
    SESSION_SCHEMA_VERSION, TOKEN_PROGRAM_ID, USDC_DECIMALS, USDC_MINT_DEVNET,
};
use crate::core::signer::CredentialId;
use crate::error::{ErrorKind, Result, WalletError};

//=============================================================================
// Session
//=============================================================================

/// Durable identity record binding a passkey to its smart wallet.
///
/// `(credential_id, wallet_address)` never changes for the lifetime of the
/// record; only `last_used_at` moves, and only through [`WalletSession::touched`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSession {
    schema_version: u32,
    credential_id: CredentialId,
    #[serde(with = "pubkey_string")]
    wallet_address: Pubkey,
    created_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
}

impl WalletSession {
    /// Record for a credential that just completed its registration ceremony.
    pub fn new(credential_id: CredentialId, wallet_address: Pubkey) -> Self {
        let now = Utc::now();
        Self {
            schema_version: SESSION_SCHEMA_VERSION,
            credential_id,
            wallet_address,
            created_at: now,
            last_used_at: now,
        }
    }

    pub fn credential_id(&self) -> &CredentialId {
        &self.credential_id
    }

    pub fn wallet_address(&self) -> &Pubkey {
        &self.wallet_address
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_used_at(&self) -> DateTime<Utc> {
        self.last_used_at
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Time since the record was created
    pub fn age(&self) -> Duration {
        Utc::now() - self.created_at
    }

    /// Time since the last successful authentication
    pub fn idle_for(&self) -> Duration {
        Utc::now() - self.last_used_at
    }

    /// Same identity as `other`, ignoring timestamps
    pub fn same_identity(&self, other: &WalletSession) -> bool {
        self.credential_id == other.credential_id && self.wallet_address == other.wallet_address
    }

    /// Copy with `last_used_at` moved to `at`.
    pub fn touched(&self, at: DateTime<Utc>) -> Self {
        Self {
            last_used_at: at,
            ..self.clone()
        }
    }
}

mod pubkey_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

//=============================================================================
// Connection state
//=============================================================================

/// In-memory connection state. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected(WalletSession),
    /// Transient: published once after a failed connect, then reset to `Disconnected`
    Failed(ErrorKind),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    pub fn session(&self) -> Option<&WalletSession> {
        match self {
            Self::Connected(session) => Some(session),
            _ => None,
        }
    }
}

/// What `disconnect` does with the stored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectMode {
    /// Drop in-memory state only; the passkey session can be restored later
    #[default]
    KeepSession,
    /// Also delete the stored session record
    Purge,
}

impl DisconnectMode {
    pub fn purges(self) -> bool {
        self == Self::Purge
    }
}

//=============================================================================
// Amounts
//=============================================================================

/// Exact non-negative decimal amount in display units (SOL, USDC, ...).
///
/// Parsed from text so conversion to base units never goes through binary
/// floating point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount {
    whole: String,
    fraction: String,
}

impl Amount {
    /// Base integer units at `decimals` precision. Excess fractional digits
    /// are truncated, never rounded up.
    pub fn to_base_units(&self, decimals: u8) -> Result<u64> {
        let overflow = || WalletError::Validation(format!("amount {} is too large", self));

        let scale = 10u64
            .checked_pow(decimals as u32)
            .ok_or_else(overflow)?;
        let whole: u64 = if self.whole.is_empty() {
            0
        } else {
            self.whole.parse().map_err(|_| overflow())?
        };

        let kept: String = self.fraction.chars().take(decimals as usize).collect();
        let padded = format!("{:0<width$}", kept, width = decimals as usize);
        let fraction: u64 = if padded.is_empty() {
            0
        } else {
            padded.parse().map_err(|_| overflow())?
        };

        let units = whole
            .checked_mul(scale)
            .and_then(|v| v.checked_add(fraction))
            .ok_or_else(overflow)?;

        if units == 0 {
            return Err(WalletError::Validation(format!(
                "amount {} must be greater than zero at {} decimals",
                self, decimals
            )));
        }
        Ok(units)
    }
}

impl FromStr for Amount {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(WalletError::Validation("amount must be positive".into()));
        }

        let (whole, fraction) = match s.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (s, ""),
        };

        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction)
        {
            return Err(WalletError::Validation(format!("invalid amount: {:?}", s)));
        }

        Ok(Self {
            whole: whole.trim_start_matches('0').to_string(),
            fraction: fraction.trim_end_matches('0').to_string(),
        })
    }
}

impl TryFrom<f64> for Amount {
    type Error = WalletError;

    /// Uses the shortest decimal text that round-trips to `value`, so `0.29`
    /// converts as written instead of as `0.28999...`.
    fn try_from(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(WalletError::Validation("amount must be finite".into()));
        }
        if value <= 0.0 {
            return Err(WalletError::Validation("amount must be positive".into()));
        }
        format!("{}", value).parse()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = if self.whole.is_empty() { "0" } else { &self.whole };
        if self.fraction.is_empty() {
            write!(f, "{}", whole)
        } else {
            write!(f, "{}.{}", whole, self.fraction)
        }
    }
}

//=============================================================================
// Transfers
//=============================================================================

/// SPL token mint and its declared precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenMint {
    pub mint: Pubkey,
    pub decimals: u8,
    pub token_program: Pubkey,
}

impl TokenMint {
    pub fn new(mint: Pubkey, decimals: u8) -> Self {
        Self {
            mint,
            decimals,
            token_program: TOKEN_PROGRAM_ID,
        }
    }

    pub fn with_token_program(mut self, token_program: Pubkey) -> Self {
        self.token_program = token_program;
        self
    }

    pub fn usdc_devnet() -> Self {
        Self::new(USDC_MINT_DEVNET, USDC_DECIMALS)
    }
}

/// Who pays the network fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeeToken {
    /// The sponsor pays in native currency
    #[default]
    Sponsored,
    /// The sponsor fronts the fee and is repaid in this token
    Token(Pubkey),
}

impl FeeToken {
    pub fn usdc_devnet() -> Self {
        Self::Token(USDC_MINT_DEVNET)
    }
}

/// Caller-level description of a transfer. Validated by the builder before any signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferIntent {
    pub recipient: String,
    pub amount: Amount,
    pub token: Option<TokenMint>,
    pub fee_token: FeeToken,
}

impl TransferIntent {
    pub fn native(recipient: impl Into<String>, amount: Amount) -> Self {
        Self {
            recipient: recipient.into(),
            amount,
            token: None,
            fee_token: FeeToken::default(),
        }
    }

    pub fn token(recipient: impl Into<String>, amount: Amount, token: TokenMint) -> Self {
        Self {
            token: Some(token),
            ..Self::native(recipient, amount)
        }
    }

    pub fn with_fee_token(mut self, fee_token: FeeToken) -> Self {
        self.fee_token = fee_token;
        self
    }
}

/// Ordered instruction list ready for the relay. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
    instructions: Vec<Instruction>,
    fee_token: FeeToken,
}

impl PreparedTransaction {
    pub fn from_instructions(instructions: Vec<Instruction>, fee_token: FeeToken) -> Result<Self> {
        if instructions.is_empty() {
            return Err(WalletError::Validation(
                "transaction needs at least one instruction".into(),
            ));
        }
        Ok(Self {
            instructions,
            fee_token,
        })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn fee_token(&self) -> FeeToken {
        self.fee_token
    }
}

/// Input accepted by `PasskeyWallet::sign_and_send_transaction`.
#[derive(Debug, Clone)]
pub enum SendRequest {
    Transfer(TransferIntent),
    Instructions {
        instructions: Vec<Instruction>,
        fee_token: FeeToken,
    },
}

impl From<TransferIntent> for SendRequest {
    fn from(intent: TransferIntent) -> Self {
        Self::Transfer(intent)
    }
}

impl From<Vec<Instruction>> for SendRequest {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::Instructions {
            instructions,
            fee_token: FeeToken::default(),
        }
    }
}
