use solana_sdk::signature::Signature;
use thiserror::Error;

/// Error type for wallet session and relay operations.
///
/// Every failure path of `connect`, `sign_and_send_transaction` and the relay
/// protocol ends in exactly one of these variants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    /// Malformed recipient, non-positive amount, bad configuration
    #[error("Validation error: {0}")]
    Validation(String),

    /// The biometric prompt was dismissed
    #[error("User cancelled the passkey prompt")]
    UserCancelled,

    /// Platform lacks passkey support or the credential is missing
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    /// Persisted session could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Fee sponsor could not co-sign the transaction
    #[error("Fee sponsor unavailable: {0}")]
    SponsorUnavailable(String),

    /// On-chain rejection for lack of funds
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// On-chain rejection for a missing or mismatched account
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Ledger refused the transaction for any other reason
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    /// The transaction landed but failed
    #[error("Transaction {signature} failed: {reason}")]
    TransactionFailed { signature: Signature, reason: String },

    /// Confirmation was not observed before the deadline; the outcome is unknown
    #[error("Timed out waiting for confirmation of {signature}")]
    Timeout { signature: Signature },

    /// Another send is outstanding for this wallet session
    #[error("A transaction is already in progress for this wallet")]
    AlreadyInProgress,

    /// No connected session to sign with
    #[error("Wallet is not connected")]
    NotConnected,
}

/// Discriminant of [`WalletError`], used where only the class of failure matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    UserCancelled,
    CredentialUnavailable,
    Storage,
    SponsorUnavailable,
    InsufficientFunds,
    InvalidAccount,
    SubmissionFailed,
    TransactionFailed,
    Timeout,
    AlreadyInProgress,
    NotConnected,
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::UserCancelled => ErrorKind::UserCancelled,
            Self::CredentialUnavailable(_) => ErrorKind::CredentialUnavailable,
            Self::Storage(_) => ErrorKind::Storage,
            Self::SponsorUnavailable(_) => ErrorKind::SponsorUnavailable,
            Self::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            Self::InvalidAccount(_) => ErrorKind::InvalidAccount,
            Self::SubmissionFailed(_) => ErrorKind::SubmissionFailed,
            Self::TransactionFailed { .. } => ErrorKind::TransactionFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::AlreadyInProgress => ErrorKind::AlreadyInProgress,
            Self::NotConnected => ErrorKind::NotConnected,
        }
    }

    /// Whether the caller may retry the same request.
    ///
    /// A `Timeout` is retryable only in the sense of re-checking the returned
    /// signature; resending could double-spend.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SponsorUnavailable(_) | Self::Timeout { .. })
    }

    /// Signature of the submitted transaction, when the failure happened after step 3.
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Self::TransactionFailed { signature, .. } | Self::Timeout { signature } => {
                Some(signature)
            },
            _ => None,
        }
    }

    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Check the recipient and amount",
            Self::UserCancelled => "Cancelled",
            Self::CredentialUnavailable(_) => "Passkey not available on this device",
            Self::Storage(_) => "Could not access saved session",
            Self::SponsorUnavailable(_) => "Fee sponsor unavailable, try again",
            Self::InsufficientFunds(_) => "Insufficient balance",
            Self::InvalidAccount(_) => "Account not found for this token",
            Self::SubmissionFailed(_) | Self::TransactionFailed { .. } => "Transaction failed",
            Self::Timeout { .. } => "Transaction pending, check status later",
            Self::AlreadyInProgress => "A transaction is already in progress",
            Self::NotConnected => "Connect your wallet first",
        }
    }
}

/// Result type alias for wallet operations
pub type Result<T> = std::result::Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(WalletError::UserCancelled.kind(), ErrorKind::UserCancelled);
        assert_eq!(
            WalletError::Timeout {
                signature: Signature::default()
            }
            .kind(),
            ErrorKind::Timeout
        );
        assert_eq!(WalletError::NotConnected.kind(), ErrorKind::NotConnected);
    }

    #[test]
    fn test_retry_hints() {
        assert!(WalletError::SponsorUnavailable("503".into()).is_retryable());
        assert!(!WalletError::UserCancelled.is_retryable());
        assert!(!WalletError::InsufficientFunds("0x1".into()).is_retryable());
    }

    #[test]
    fn test_signature_only_after_submission() {
        let sig = Signature::from([7u8; 64]);
        assert_eq!(
            WalletError::Timeout { signature: sig }.signature(),
            Some(&sig)
        );
        assert_eq!(WalletError::AlreadyInProgress.signature(), None);
    }
}
