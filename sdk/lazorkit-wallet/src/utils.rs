use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::str::FromStr;

use crate::core::constants::{
    ASSOCIATED_TOKEN_PROGRAM_ID, PASSKEY_WALLET_SEED, SECP256R1_PUBKEY_LEN,
};
use crate::error::{Result, WalletError};

//=============================================================================
// PDA Derivation Helpers
//=============================================================================

/// Derive the Config PDA from program ID and wallet ID
pub fn derive_config_pda(program_id: &Pubkey, wallet_id: &[u8; 32]) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"lazorkit", wallet_id], program_id)
}

/// Derive the Vault PDA from program ID and config PDA
pub fn derive_vault_pda(program_id: &Pubkey, config_pda: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[b"lazorkit-wallet-address", config_pda.as_ref()],
        program_id,
    )
}

/// Wallet ID for a passkey: `sha256(PASSKEY_WALLET_SEED || compressed_pubkey)`
pub fn passkey_wallet_id(public_key: &[u8]) -> Result<[u8; 32]> {
    if public_key.len() != SECP256R1_PUBKEY_LEN {
        return Err(WalletError::CredentialUnavailable(format!(
            "invalid Secp256r1 key length {} (expected {})",
            public_key.len(),
            SECP256R1_PUBKEY_LEN
        )));
    }

    let mut hasher = Sha256::new();
    hasher.update(PASSKEY_WALLET_SEED);
    hasher.update(public_key);
    Ok(hasher.finalize().into())
}

/// Smart-wallet (vault) address controlled by the passkey with `public_key`.
///
/// Deterministic: the same passkey always maps to the same wallet.
pub fn derive_smart_wallet_address(program_id: &Pubkey, public_key: &[u8]) -> Result<Pubkey> {
    let wallet_id = passkey_wallet_id(public_key)?;
    let (config_pda, _) = derive_config_pda(program_id, &wallet_id);
    let (vault_pda, _) = derive_vault_pda(program_id, &config_pda);
    Ok(vault_pda)
}

/// Associated token account for `(owner, mint)`. Owners may be PDAs.
pub fn derive_associated_token_address(
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

//=============================================================================
// Address & Explorer Helpers
//=============================================================================

/// Parse a base58 address, mapping failure to a validation error
pub fn parse_address(address: &str) -> Result<Pubkey> {
    Pubkey::from_str(address.trim())
        .map_err(|_| WalletError::Validation(format!("invalid address: {:?}", address)))
}

/// Solana Explorer link for a transaction on `cluster` (`"devnet"`, `"mainnet-beta"`, ...)
pub fn explorer_url(signature: &Signature, cluster: &str) -> String {
    if cluster == "mainnet-beta" || cluster == "mainnet" {
        format!("https://explorer.solana.com/tx/{}", signature)
    } else {
        format!(
            "https://explorer.solana.com/tx/{}?cluster={}",
            signature, cluster
        )
    }
}
