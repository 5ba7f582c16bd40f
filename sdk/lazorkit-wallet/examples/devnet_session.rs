// Example: Devnet configuration, wallet address derivation and session persistence
//
// This example demonstrates how to:
// 1. Build and validate a devnet configuration
// 2. Derive the smart wallet address for a passkey public key
// 3. Persist and restore a session record on disk
// 4. Prepare a USDC transfer paid for in USDC
//
// Nothing here talks to the network or prompts for a passkey.

use lazorkit_wallet::{
    advanced::builders::build_transfer, basic::session::SessionStore, derive_smart_wallet_address,
    CredentialId, FeeToken, FileStore, TokenMint, TransferIntent, WalletConfig, WalletSession,
};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 1. Configuration
    let config = WalletConfig::devnet().with_confirmation_timeout(Duration::from_secs(30));
    config.validate()?;

    println!("Devnet configuration:");
    println!("  RPC:      {}", config.rpc_endpoint);
    println!("  Portal:   {}", config.credential_portal_endpoint);
    println!("  Sponsor:  {}", config.sponsor_endpoint);
    println!("  Program:  {}", config.program_id);

    // 2. Address of the wallet controlled by a passkey.
    // A real public key comes from CredentialProvider::create_credential.
    let passkey_public_key = [0x02u8; 33];
    let wallet_address = derive_smart_wallet_address(&config.program_id, &passkey_public_key)?;
    println!("\nSmart wallet: {}", wallet_address);

    // 3. Session persistence
    let dir = std::env::temp_dir().join("lazorkit-wallet-example");
    let store = SessionStore::new(Arc::new(FileStore::open(&dir)?), config.storage_key.clone());

    let credential_id = CredentialId::new(b"example-credential".to_vec());
    let session = WalletSession::new(credential_id, wallet_address);
    store.save(&session)?;

    match store.load()? {
        Some(restored) => println!(
            "Restored session for {} (credential {}, created {})",
            restored.wallet_address(),
            restored.credential_id(),
            restored.created_at()
        ),
        None => println!("No session on disk"),
    }

    // 4. Transfer preparation
    let intent = TransferIntent::token(
        Pubkey::new_unique().to_string(),
        "1.25".parse()?,
        TokenMint::usdc_devnet(),
    )
    .with_fee_token(FeeToken::usdc_devnet());
    let prepared = build_transfer(&intent, &wallet_address)?;

    println!("\nPrepared USDC transfer:");
    for (i, ix) in prepared.instructions().iter().enumerate() {
        println!("  #{} program {} ({} accounts)", i, ix.program_id, ix.accounts.len());
    }

    // In a real application:
    // let wallet = PasskeyWallet::with_default_clients(config, provider, storage)?;
    // wallet.restore();
    // let receipt = wallet.sign_and_send_transaction(intent).await?;
    // println!("{}", receipt.explorer_url("devnet"));

    store.clear()?;
    Ok(())
}
