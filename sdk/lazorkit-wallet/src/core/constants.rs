use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

// Default Program ID for Devnet/Testnet
pub const DEFAULT_PROGRAM_ID: Pubkey = pubkey!("LazorKit11111111111111111111111111111111111");

pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Circle's USDC mint on Devnet
pub const USDC_MINT_DEVNET: Pubkey = pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU");
pub const USDC_MINT_MAINNET: Pubkey = pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
pub const USDC_DECIMALS: u8 = 6;

/// Lamports per SOL = 10^9
pub const NATIVE_DECIMALS: u8 = 9;

// Public test network endpoints. Not for production use.
pub const DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";
pub const DEVNET_PORTAL_URL: &str = "https://portal.lazor.sh";
pub const DEVNET_PAYMASTER_URL: &str = "https://kora.devnet.lazorkit.com";

pub const SESSION_STORAGE_KEY: &str = "lazorkit:wallet-session";
pub const SESSION_SCHEMA_VERSION: u32 = 1;

/// Domain separator for deriving a wallet id from a passkey public key
pub const PASSKEY_WALLET_SEED: &[u8] = b"lazorkit-passkey";

/// Compressed Secp256r1 public key length
pub const SECP256R1_PUBKEY_LEN: usize = 33;
