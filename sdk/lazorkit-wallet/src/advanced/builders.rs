use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::advanced::instructions;
use crate::core::constants::NATIVE_DECIMALS;
use crate::error::Result;
use crate::types::{PreparedTransaction, TransferIntent};
use crate::utils::{derive_associated_token_address, parse_address};

/// Turn a transfer intent into an ordered instruction list sent from `sender`.
///
/// Validation happens here, before anything is signed:
/// * the recipient must be a valid base58 address
/// * the amount must be non-zero at the asset's precision (extra digits are truncated)
///
/// Token transfers are preceded by an idempotent create of the recipient's
/// associated token account, so a first-time recipient needs no setup.
pub fn build_transfer(intent: &TransferIntent, sender: &Pubkey) -> Result<PreparedTransaction> {
    let recipient = parse_address(&intent.recipient)?;

    let instructions = match &intent.token {
        None => {
            let lamports = intent.amount.to_base_units(NATIVE_DECIMALS)?;
            debug!(%recipient, lamports, "building native transfer");
            vec![instructions::transfer_native(sender, &recipient, lamports)]
        },
        Some(token) => {
            let amount = intent.amount.to_base_units(token.decimals)?;
            let source =
                derive_associated_token_address(sender, &token.mint, &token.token_program);
            let destination =
                derive_associated_token_address(&recipient, &token.mint, &token.token_program);
            debug!(%recipient, mint = %token.mint, amount, "building token transfer");

            vec![
                instructions::create_associated_token_account_idempotent(
                    sender,
                    &recipient,
                    &token.mint,
                    &token.token_program,
                ),
                instructions::transfer_checked(
                    &source,
                    &token.mint,
                    &destination,
                    sender,
                    amount,
                    token.decimals,
                    &token.token_program,
                ),
            ]
        },
    };

    PreparedTransaction::from_instructions(instructions, intent.fee_token)
}
