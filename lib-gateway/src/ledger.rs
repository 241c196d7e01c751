//! Ledger Service Seam
//!
//! The gateway's view of the blockchain: validate inbound payments,
//! issue outbound transfers, await finality, query balances. All calls
//! are network I/O with bounded timeouts; retries and backoff are the
//! implementation's concern, never the orchestrator's.

use async_trait::async_trait;

use lib_pricing::Decimal;

use crate::errors::LedgerResult;
use crate::wire::Pubkey;

/// Blockchain transaction/query operations consumed by the orchestrator.
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Validate a SOL payment transaction (buy path).
    ///
    /// The transaction must be a direct system-program transfer whose
    /// destination equals `expected_destination` and whose confirmed
    /// amount is at least `required`. This is a tolerance-free floor check;
    /// partial payments are rejected, not accepted at a discount.
    ///
    /// Returns the payer's wallet address.
    async fn validate_payment(
        &self,
        tx_ref: &str,
        expected_destination: &Pubkey,
        required: Decimal,
    ) -> LedgerResult<Pubkey>;

    /// Validate a token deposit transaction (sell path).
    ///
    /// The transaction must be an SPL `TransferChecked` of `mint` into
    /// `expected_destination` (the ICO's associated token account) for at
    /// least `required_amount` base units. Same rigor as
    /// [`validate_payment`](Self::validate_payment).
    ///
    /// Returns the seller's wallet address (the transfer authority).
    async fn validate_token_deposit(
        &self,
        tx_ref: &str,
        mint: &Pubkey,
        expected_destination: &Pubkey,
        required_amount: u64,
    ) -> LedgerResult<Pubkey>;

    /// Construct, sign (ICO wallet as sole signer), and submit a token
    /// transfer from the ICO's token account to the recipient's
    /// associated token account. Returns the transaction reference.
    async fn submit_token_transfer(
        &self,
        recipient: &Pubkey,
        mint: &Pubkey,
        amount: u64,
        decimals: u8,
    ) -> LedgerResult<String>;

    /// Submit a SOL transfer from the ICO wallet (sell payout).
    async fn submit_sol_transfer(&self, recipient: &Pubkey, lamports: u64) -> LedgerResult<String>;

    /// Poll until the transaction reaches a terminal on-chain status or
    /// the confirmation bound elapses. A timeout is a failure; the
    /// caller must never assume the transfer landed.
    async fn await_confirmation(&self, tx_ref: &str) -> LedgerResult<()>;

    /// Token balance of an account in base units.
    async fn get_token_balance(&self, account: &Pubkey) -> LedgerResult<u64>;
}
