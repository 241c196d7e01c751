//! Purchase Orchestration
//!
//! The multi-step state machine behind `buy_or_sell`. Steps run in
//! order, never backward, and short-circuit on the first failure:
//!
//! 1. Rate check
//! 2. ICO lookup
//! 3. Sale-window check
//! 4. Input validation
//! 5. Price computation (under the per-ICO guard)
//! 6. Payment validation (buy) / token-deposit validation (sell)
//! 7. Token transfer issuance (buy) / SOL payout (sell)
//! 8. State commit through the guard held since step 5
//! 9. Receipt
//!
//! The guard from step 5 serializes compute-then-commit per ICO id, so
//! no purchase is priced against a supply another purchase is about to
//! invalidate. A commit failure after a confirmed on-chain transfer is
//! the one deliberate asymmetry: the transfer is irreversible, so the
//! orchestrator emits a divergence event and still reports success;
//! on-chain state is the source of truth, the local counter is a
//! pricing cache needing out-of-band repair.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, error};

use lib_admission::RateLimiter;
use lib_pricing::{total_cost, Quote};
use lib_registry::{IcoRecord, IcoRegistry, MintedGuard};

use crate::errors::{GatewayError, GatewayResult, LedgerError};
use crate::events::{EventSink, GatewayEvent};
use crate::ledger::LedgerService;
use crate::wire::{derive_associated_token_account, Pubkey};

/// Upper bound on a single request's token amount (overflow guard).
pub const MAX_TOKEN_AMOUNT: u64 = 1_000_000_000_000_000_000;

/// Upper bound on a transaction reference's length.
pub const MAX_TX_REF_LENGTH: usize = 200;

/// A buy or sell request.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub ico_id: String,
    /// Token amount in base units.
    pub amount: u64,
    /// Signature of the SOL payment (buy) or token deposit (sell).
    pub payment_reference: String,
    /// Client key for rate limiting.
    pub client_key: String,
    pub is_sell: bool,
}

/// Outcome of a completed purchase or sale.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub ico_id: String,
    pub is_sell: bool,
    /// Token amount in base units.
    pub amount: u64,
    pub token_symbol: String,
    pub token_decimals: u8,
    pub quote: Quote,
    /// Payer (buy) or seller (sell) wallet.
    pub counterparty: Pubkey,
    pub payment_reference: String,
    pub transfer_reference: String,
    /// New minted total, absent when the commit diverged.
    pub new_total_minted: Option<u64>,
    /// Set when on-chain state and the local counter diverged.
    pub needs_reconciliation: bool,
}

/// Drives the purchase state machine against the registry, rate limiter,
/// and ledger service.
pub struct PurchaseOrchestrator {
    registry: Arc<IcoRegistry>,
    limiter: Arc<RateLimiter>,
    ledger: Arc<dyn LedgerService>,
    events: Arc<dyn EventSink>,
    /// Wallet SOL payments must be sent to; sole signer of transfers.
    wallet_pubkey: Pubkey,
    /// Mint used when an ICO config does not name one.
    default_mint: Pubkey,
}

impl PurchaseOrchestrator {
    pub fn new(
        registry: Arc<IcoRegistry>,
        limiter: Arc<RateLimiter>,
        ledger: Arc<dyn LedgerService>,
        events: Arc<dyn EventSink>,
        wallet_pubkey: Pubkey,
        default_mint: Pubkey,
    ) -> Self {
        Self {
            registry,
            limiter,
            ledger,
            events,
            wallet_pubkey,
            default_mint,
        }
    }

    /// Execute a buy or sell to completion or its first terminal error.
    pub async fn execute(&self, request: &PurchaseRequest) -> GatewayResult<PurchaseReceipt> {
        let now = unix_now();

        // =====================================================================
        // Step 1: Rate check
        // =====================================================================
        if !self.limiter.admit(&request.client_key) {
            return Err(GatewayError::RateLimitExceeded(request.client_key.clone()));
        }

        // =====================================================================
        // Step 2: Lookup
        // =====================================================================
        let entry = self
            .registry
            .get(&request.ico_id)
            .ok_or_else(|| GatewayError::NotFound(request.ico_id.clone()))?;
        let record = entry.record();

        // =====================================================================
        // Step 3: Sale-window check
        // =====================================================================
        if !record.is_active_at(now) {
            return Err(GatewayError::InactiveIco {
                ico_id: request.ico_id.clone(),
                now,
                start: record.ico.start_time,
                end: record.ico.end_time,
            });
        }

        // =====================================================================
        // Step 4: Input validation
        // =====================================================================
        validate_input(request)?;

        // =====================================================================
        // Step 5: Price computation under the per-ICO guard
        // =====================================================================
        // The guard stays held through commit: the minted supply read here
        // cannot be invalidated by a concurrent purchase of the same ICO.
        let guard = self.registry.begin_purchase(&request.ico_id).await?;
        let minted = guard.minted();
        let quote = total_cost(
            entry.curve(),
            request.amount,
            record.token.decimals,
            minted,
            request.is_sell,
            record.sell_fee(),
        )?;
        debug!(
            ico_id = %request.ico_id,
            amount = request.amount,
            minted,
            price = %quote.price_per_token,
            net = %quote.net,
            is_sell = request.is_sell,
            "computed purchase quote"
        );

        if request.is_sell && minted < request.amount {
            return Err(GatewayError::InvalidInput(format!(
                "sell amount {} exceeds minted supply {minted}",
                request.amount
            )));
        }

        let mint = self.resolve_mint(record)?;

        if request.is_sell {
            self.execute_sell(request, record, guard, quote, mint).await
        } else {
            self.execute_buy(request, record, guard, quote, mint).await
        }
    }

    async fn execute_buy(
        &self,
        request: &PurchaseRequest,
        record: &IcoRecord,
        guard: MintedGuard,
        quote: Quote,
        mint: Pubkey,
    ) -> GatewayResult<PurchaseReceipt> {
        // =====================================================================
        // Step 6: Payment validation
        // =====================================================================
        let payer = self
            .ledger
            .validate_payment(&request.payment_reference, &self.wallet_pubkey, quote.net)
            .await
            .map_err(map_validation_error)?;

        // =====================================================================
        // Step 7: Token transfer issuance
        // =====================================================================
        let transfer_reference = self
            .ledger
            .submit_token_transfer(&payer, &mint, request.amount, record.token.decimals)
            .await
            .map_err(map_transfer_error)?;
        self.ledger
            .await_confirmation(&transfer_reference)
            .await
            .map_err(map_transfer_error)?;

        // =====================================================================
        // Step 8: State commit
        // =====================================================================
        let (new_total_minted, needs_reconciliation) =
            self.commit(guard, request, &transfer_reference);

        self.events.emit(GatewayEvent::TokensPurchased {
            ico_id: request.ico_id.clone(),
            buyer: payer,
            amount: request.amount,
            cost_sol: quote.net,
            payment_ref: request.payment_reference.clone(),
            transfer_ref: transfer_reference.clone(),
        });

        Ok(PurchaseReceipt {
            ico_id: request.ico_id.clone(),
            is_sell: false,
            amount: request.amount,
            token_symbol: record.token.symbol.clone(),
            token_decimals: record.token.decimals,
            quote,
            counterparty: payer,
            payment_reference: request.payment_reference.clone(),
            transfer_reference,
            new_total_minted,
            needs_reconciliation,
        })
    }

    async fn execute_sell(
        &self,
        request: &PurchaseRequest,
        record: &IcoRecord,
        guard: MintedGuard,
        quote: Quote,
        mint: Pubkey,
    ) -> GatewayResult<PurchaseReceipt> {
        // =====================================================================
        // Step 6: Token deposit validation
        // =====================================================================
        // The inbound transfer must land in the ICO's associated token
        // account for this mint, with the same rigor as the buy-path
        // payment check.
        let ico_token_account = derive_associated_token_account(&self.wallet_pubkey, &mint)
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        let seller = self
            .ledger
            .validate_token_deposit(
                &request.payment_reference,
                &mint,
                &ico_token_account,
                request.amount,
            )
            .await
            .map_err(map_validation_error)?;

        // =====================================================================
        // Step 7: SOL payout, net of fee
        // =====================================================================
        let lamports = quote.net.to_lamports_floor().unwrap_or(0);
        let transfer_reference = self
            .ledger
            .submit_sol_transfer(&seller, lamports)
            .await
            .map_err(map_transfer_error)?;
        self.ledger
            .await_confirmation(&transfer_reference)
            .await
            .map_err(map_transfer_error)?;

        // =====================================================================
        // Step 8: State commit (decrement)
        // =====================================================================
        let (new_total_minted, needs_reconciliation) =
            self.commit(guard, request, &transfer_reference);

        self.events.emit(GatewayEvent::TokensSold {
            ico_id: request.ico_id.clone(),
            seller,
            amount: request.amount,
            proceeds_sol: quote.net,
            deposit_ref: request.payment_reference.clone(),
            transfer_ref: transfer_reference.clone(),
        });

        Ok(PurchaseReceipt {
            ico_id: request.ico_id.clone(),
            is_sell: true,
            amount: request.amount,
            token_symbol: record.token.symbol.clone(),
            token_decimals: record.token.decimals,
            quote,
            counterparty: seller,
            payment_reference: request.payment_reference.clone(),
            transfer_reference,
            new_total_minted,
            needs_reconciliation,
        })
    }

    /// Commit the counter movement for a confirmed transfer.
    ///
    /// Never rolls the transfer back on failure: it emits a divergence
    /// event and lets the request succeed with a reconciliation note.
    fn commit(
        &self,
        guard: MintedGuard,
        request: &PurchaseRequest,
        transfer_reference: &str,
    ) -> (Option<u64>, bool) {
        let result = if request.is_sell {
            guard.commit_sell(request.amount)
        } else {
            guard.commit_buy(request.amount)
        };
        match result {
            Ok(total) => (Some(total), false),
            Err(err) => {
                error!(
                    ico_id = %request.ico_id,
                    amount = request.amount,
                    transfer_ref = %transfer_reference,
                    %err,
                    "minted-counter commit failed after confirmed on-chain transfer"
                );
                self.events.emit(GatewayEvent::AccountingDivergence {
                    ico_id: request.ico_id.clone(),
                    amount: request.amount,
                    transfer_ref: transfer_reference.to_string(),
                    is_sell: request.is_sell,
                });
                (None, true)
            }
        }
    }

    fn resolve_mint(&self, record: &IcoRecord) -> GatewayResult<Pubkey> {
        match record.token.token_address.as_deref() {
            Some(text) => Pubkey::from_base58(text).map_err(|e| {
                error!(ico_id = record.id(), %e, "invalid token_address in ICO config");
                GatewayError::Internal(format!("invalid token_address for {}", record.id()))
            }),
            None => Ok(self.default_mint),
        }
    }
}

fn validate_input(request: &PurchaseRequest) -> GatewayResult<()> {
    if request.amount == 0 {
        return Err(GatewayError::InvalidInput(
            "amount must be a positive integer".to_string(),
        ));
    }
    if request.amount > MAX_TOKEN_AMOUNT {
        return Err(GatewayError::InvalidInput("amount is too large".to_string()));
    }
    if request.payment_reference.is_empty() {
        return Err(GatewayError::InvalidInput(
            "payment transaction reference must not be empty".to_string(),
        ));
    }
    if request.payment_reference.len() > MAX_TX_REF_LENGTH {
        return Err(GatewayError::InvalidInput(
            "payment transaction reference is too long".to_string(),
        ));
    }
    if request.client_key.is_empty() {
        return Err(GatewayError::InvalidInput(
            "client key must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Map a ledger failure during step 6 to its terminal kind. Transport
/// and shape problems while validating count as invalid transactions,
/// never as payment shortfalls.
fn map_validation_error(err: LedgerError) -> GatewayError {
    match err {
        LedgerError::InsufficientPayment { required, received } => {
            GatewayError::InsufficientFunds {
                required: format!("{required} SOL"),
                received: format!("{received} SOL"),
            }
        }
        LedgerError::InsufficientDeposit { required, received } => {
            GatewayError::InsufficientFunds {
                required: format!("{required} base units"),
                received: format!("{received} base units"),
            }
        }
        LedgerError::InvalidTransaction(reason) => GatewayError::InvalidTransaction(reason),
        other => GatewayError::InvalidTransaction(other.to_string()),
    }
}

/// Map a ledger failure during step 7 (submission or confirmation,
/// including timeout) to `TransactionFailed`.
fn map_transfer_error(err: LedgerError) -> GatewayError {
    GatewayError::TransactionFailed(err.to_string())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
