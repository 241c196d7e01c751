//! Gateway Events
//!
//! Structured events emitted by the purchase orchestrator. The
//! divergence event is the reconciliation hook for the one deliberately
//! asymmetric failure: a local commit failing after an irreversible
//! on-chain transfer.

use lib_pricing::Decimal;
use tracing::{error, info};

use crate::wire::Pubkey;

/// Events emitted during gateway operation.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A buy completed: payment validated, tokens transferred, counter
    /// committed.
    TokensPurchased {
        ico_id: String,
        buyer: Pubkey,
        amount: u64,
        cost_sol: Decimal,
        payment_ref: String,
        transfer_ref: String,
    },
    /// A sell completed: deposit validated, SOL paid out, counter
    /// committed.
    TokensSold {
        ico_id: String,
        seller: Pubkey,
        amount: u64,
        proceeds_sol: Decimal,
        deposit_ref: String,
        transfer_ref: String,
    },
    /// The on-chain transfer confirmed but the local minted counter
    /// could not be committed. On-chain state is the source of truth;
    /// the counter needs out-of-band repair.
    AccountingDivergence {
        ico_id: String,
        amount: u64,
        transfer_ref: String,
        is_sell: bool,
    },
}

/// Receiver for gateway events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: GatewayEvent);
}

/// Default sink: records events through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: GatewayEvent) {
        match &event {
            GatewayEvent::TokensPurchased {
                ico_id,
                buyer,
                amount,
                cost_sol,
                transfer_ref,
                ..
            } => {
                info!(
                    ico_id = %ico_id,
                    buyer = %buyer,
                    amount,
                    cost_sol = %cost_sol,
                    transfer_ref = %transfer_ref,
                    "tokens purchased"
                );
            }
            GatewayEvent::TokensSold {
                ico_id,
                seller,
                amount,
                proceeds_sol,
                transfer_ref,
                ..
            } => {
                info!(
                    ico_id = %ico_id,
                    seller = %seller,
                    amount,
                    proceeds_sol = %proceeds_sol,
                    transfer_ref = %transfer_ref,
                    "tokens sold"
                );
            }
            GatewayEvent::AccountingDivergence {
                ico_id,
                amount,
                transfer_ref,
                is_sell,
            } => {
                error!(
                    ico_id = %ico_id,
                    amount,
                    transfer_ref = %transfer_ref,
                    is_sell,
                    "minted counter diverged from on-chain state, reconciliation needed"
                );
            }
        }
    }
}
