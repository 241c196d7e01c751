//! ICO Gateway
//!
//! Purchase-transaction orchestration for token sales priced on bonding
//! curves: admission control, price computation against the registry's
//! minted supply, payment validation through the ledger, token-transfer
//! issuance, and state commit, with well-defined failure points at each
//! step.
//!
//! # Components
//!
//! - [`IcoGateway`]: transport-agnostic operation surface
//!   (`buy_or_sell`, `get_ico_info`, `define_ico`, `get_discount`)
//! - [`PurchaseOrchestrator`]: the sequential purchase state machine
//! - [`LedgerService`]: seam to the blockchain RPC layer;
//!   [`JsonRpcLedger`] is the Solana JSON-RPC implementation
//! - [`GatewayConfig`]: environment configuration, fatal when invalid
//!
//! # Concurrency
//!
//! One request per task; ledger calls are the only suspension points.
//! Purchases of the same ICO are serialized from price computation
//! through commit (see `lib-registry`); different ICOs never contend.

pub mod config;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod ledger;
pub mod purchase;
pub mod rpc;
pub mod wire;

pub use config::GatewayConfig;
pub use errors::{ConfigError, GatewayError, GatewayResult, LedgerError, LedgerResult};
pub use events::{EventSink, GatewayEvent, LogSink};
pub use gateway::IcoGateway;
pub use ledger::LedgerService;
pub use purchase::{PurchaseOrchestrator, PurchaseReceipt, PurchaseRequest};
pub use rpc::JsonRpcLedger;
pub use wire::{IcoWallet, Pubkey};
