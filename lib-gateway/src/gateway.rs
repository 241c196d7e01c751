//! Gateway Operation Surface
//!
//! Transport-agnostic operations: buy/sell, ICO info, ICO definition,
//! and the holder discount. Front ends (HTTP, MCP, CLI) sit on top of
//! this type and render [`crate::errors::GatewayError::user_message`]
//! for failures.

use std::sync::Arc;

use tracing::{info, warn};

use lib_admission::RateLimiter;
use lib_registry::{ConfigStore, IcoRecord, IcoRegistry};

use crate::config::GatewayConfig;
use crate::errors::{ConfigError, GatewayError, GatewayResult};
use crate::events::{EventSink, LogSink};
use crate::ledger::LedgerService;
use crate::purchase::{PurchaseOrchestrator, PurchaseReceipt, PurchaseRequest, MAX_TOKEN_AMOUNT};
use crate::rpc::JsonRpcLedger;

/// Whole tokens per discount tier.
const DISCOUNT_TIER_TOKENS: u64 = 1_000;

/// Discount percent per tier.
const DISCOUNT_PERCENT_PER_TIER: u64 = 1;

/// Discount percent cap.
const MAX_DISCOUNT_PERCENT: u64 = 10;

/// Maximum accepted size of an ICO definition document.
const MAX_CONFIG_JSON_BYTES: usize = 10_000;

/// The ICO gateway: registry, admission control, and orchestration
/// behind a transport-agnostic operation surface.
pub struct IcoGateway {
    registry: Arc<IcoRegistry>,
    store: ConfigStore,
    orchestrator: PurchaseOrchestrator,
}

impl IcoGateway {
    /// Build a gateway talking to the configured JSON-RPC endpoint.
    pub fn new(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let ledger = JsonRpcLedger::new(config.rpc_endpoint.as_str(), config.wallet())?;
        Self::with_ledger(config, Arc::new(ledger), Arc::new(LogSink))
    }

    /// Build a gateway over an explicit ledger service and event sink.
    pub fn with_ledger(
        config: &GatewayConfig,
        ledger: Arc<dyn LedgerService>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        let registry = Arc::new(IcoRegistry::new());
        let store = ConfigStore::new(&config.ico_config_dir);

        let loaded = registry.load_from(&store);
        if loaded == 0 {
            if let Some(record) = config.bootstrap_ico() {
                let id = record.id().to_string();
                registry
                    .define(record, &store)
                    .map_err(|e| ConfigError::InvalidValue {
                        name: "bootstrap ICO",
                        reason: e.to_string(),
                    })?;
                info!(ico_id = %id, "bootstrapped default ICO from environment");
            }
        }

        let limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute));
        let orchestrator = PurchaseOrchestrator::new(
            registry.clone(),
            limiter,
            ledger,
            events,
            config.wallet().pubkey(),
            config.default_mint,
        );

        Ok(Self {
            registry,
            store,
            orchestrator,
        })
    }

    /// Number of registered ICOs.
    pub fn ico_count(&self) -> usize {
        self.registry.len()
    }

    /// Buy or sell tokens for an ICO. Returns a human-readable
    /// confirmation carrying both transaction references.
    pub async fn buy_or_sell(
        &self,
        ico_id: &str,
        amount: u64,
        payment_reference: &str,
        client_key: &str,
        is_sell: bool,
    ) -> GatewayResult<String> {
        let request = PurchaseRequest {
            ico_id: ico_id.to_string(),
            amount,
            payment_reference: payment_reference.to_string(),
            client_key: client_key.to_string(),
            is_sell,
        };

        match self.orchestrator.execute(&request).await {
            Ok(receipt) => Ok(render_receipt(&receipt)),
            Err(err) => {
                warn!(ico_id, client_key, is_sell, %err, "purchase attempt failed");
                Err(err)
            }
        }
    }

    /// JSON rendering of an ICO definition.
    pub fn get_ico_info(&self, ico_id: &str) -> GatewayResult<String> {
        let entry = self
            .registry
            .get(ico_id)
            .ok_or_else(|| GatewayError::NotFound(ico_id.to_string()))?;
        serde_json::to_string_pretty(entry.record())
            .map_err(|e| GatewayError::Internal(e.to_string()))
    }

    /// Validate and register an ICO definition (all-or-nothing persist).
    pub fn define_ico(&self, record: IcoRecord) -> GatewayResult<String> {
        let id = record.id().to_string();
        self.registry.define(record, &self.store)?;
        info!(ico_id = %id, "ICO created/updated");
        Ok(format!("ICO '{id}' created/updated successfully."))
    }

    /// Parse and register an ICO definition from a JSON document.
    pub fn define_ico_from_json(&self, config_json: &str) -> GatewayResult<String> {
        if config_json.is_empty() {
            return Err(GatewayError::InvalidInput(
                "configuration JSON must not be empty".to_string(),
            ));
        }
        if config_json.len() > MAX_CONFIG_JSON_BYTES {
            return Err(GatewayError::InvalidInput(format!(
                "configuration JSON is too large (max {MAX_CONFIG_JSON_BYTES} bytes)"
            )));
        }
        let record: IcoRecord = serde_json::from_str(config_json)
            .map_err(|e| GatewayError::InvalidInput(format!("invalid JSON: {e}")))?;
        self.define_ico(record)
    }

    /// Holder discount: 1% per 1000 whole tokens held, capped at 10%.
    pub fn get_discount(&self, ico_id: &str, held_amount: u64) -> GatewayResult<String> {
        if held_amount > MAX_TOKEN_AMOUNT {
            return Err(GatewayError::InvalidInput("amount is too large".to_string()));
        }
        let entry = self
            .registry
            .get(ico_id)
            .ok_or_else(|| GatewayError::NotFound(ico_id.to_string()))?;
        let token = &entry.record().token;

        let whole_tokens = held_amount / 10u64.pow(token.decimals as u32);
        let percent = (whole_tokens / DISCOUNT_TIER_TOKENS * DISCOUNT_PERCENT_PER_TIER)
            .min(MAX_DISCOUNT_PERCENT);

        Ok(format!(
            "Discount based on {whole_tokens} {}: {percent}%",
            token.symbol
        ))
    }
}

fn render_receipt(receipt: &PurchaseReceipt) -> String {
    let token_display = format_token_amount(
        receipt.amount,
        receipt.token_decimals,
        &receipt.token_symbol,
    );
    let note = if receipt.needs_reconciliation {
        " (accounting reconciliation pending)"
    } else {
        ""
    };

    if receipt.is_sell {
        format!(
            "Successfully sold {token_display} for {} SOL. \
             Token deposit received (txid: {}). \
             Payout txid: {}{note}",
            receipt.quote.net, receipt.payment_reference, receipt.transfer_reference,
        )
    } else {
        format!(
            "Successfully purchased {token_display} at a price of {} SOL. \
             Payment received (txid: {}). \
             Token transfer txid: {}{note}",
            receipt.quote.net, receipt.payment_reference, receipt.transfer_reference,
        )
    }
}

/// Render a base-unit amount with the token's decimal places.
fn format_token_amount(amount: u64, decimals: u8, symbol: &str) -> String {
    if decimals == 0 {
        return format!("{amount} {symbol}");
    }
    let scale = 10u64.pow(decimals as u32);
    let whole = amount / scale;
    let frac = amount % scale;
    format!("{whole}.{frac:0>width$} {symbol}", width = decimals as usize)
}
