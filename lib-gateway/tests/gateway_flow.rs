//! End-to-end gateway flows over a scripted ledger.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use lib_gateway::{
    EventSink, GatewayConfig, GatewayError, GatewayEvent, IcoGateway, LedgerError, LedgerResult,
    LedgerService, Pubkey,
};
use lib_pricing::Decimal;

const PAYER: Pubkey = Pubkey([11u8; 32]);
const SELLER: Pubkey = Pubkey([22u8; 32]);

/// Ledger whose payment and deposit amounts are scripted per test.
struct ScriptedLedger {
    payment_lamports: u64,
    deposit_amount: u64,
}

#[async_trait]
impl LedgerService for ScriptedLedger {
    async fn validate_payment(
        &self,
        _tx_ref: &str,
        _expected_destination: &Pubkey,
        required: Decimal,
    ) -> LedgerResult<Pubkey> {
        let received = Decimal::from_lamports(self.payment_lamports);
        if received < required {
            return Err(LedgerError::InsufficientPayment { required, received });
        }
        Ok(PAYER)
    }

    async fn validate_token_deposit(
        &self,
        _tx_ref: &str,
        _mint: &Pubkey,
        _expected_destination: &Pubkey,
        required_amount: u64,
    ) -> LedgerResult<Pubkey> {
        if self.deposit_amount < required_amount {
            return Err(LedgerError::InsufficientDeposit {
                required: required_amount,
                received: self.deposit_amount,
            });
        }
        Ok(SELLER)
    }

    async fn submit_token_transfer(
        &self,
        _recipient: &Pubkey,
        _mint: &Pubkey,
        _amount: u64,
        _decimals: u8,
    ) -> LedgerResult<String> {
        Ok("transfer-abc".to_string())
    }

    async fn submit_sol_transfer(&self, _recipient: &Pubkey, _lamports: u64) -> LedgerResult<String> {
        Ok("payout-def".to_string())
    }

    async fn await_confirmation(&self, _tx_ref: &str) -> LedgerResult<()> {
        Ok(())
    }

    async fn get_token_balance(&self, _account: &Pubkey) -> LedgerResult<u64> {
        Ok(0)
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<GatewayEvent>>,
}

impl EventSink for RecordingSink {
    fn emit(&self, event: GatewayEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn gateway_at(
    dir: &std::path::Path,
    ledger: ScriptedLedger,
) -> (IcoGateway, Arc<RecordingSink>) {
    let config = GatewayConfig::from_lookup(|name| match name {
        "ICO_CONFIG_DIR" => Some(dir.to_string_lossy().into_owned()),
        _ => None,
    })
    .unwrap();
    let sink = Arc::new(RecordingSink::default());
    let gateway = IcoGateway::with_ledger(&config, Arc::new(ledger), sink.clone()).unwrap();
    (gateway, sink)
}

fn fixed_price_ico(id: &str, start: u64, end: u64) -> String {
    format!(
        r#"{{
            "token": {{
                "name": "Main Token",
                "symbol": "MMT",
                "total_supply": 1000000000000,
                "decimals": 9
            }},
            "ico": {{
                "ico_id": "{id}",
                "start_time": {start},
                "end_time": {end},
                "curve_type": "fixed",
                "fixed_price": 0.000001,
                "sell_fee_percentage": 0.02
            }}
        }}"#
    )
}

#[tokio::test]
async fn test_buy_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, _sink) = gateway_at(
        dir.path(),
        ScriptedLedger {
            payment_lamports: 1_000,
            deposit_amount: 0,
        },
    );
    gateway
        .define_ico_from_json(&fixed_price_ico("main_ico", 1, u64::MAX - 1))
        .unwrap();

    // 1 whole token at 0.000001 SOL fixed price.
    let message = gateway
        .buy_or_sell("main_ico", 1_000_000_000, "payment-sig", "10.0.0.1", false)
        .await
        .unwrap();

    assert_eq!(
        message,
        "Successfully purchased 1.000000000 MMT at a price of 0.000001 SOL. \
         Payment received (txid: payment-sig). \
         Token transfer txid: transfer-abc"
    );
}

#[tokio::test]
async fn test_buy_then_sell_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, sink) = gateway_at(
        dir.path(),
        ScriptedLedger {
            payment_lamports: u64::MAX,
            deposit_amount: u64::MAX,
        },
    );
    gateway
        .define_ico_from_json(&fixed_price_ico("main_ico", 1, u64::MAX - 1))
        .unwrap();

    gateway
        .buy_or_sell("main_ico", 2_000_000_000, "payment-sig", "10.0.0.1", false)
        .await
        .unwrap();

    let message = gateway
        .buy_or_sell("main_ico", 1_000_000_000, "deposit-sig", "10.0.0.1", true)
        .await
        .unwrap();

    // 0.000001 SOL gross, 2% sell fee.
    assert_eq!(
        message,
        "Successfully sold 1.000000000 MMT for 0.00000098 SOL. \
         Token deposit received (txid: deposit-sig). \
         Payout txid: payout-def"
    );

    let events = sink.events.lock().unwrap();
    assert!(matches!(
        events.as_slice(),
        [
            GatewayEvent::TokensPurchased { .. },
            GatewayEvent::TokensSold { .. }
        ]
    ));
}

#[tokio::test]
async fn test_expired_ico_yields_inactive_error() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, _sink) = gateway_at(
        dir.path(),
        ScriptedLedger {
            payment_lamports: u64::MAX,
            deposit_amount: 0,
        },
    );
    gateway
        .define_ico_from_json(&fixed_price_ico("main_ico", 1, 100))
        .unwrap();

    let err = gateway
        .buy_or_sell("main_ico", 1_000_000_000, "payment-sig", "10.0.0.1", false)
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::InactiveIco { .. }));
    assert_eq!(err.user_message(), "ICO 'main_ico' is not active.");
}

#[tokio::test]
async fn test_underpayment_yields_insufficient_funds() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, _sink) = gateway_at(
        dir.path(),
        ScriptedLedger {
            payment_lamports: 500,
            deposit_amount: 0,
        },
    );
    gateway
        .define_ico_from_json(&fixed_price_ico("main_ico", 1, u64::MAX - 1))
        .unwrap();

    let err = gateway
        .buy_or_sell("main_ico", 1_000_000_000, "payment-sig", "10.0.0.1", false)
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::InsufficientFunds { .. }));
    assert_eq!(
        err.user_message(),
        "Insufficient payment. Required: 0.000001 SOL. Received: 0.0000005 SOL."
    );
}

#[tokio::test]
async fn test_definitions_survive_reload() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (gateway, _sink) = gateway_at(
            dir.path(),
            ScriptedLedger {
                payment_lamports: 0,
                deposit_amount: 0,
            },
        );
        gateway
            .define_ico_from_json(&fixed_price_ico("main_ico", 1, u64::MAX - 1))
            .unwrap();
    }

    // A fresh gateway over the same config dir sees the definition.
    let (gateway, _sink) = gateway_at(
        dir.path(),
        ScriptedLedger {
            payment_lamports: 0,
            deposit_amount: 0,
        },
    );
    assert_eq!(gateway.ico_count(), 1);
    assert!(gateway.get_ico_info("main_ico").is_ok());
}
