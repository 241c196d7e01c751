//! Solana JSON-RPC Ledger Client
//!
//! [`JsonRpcLedger`] implements [`LedgerService`] against a Solana RPC
//! endpoint. Payment validation reads `jsonParsed` transactions; outbound
//! transfers are built and signed locally (see [`crate::wire`]) and
//! submitted as base64. Every request carries a bounded timeout;
//! confirmation polling has its own longer bound with periodic re-checks,
//! and exhausting it is reported as failure even though the transfer may
//! eventually land.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use lib_pricing::Decimal;

use crate::errors::{ConfigError, LedgerError, LedgerResult};
use crate::ledger::LedgerService;
use crate::wire::{
    compile_message, derive_associated_token_account, sign_transaction, system_transfer,
    transfer_checked, IcoWallet, Pubkey, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);
const CONFIRM_INTERVAL: Duration = Duration::from_secs(2);

/// Ledger service backed by a Solana JSON-RPC endpoint.
pub struct JsonRpcLedger {
    endpoint: String,
    client: reqwest::Client,
    wallet: IcoWallet,
    confirm_timeout: Duration,
    confirm_interval: Duration,
}

impl JsonRpcLedger {
    /// Build a client for the given endpoint, signing with `wallet`.
    pub fn new(endpoint: impl Into<String>, wallet: IcoWallet) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
            wallet,
            confirm_timeout: CONFIRM_TIMEOUT,
            confirm_interval: CONFIRM_INTERVAL,
        })
    }

    /// The wallet address payments must be sent to.
    pub fn wallet_pubkey(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    async fn rpc_call(&self, method: &str, params: Value) -> LedgerResult<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| LedgerError::MalformedResponse(e.to_string()))?;
        if let Some(err) = value.get("error") {
            if !err.is_null() {
                return Err(LedgerError::Transport(format!("{method}: {err}")));
            }
        }
        Ok(value.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn fetch_parsed_transaction(&self, tx_ref: &str) -> LedgerResult<Value> {
        let result = self
            .rpc_call(
                "getTransaction",
                json!([tx_ref, {
                    "encoding": "jsonParsed",
                    "commitment": "confirmed",
                    "maxSupportedTransactionVersion": 0,
                }]),
            )
            .await?;
        if result.is_null() {
            return Err(LedgerError::InvalidTransaction(format!(
                "transaction not found: {tx_ref}"
            )));
        }
        if !result["meta"]["err"].is_null() {
            return Err(LedgerError::InvalidTransaction(format!(
                "transaction {tx_ref} failed on-chain"
            )));
        }
        Ok(result)
    }

    async fn latest_blockhash(&self) -> LedgerResult<[u8; 32]> {
        let result = self
            .rpc_call("getLatestBlockhash", json!([{"commitment": "finalized"}]))
            .await?;
        let blockhash = result["value"]["blockhash"]
            .as_str()
            .ok_or_else(|| LedgerError::MalformedResponse("missing blockhash".to_string()))?;
        let bytes = bs58::decode(blockhash)
            .into_vec()
            .map_err(|e| LedgerError::MalformedResponse(format!("bad blockhash: {e}")))?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| LedgerError::MalformedResponse("blockhash is not 32 bytes".to_string()))
    }

    async fn send_transaction(&self, tx: Vec<u8>) -> LedgerResult<String> {
        let encoded = BASE64.encode(&tx);
        let result = self
            .rpc_call(
                "sendTransaction",
                json!([encoded, {
                    "encoding": "base64",
                    "skipPreflight": false,
                    "preflightCommitment": "confirmed",
                }]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LedgerError::MalformedResponse("missing signature".to_string()))
    }
}

#[async_trait]
impl LedgerService for JsonRpcLedger {
    async fn validate_payment(
        &self,
        tx_ref: &str,
        expected_destination: &Pubkey,
        required: Decimal,
    ) -> LedgerResult<Pubkey> {
        let result = self.fetch_parsed_transaction(tx_ref).await?;
        let payer = parse_payment(&result, expected_destination, required)?;
        info!(
            tx_ref,
            payer = %payer,
            required = %required,
            "validated payment transaction"
        );
        Ok(payer)
    }

    async fn validate_token_deposit(
        &self,
        tx_ref: &str,
        mint: &Pubkey,
        expected_destination: &Pubkey,
        required_amount: u64,
    ) -> LedgerResult<Pubkey> {
        let result = self.fetch_parsed_transaction(tx_ref).await?;
        let seller = parse_token_deposit(&result, mint, expected_destination, required_amount)?;
        info!(
            tx_ref,
            seller = %seller,
            required_amount,
            "validated token deposit transaction"
        );
        Ok(seller)
    }

    async fn submit_token_transfer(
        &self,
        recipient: &Pubkey,
        mint: &Pubkey,
        amount: u64,
        decimals: u8,
    ) -> LedgerResult<String> {
        let source = derive_associated_token_account(&self.wallet.pubkey(), mint)?;
        let destination = derive_associated_token_account(recipient, mint)?;
        let blockhash = self.latest_blockhash().await?;

        let instruction = transfer_checked(
            source,
            *mint,
            destination,
            self.wallet.pubkey(),
            amount,
            decimals,
        );
        let message = compile_message(&[instruction], &self.wallet.pubkey(), &blockhash)?;
        let tx = sign_transaction(&message, &self.wallet);

        let signature = self.send_transaction(tx).await?;
        info!(signature = %signature, amount, recipient = %recipient, "submitted token transfer");
        Ok(signature)
    }

    async fn submit_sol_transfer(&self, recipient: &Pubkey, lamports: u64) -> LedgerResult<String> {
        let blockhash = self.latest_blockhash().await?;
        let instruction = system_transfer(self.wallet.pubkey(), *recipient, lamports);
        let message = compile_message(&[instruction], &self.wallet.pubkey(), &blockhash)?;
        let tx = sign_transaction(&message, &self.wallet);

        let signature = self.send_transaction(tx).await?;
        info!(signature = %signature, lamports, recipient = %recipient, "submitted SOL transfer");
        Ok(signature)
    }

    async fn await_confirmation(&self, tx_ref: &str) -> LedgerResult<()> {
        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            tokio::time::sleep(self.confirm_interval).await;

            match self
                .rpc_call(
                    "getSignatureStatuses",
                    json!([[tx_ref], {"searchTransactionHistory": true}]),
                )
                .await
            {
                Ok(result) => {
                    let status = &result["value"][0];
                    if !status.is_null() {
                        let confirmation = status["confirmationStatus"].as_str();
                        if matches!(confirmation, Some("confirmed") | Some("finalized")) {
                            if status["err"].is_null() {
                                info!(tx_ref, "transaction confirmed");
                                return Ok(());
                            }
                            return Err(LedgerError::TransactionFailed(
                                status["err"].to_string(),
                            ));
                        }
                        debug!(tx_ref, ?confirmation, "transaction not yet confirmed");
                    }
                }
                // Transient status-check failures keep polling until the bound.
                Err(err) => warn!(tx_ref, %err, "error checking transaction status"),
            }

            if Instant::now() >= deadline {
                warn!(tx_ref, "transaction confirmation timed out");
                return Err(LedgerError::ConfirmationTimeout);
            }
        }
    }

    async fn get_token_balance(&self, account: &Pubkey) -> LedgerResult<u64> {
        let result = self
            .rpc_call(
                "getTokenAccountBalance",
                json!([account.to_base58(), {"commitment": "confirmed"}]),
            )
            .await?;
        result["value"]["amount"]
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| {
                LedgerError::MalformedResponse(format!("missing token balance for {account}"))
            })
    }
}

/// Validate a parsed SOL payment transaction and extract the payer.
fn parse_payment(
    result: &Value,
    expected_destination: &Pubkey,
    required: Decimal,
) -> LedgerResult<Pubkey> {
    let first = first_instruction(result)?;

    if first["programId"].as_str() != Some(SYSTEM_PROGRAM_ID.to_base58().as_str()) {
        return Err(LedgerError::InvalidTransaction(
            "not a system program transfer".to_string(),
        ));
    }
    if first["parsed"]["type"].as_str() != Some("transfer") {
        return Err(LedgerError::InvalidTransaction(
            "instruction is not a transfer".to_string(),
        ));
    }

    let info = &first["parsed"]["info"];
    let lamports = info["lamports"]
        .as_u64()
        .ok_or_else(|| LedgerError::MalformedResponse("missing lamports".to_string()))?;

    let destination = pubkey_field(info, "destination")?;
    if destination != *expected_destination {
        return Err(LedgerError::InvalidTransaction(format!(
            "wrong destination: expected {expected_destination}, got {destination}"
        )));
    }

    // Tolerance-free floor check on the exact lamport amount.
    let received = Decimal::from_lamports(lamports);
    if received < required {
        return Err(LedgerError::InsufficientPayment { required, received });
    }

    pubkey_field(info, "source")
}

/// Validate a parsed SPL token deposit and extract the seller.
fn parse_token_deposit(
    result: &Value,
    mint: &Pubkey,
    expected_destination: &Pubkey,
    required_amount: u64,
) -> LedgerResult<Pubkey> {
    let first = first_instruction(result)?;

    if first["programId"].as_str() != Some(TOKEN_PROGRAM_ID.to_base58().as_str()) {
        return Err(LedgerError::InvalidTransaction(
            "not a token program transfer".to_string(),
        ));
    }
    // Only transferChecked carries the mint; a bare transfer cannot be
    // verified against the ICO's token and is rejected.
    if first["parsed"]["type"].as_str() != Some("transferChecked") {
        return Err(LedgerError::InvalidTransaction(
            "instruction is not a checked token transfer".to_string(),
        ));
    }

    let info = &first["parsed"]["info"];

    let deposit_mint = pubkey_field(info, "mint")?;
    if deposit_mint != *mint {
        return Err(LedgerError::InvalidTransaction(format!(
            "wrong mint: expected {mint}, got {deposit_mint}"
        )));
    }

    let destination = pubkey_field(info, "destination")?;
    if destination != *expected_destination {
        return Err(LedgerError::InvalidTransaction(format!(
            "wrong destination: expected {expected_destination}, got {destination}"
        )));
    }

    let received = info["tokenAmount"]["amount"]
        .as_str()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| LedgerError::MalformedResponse("missing token amount".to_string()))?;
    if received < required_amount {
        return Err(LedgerError::InsufficientDeposit {
            required: required_amount,
            received,
        });
    }

    pubkey_field(info, "authority")
}

fn first_instruction(result: &Value) -> LedgerResult<&Value> {
    result["transaction"]["message"]["instructions"]
        .as_array()
        .and_then(|instructions| instructions.first())
        .ok_or_else(|| LedgerError::InvalidTransaction("transaction has no instructions".to_string()))
}

fn pubkey_field(info: &Value, field: &str) -> LedgerResult<Pubkey> {
    let text = info[field]
        .as_str()
        .ok_or_else(|| LedgerError::MalformedResponse(format!("missing {field}")))?;
    Pubkey::from_base58(text)
        .map_err(|_| LedgerError::InvalidTransaction(format!("invalid {field} address")))
}
