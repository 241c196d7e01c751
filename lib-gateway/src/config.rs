//! Gateway Configuration
//!
//! Environment-driven configuration with validated defaults and explicit
//! range checks. Any violation is fatal at startup: the gateway must not
//! run with invalid pricing or wallet configuration.
//!
//! # Recognized variables
//!
//! | Variable                | Default                          |
//! |-------------------------|----------------------------------|
//! | `RPC_ENDPOINT`          | `http://localhost:8899`          |
//! | `TOKEN_MINT_ADDRESS`    | SPL token program id             |
//! | `TOKEN_DECIMALS`        | `9` (range 0–18)                 |
//! | `ICO_WALLET_SEED`       | 32 comma-separated `1`s          |
//! | `ICO_CONFIG_DIR`        | `ico_configs`                    |
//! | `RATE_LIMIT_PER_MINUTE` | `10` (range 1–1000)              |
//!
//! Plus the default-curve family (`CURVE_TYPE`, `FIXED_PRICE`,
//! `INITIAL_PRICE`, `SLOPE`, `GROWTH_RATE`, `CUSTOM_FORMULA`,
//! `SELL_FEE_PERCENTAGE`, `ICO_START_TIMESTAMP`, `ICO_END_TIMESTAMP`,
//! `TOKEN_NAME`, `TOKEN_SYMBOL`, `TOKEN_TOTAL_SUPPLY`) used to bootstrap
//! a `main_ico` definition when the config store starts out empty and a
//! sale window is configured.

use std::path::PathBuf;

use lib_registry::{CurveKind, IcoParams, IcoRecord, TokenDescriptor};

use crate::errors::ConfigError;
use crate::wire::{IcoWallet, Pubkey};

const DEFAULT_RPC_ENDPOINT: &str = "http://localhost:8899";
const DEFAULT_MINT_ADDRESS: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
const DEFAULT_CONFIG_DIR: &str = "ico_configs";
const DEFAULT_BOOTSTRAP_ID: &str = "main_ico";

/// Validated gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Solana RPC endpoint URL.
    pub rpc_endpoint: String,
    /// Mint used when an ICO config does not name one.
    pub default_mint: Pubkey,
    /// Decimals used when an ICO config does not name a mint.
    pub default_decimals: u8,
    /// 32-byte seed of the ICO wallet keypair.
    pub wallet_seed: [u8; 32],
    /// Directory of ICO config documents.
    pub ico_config_dir: PathBuf,
    /// Requests admitted per client key per minute.
    pub rate_limit_per_minute: u32,
    /// Defaults for the bootstrap ICO definition.
    pub bootstrap: BootstrapDefaults,
}

/// Default ICO parameters, applied only when bootstrapping `main_ico`.
#[derive(Debug, Clone)]
pub struct BootstrapDefaults {
    pub curve_type: CurveKind,
    pub fixed_price: f64,
    pub initial_price: f64,
    pub slope: f64,
    pub growth_rate: f64,
    pub custom_formula: String,
    pub sell_fee_percentage: f64,
    pub start_time: u64,
    pub end_time: u64,
    pub token_name: String,
    pub token_symbol: String,
    pub token_total_supply: u64,
}

impl GatewayConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an explicit variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // =====================================================================
        // Ledger endpoint and token defaults
        // =====================================================================
        let rpc_endpoint = lookup("RPC_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_RPC_ENDPOINT.to_string());
        if !rpc_endpoint.starts_with("http://") && !rpc_endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                name: "RPC_ENDPOINT",
                reason: format!("must be an http(s) URL, got '{rpc_endpoint}'"),
            });
        }

        let mint_text = lookup("TOKEN_MINT_ADDRESS")
            .unwrap_or_else(|| DEFAULT_MINT_ADDRESS.to_string());
        let default_mint = Pubkey::from_base58(&mint_text).map_err(|e| ConfigError::InvalidValue {
            name: "TOKEN_MINT_ADDRESS",
            reason: e.to_string(),
        })?;

        let default_decimals = parse_ranged(&lookup, "TOKEN_DECIMALS", 9, 0, 18)? as u8;

        // =====================================================================
        // Wallet key material
        // =====================================================================
        let seed_text = lookup("ICO_WALLET_SEED")
            .unwrap_or_else(|| vec!["1"; 32].join(","));
        let wallet_seed = parse_wallet_seed(&seed_text)?;

        // =====================================================================
        // Admission and storage
        // =====================================================================
        let rate_limit_per_minute = parse_ranged(&lookup, "RATE_LIMIT_PER_MINUTE", 10, 1, 1000)? as u32;
        let ico_config_dir = PathBuf::from(
            lookup("ICO_CONFIG_DIR").unwrap_or_else(|| DEFAULT_CONFIG_DIR.to_string()),
        );

        // =====================================================================
        // Bootstrap ICO defaults
        // =====================================================================
        let curve_type = match lookup("CURVE_TYPE").as_deref().unwrap_or("fixed") {
            "fixed" => CurveKind::Fixed,
            "linear" => CurveKind::Linear,
            "exponential" => CurveKind::Exponential,
            "sigmoid" => CurveKind::Sigmoid,
            "custom" => CurveKind::Custom,
            other => {
                return Err(ConfigError::InvalidValue {
                    name: "CURVE_TYPE",
                    reason: format!("unknown curve type '{other}'"),
                })
            }
        };

        let bootstrap = BootstrapDefaults {
            curve_type,
            fixed_price: parse_price(&lookup, "FIXED_PRICE", 0.000001)?,
            initial_price: parse_price(&lookup, "INITIAL_PRICE", 0.0000001)?,
            slope: parse_float(&lookup, "SLOPE", 0.000000001)?,
            growth_rate: parse_float(&lookup, "GROWTH_RATE", 0.0000000001)?,
            custom_formula: lookup("CUSTOM_FORMULA")
                .unwrap_or_else(|| "initial_price + slope * total_tokens_minted".to_string()),
            sell_fee_percentage: {
                let fee = parse_float(&lookup, "SELL_FEE_PERCENTAGE", 0.0)?;
                if !(0.0..=1.0).contains(&fee) {
                    return Err(ConfigError::InvalidValue {
                        name: "SELL_FEE_PERCENTAGE",
                        reason: format!("must be between 0.0 and 1.0, got {fee}"),
                    });
                }
                fee
            },
            start_time: parse_ranged(&lookup, "ICO_START_TIMESTAMP", 0, 0, i64::MAX)? as u64,
            end_time: parse_ranged(&lookup, "ICO_END_TIMESTAMP", 0, 0, i64::MAX)? as u64,
            token_name: lookup("TOKEN_NAME").unwrap_or_else(|| "Main ICO Token".to_string()),
            token_symbol: lookup("TOKEN_SYMBOL").unwrap_or_else(|| "MMT".to_string()),
            token_total_supply: parse_ranged(
                &lookup,
                "TOKEN_TOTAL_SUPPLY",
                1_000_000_000_000,
                1,
                i64::MAX,
            )? as u64,
        };

        Ok(Self {
            rpc_endpoint,
            default_mint,
            default_decimals,
            wallet_seed,
            ico_config_dir,
            rate_limit_per_minute,
            bootstrap,
        })
    }

    /// The ICO wallet derived from the configured seed.
    pub fn wallet(&self) -> IcoWallet {
        IcoWallet::from_seed(self.wallet_seed)
    }

    /// Bootstrap `main_ico` definition, if a sale window is configured.
    ///
    /// Applied only when the config store starts out empty; a zero
    /// start or end timestamp disables bootstrapping.
    pub fn bootstrap_ico(&self) -> Option<IcoRecord> {
        let defaults = &self.bootstrap;
        if defaults.start_time == 0 || defaults.end_time == 0 {
            return None;
        }

        let mut params = IcoParams {
            ico_id: DEFAULT_BOOTSTRAP_ID.to_string(),
            start_time: defaults.start_time,
            end_time: defaults.end_time,
            curve_type: defaults.curve_type,
            fixed_price: None,
            initial_price: None,
            slope: None,
            growth_rate: None,
            custom_formula: None,
            sell_fee_percentage: defaults.sell_fee_percentage,
        };
        match defaults.curve_type {
            CurveKind::Fixed => params.fixed_price = Some(defaults.fixed_price),
            CurveKind::Linear => {
                params.initial_price = Some(defaults.initial_price);
                params.slope = Some(defaults.slope);
            }
            CurveKind::Exponential => {
                params.initial_price = Some(defaults.initial_price);
                params.growth_rate = Some(defaults.growth_rate);
            }
            CurveKind::Sigmoid => {}
            CurveKind::Custom => {
                params.custom_formula = Some(defaults.custom_formula.clone());
                params.initial_price = Some(defaults.initial_price);
                params.slope = Some(defaults.slope);
                params.growth_rate = Some(defaults.growth_rate);
            }
        }

        Some(IcoRecord {
            token: TokenDescriptor {
                name: defaults.token_name.clone(),
                symbol: defaults.token_symbol.clone(),
                total_supply: defaults.token_total_supply,
                decimals: self.default_decimals,
                token_address: Some(self.default_mint.to_base58()),
            },
            ico: params,
        })
    }
}

fn parse_wallet_seed(text: &str) -> Result<[u8; 32], ConfigError> {
    let bytes: Result<Vec<u8>, _> = text.split(',').map(|part| part.trim().parse::<u8>()).collect();
    let bytes = bytes.map_err(|e| ConfigError::InvalidValue {
        name: "ICO_WALLET_SEED",
        reason: format!("must be comma-separated bytes: {e}"),
    })?;
    bytes.as_slice().try_into().map_err(|_| ConfigError::InvalidValue {
        name: "ICO_WALLET_SEED",
        reason: format!("must contain exactly 32 bytes, got {}", bytes.len()),
    })
}

fn parse_ranged(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: i64,
    min: i64,
    max: i64,
) -> Result<i64, ConfigError> {
    let value = match lookup(name) {
        Some(text) => text.trim().parse::<i64>().map_err(|e| ConfigError::InvalidValue {
            name,
            reason: e.to_string(),
        })?,
        None => default,
    };
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

fn parse_float(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: f64,
) -> Result<f64, ConfigError> {
    let value = match lookup(name) {
        Some(text) => text.trim().parse::<f64>().map_err(|e| ConfigError::InvalidValue {
            name,
            reason: e.to_string(),
        })?,
        None => default,
    };
    if !value.is_finite() {
        return Err(ConfigError::InvalidValue {
            name,
            reason: "must be finite".to_string(),
        });
    }
    Ok(value)
}

fn parse_price(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: f64,
) -> Result<f64, ConfigError> {
    let value = parse_float(lookup, name, default)?;
    if value < 0.0 {
        return Err(ConfigError::InvalidValue {
            name,
            reason: format!("must be non-negative, got {value}"),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.rpc_endpoint, "http://localhost:8899");
        assert_eq!(config.default_decimals, 9);
        assert_eq!(config.rate_limit_per_minute, 10);
        assert_eq!(config.wallet_seed, [1u8; 32]);
        assert_eq!(config.ico_config_dir, PathBuf::from("ico_configs"));
        assert_eq!(config.bootstrap.curve_type, CurveKind::Fixed);
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let result = GatewayConfig::from_lookup(lookup_from(&[("RPC_ENDPOINT", "ftp://nope")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { name: "RPC_ENDPOINT", .. })));
    }

    #[test]
    fn test_rejects_out_of_range_decimals() {
        let result = GatewayConfig::from_lookup(lookup_from(&[("TOKEN_DECIMALS", "19")]));
        assert!(matches!(result, Err(ConfigError::OutOfRange { name: "TOKEN_DECIMALS", .. })));
    }

    #[test]
    fn test_rejects_out_of_range_rate_limit() {
        for bad in ["0", "1001"] {
            let result =
                GatewayConfig::from_lookup(lookup_from(&[("RATE_LIMIT_PER_MINUTE", bad)]));
            assert!(matches!(
                result,
                Err(ConfigError::OutOfRange { name: "RATE_LIMIT_PER_MINUTE", .. })
            ));
        }
    }

    #[test]
    fn test_rejects_bad_wallet_seed() {
        let result = GatewayConfig::from_lookup(lookup_from(&[("ICO_WALLET_SEED", "1,2,3")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { name: "ICO_WALLET_SEED", .. })));

        let result = GatewayConfig::from_lookup(lookup_from(&[("ICO_WALLET_SEED", "not,bytes")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { name: "ICO_WALLET_SEED", .. })));
    }

    #[test]
    fn test_rejects_bad_mint_address() {
        let result =
            GatewayConfig::from_lookup(lookup_from(&[("TOKEN_MINT_ADDRESS", "zz0OIl")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "TOKEN_MINT_ADDRESS", .. })
        ));
    }

    #[test]
    fn test_rejects_out_of_range_sell_fee() {
        let result =
            GatewayConfig::from_lookup(lookup_from(&[("SELL_FEE_PERCENTAGE", "1.5")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "SELL_FEE_PERCENTAGE", .. })
        ));
    }

    #[test]
    fn test_bootstrap_disabled_without_window() {
        let config = GatewayConfig::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.bootstrap_ico().is_none());
    }

    #[test]
    fn test_bootstrap_record_is_valid() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("ICO_START_TIMESTAMP", "1700000000"),
            ("ICO_END_TIMESTAMP", "1800000000"),
            ("CURVE_TYPE", "linear"),
        ]))
        .unwrap();

        let record = config.bootstrap_ico().unwrap();
        assert_eq!(record.id(), "main_ico");
        assert_eq!(record.ico.curve_type, CurveKind::Linear);
        assert!(record.validate().is_ok());
    }
}
