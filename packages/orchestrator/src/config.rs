use alloy::primitives::Address;
use eyre::{eyre, Result, WrapErr};
use peggy_rs::evm::tx::{
    parse_gas_price, GasPolicy, DEFAULT_GAS_PRICE_ADJUSTMENT, DEFAULT_PENDING_TX_WAIT,
};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    /// Attempts per chain call before an iteration gives up
    pub max_attempts: u32,
    pub cosmos: CosmosConfig,
    pub ethereum: EthereumConfig,
    pub oracle: OracleConfig,
    pub relayer: RelayerConfig,
    pub metrics: MetricsConfig,
}

/// Which loops to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Validator mode when the Ethereum address is in the current valset
    Auto,
    Validator,
    Relayer,
}

impl FromStr for Mode {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Mode::Auto),
            "validator" => Ok(Mode::Validator),
            "relayer" => Ok(Mode::Relayer),
            other => Err(eyre!(
                "unknown mode {:?}, expected auto, validator or relayer",
                other
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Auto => "auto",
            Mode::Validator => "validator",
            Mode::Relayer => "relayer",
        };
        f.write_str(name)
    }
}

/// Key material; prints as `<redacted>` under `{:?}`
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, Clone)]
pub struct CosmosConfig {
    pub chain_id: String,
    pub lcd_url: String,
    pub tendermint_rpc_url: String,
    pub mnemonic: Secret,
    pub derivation_path: Option<String>,
    pub account_prefix: String,
    /// Gas per message; a transaction pays this times its message count
    pub gas_limit: u64,
    pub gas_price: f64,
    pub fee_denom: String,
    pub request_timeout_secs: u64,
    /// Ethereum claims packed into one Cosmos transaction
    pub claims_per_tx: usize,
}

#[derive(Debug, Clone)]
pub struct EthereumConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub peggy_address: String,
    pub private_key: Secret,
    pub max_block_range: u64,
    pub tx_timeout_secs: u64,
    /// Multiplier on the node's suggested gas price
    pub gas_price_adjustment: f64,
    /// Relay sends are refused above this price, in wei
    pub max_gas_price: u128,
    /// An identical relay input is not resent within this window
    pub pending_tx_wait_secs: u64,
}

/// Oracle and batch requester configuration
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub loop_interval_secs: u64,
    /// Blocks to stay behind the Ethereum head
    pub confirmation_delay: u64,
    /// Maximum blocks scanned per iteration
    pub max_block_span: u64,
    pub resync_interval_secs: u64,
    /// Zero requests a batch whenever fees are pending
    pub min_batch_fee_usd: f64,
    /// Cosmos denoms for ERC20 tokens that are not `peggy0x...` vouchers
    pub erc20_denoms: HashMap<Address, String>,
    pub coingecko_api: String,
}

/// Relayer configuration
#[derive(Debug, Clone)]
pub struct RelayerConfig {
    pub relay_valsets: bool,
    pub relay_valset_offset_secs: u64,
    pub relay_batches: bool,
    pub relay_batch_offset_secs: u64,
    pub loop_interval_secs: u64,
    /// Blocks per window when scanning back for the latest valset update
    pub valset_search_window: u64,
}

/// Metrics/health server configuration
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_account_prefix() -> String {
    "inj".to_string()
}

fn default_fee_denom() -> String {
    "inj".to_string()
}

fn default_gas_limit() -> u64 {
    peggy_rs::cosmos::broadcast::DEFAULT_GAS_LIMIT
}

fn default_gas_price() -> f64 {
    peggy_rs::cosmos::broadcast::DEFAULT_GAS_PRICE
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_block_range() -> u64 {
    peggy_rs::evm::client::DEFAULT_MAX_BLOCK_RANGE
}

fn default_tx_timeout() -> u64 {
    120
}

fn default_claims_per_tx() -> usize {
    peggy_rs::cosmos::DEFAULT_CLAIMS_PER_TX
}

fn default_gas_price_adjustment() -> f64 {
    DEFAULT_GAS_PRICE_ADJUSTMENT
}

fn default_max_gas_price() -> u128 {
    peggy_rs::evm::tx::DEFAULT_MAX_GAS_PRICE
}

fn default_pending_tx_wait() -> u64 {
    DEFAULT_PENDING_TX_WAIT.as_secs()
}

fn default_oracle_interval() -> u64 {
    60
}

fn default_confirmation_delay() -> u64 {
    12
}

fn default_max_block_span() -> u64 {
    2000
}

fn default_resync_interval() -> u64 {
    24 * 60 * 60
}

fn default_min_batch_fee_usd() -> f64 {
    23.3
}

fn default_coingecko_api() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_relay_offset() -> u64 {
    5 * 60
}

fn default_relayer_interval() -> u64 {
    5 * 60
}

fn default_valset_search_window() -> u64 {
    2000
}

fn default_metrics_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| eyre!("{} environment variable is required", name))
}

fn optional<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse `0xToken:denom` pairs separated by commas
pub fn parse_erc20_denoms(raw: &str) -> Result<HashMap<Address, String>> {
    let mut denoms = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (token, denom) = entry
            .split_once(':')
            .ok_or_else(|| eyre!("ERC20 denom entry {:?} must look like 0xToken:denom", entry))?;
        let token: Address = token
            .trim()
            .parse()
            .wrap_err_with(|| format!("Invalid ERC20 address in {:?}", entry))?;
        let denom = denom.trim();
        if denom.is_empty() {
            return Err(eyre!("ERC20 denom entry {:?} has an empty denom", entry));
        }
        denoms.insert(token, denom.to_string());
    }
    Ok(denoms)
}

impl Config {
    /// `./.env` (when present) layered under the process environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env")
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Read every setting from the environment, then validate
    pub fn load_from_env() -> Result<Self> {
        let mode = match env::var("ORCHESTRATOR_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => Mode::Auto,
        };

        let cosmos = CosmosConfig {
            chain_id: required("COSMOS_CHAIN_ID")?,
            lcd_url: required("COSMOS_LCD_URL")?,
            tendermint_rpc_url: required("TENDERMINT_RPC_URL")?,
            mnemonic: Secret::new(required("COSMOS_MNEMONIC")?),
            derivation_path: env::var("COSMOS_DERIVATION_PATH").ok(),
            account_prefix: optional("COSMOS_ACCOUNT_PREFIX", default_account_prefix()),
            gas_limit: optional("COSMOS_GAS_LIMIT", default_gas_limit()),
            gas_price: optional("COSMOS_GAS_PRICE", default_gas_price()),
            fee_denom: optional("COSMOS_FEE_DENOM", default_fee_denom()),
            request_timeout_secs: optional("COSMOS_REQUEST_TIMEOUT_SECS", default_request_timeout()),
            claims_per_tx: optional("COSMOS_CLAIMS_PER_TX", default_claims_per_tx()),
        };

        let max_gas_price = match env::var("ETH_MAX_GAS_PRICE") {
            Ok(raw) => parse_gas_price(&raw).wrap_err("ETH_MAX_GAS_PRICE is not a gas price")?,
            Err(_) => default_max_gas_price(),
        };

        let ethereum = EthereumConfig {
            rpc_url: required("ETH_RPC_URL")?,
            chain_id: required("ETH_CHAIN_ID")?
                .parse()
                .wrap_err("ETH_CHAIN_ID must be a valid u64")?,
            peggy_address: required("ETH_PEGGY_ADDRESS")?,
            private_key: Secret::new(required("ETH_PRIVATE_KEY")?),
            max_block_range: optional("ETH_MAX_BLOCK_RANGE", default_max_block_range()),
            tx_timeout_secs: optional("ETH_TX_TIMEOUT_SECS", default_tx_timeout()),
            gas_price_adjustment: optional(
                "ETH_GAS_PRICE_ADJUSTMENT",
                default_gas_price_adjustment(),
            ),
            max_gas_price,
            pending_tx_wait_secs: optional("ETH_PENDING_TX_WAIT_SECS", default_pending_tx_wait()),
        };

        let erc20_denoms = match env::var("ERC20_DENOMS") {
            Ok(raw) => parse_erc20_denoms(&raw)?,
            Err(_) => HashMap::new(),
        };

        let oracle = OracleConfig {
            loop_interval_secs: optional("ORACLE_LOOP_INTERVAL_SECS", default_oracle_interval()),
            confirmation_delay: optional("ETH_CONFIRMATION_DELAY", default_confirmation_delay()),
            max_block_span: optional("ORACLE_MAX_BLOCK_SPAN", default_max_block_span()),
            resync_interval_secs: optional(
                "ORACLE_RESYNC_INTERVAL_SECS",
                default_resync_interval(),
            ),
            min_batch_fee_usd: optional("MIN_BATCH_FEE_USD", default_min_batch_fee_usd()),
            erc20_denoms,
            coingecko_api: optional("COINGECKO_API", default_coingecko_api()),
        };

        let relayer = RelayerConfig {
            relay_valsets: optional("RELAY_VALSETS", false),
            relay_valset_offset_secs: optional("RELAY_VALSET_OFFSET_SECS", default_relay_offset()),
            relay_batches: optional("RELAY_BATCHES", false),
            relay_batch_offset_secs: optional("RELAY_BATCH_OFFSET_SECS", default_relay_offset()),
            loop_interval_secs: optional("RELAYER_LOOP_INTERVAL_SECS", default_relayer_interval()),
            valset_search_window: optional(
                "RELAYER_VALSET_SEARCH_WINDOW",
                default_valset_search_window(),
            ),
        };

        let metrics = MetricsConfig {
            enabled: optional("METRICS_ENABLED", true),
            bind_address: optional("METRICS_BIND_ADDRESS", default_metrics_bind_address()),
            port: optional("METRICS_PORT", default_metrics_port()),
        };

        let config = Config {
            mode,
            max_attempts: optional("MAX_ATTEMPTS", default_max_attempts()),
            cosmos,
            ethereum,
            oracle,
            relayer,
            metrics,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(eyre!("max_attempts must be at least 1"));
        }

        if self.cosmos.chain_id.is_empty() {
            return Err(eyre!("cosmos.chain_id cannot be empty"));
        }
        if self.cosmos.lcd_url.is_empty() {
            return Err(eyre!("cosmos.lcd_url cannot be empty"));
        }
        if self.cosmos.tendermint_rpc_url.is_empty() {
            return Err(eyre!("cosmos.tendermint_rpc_url cannot be empty"));
        }
        if self.cosmos.mnemonic.expose().split_whitespace().count() < 12 {
            return Err(eyre!("cosmos.mnemonic must have at least 12 words"));
        }
        if self.cosmos.account_prefix.is_empty() {
            return Err(eyre!("cosmos.account_prefix cannot be empty"));
        }
        if !self.cosmos.gas_price.is_finite() || self.cosmos.gas_price < 0.0 {
            return Err(eyre!("cosmos.gas_price must be a non-negative number"));
        }
        if self.cosmos.claims_per_tx == 0 {
            return Err(eyre!("cosmos.claims_per_tx must be positive"));
        }

        if self.ethereum.rpc_url.is_empty() {
            return Err(eyre!("ethereum.rpc_url cannot be empty"));
        }
        if self.ethereum.peggy_address.len() != 42 || !self.ethereum.peggy_address.starts_with("0x")
        {
            return Err(eyre!(
                "ethereum.peggy_address must be a valid hex address (42 chars with 0x prefix)"
            ));
        }
        let key = self.ethereum.private_key.expose();
        if key.len() != 66 || !key.starts_with("0x") {
            return Err(eyre!("ethereum.private_key must be 0x followed by 64 hex digits"));
        }
        if self.ethereum.max_block_range == 0 {
            return Err(eyre!("ethereum.max_block_range must be positive"));
        }
        let adjustment = self.ethereum.gas_price_adjustment;
        if !adjustment.is_finite() || adjustment <= 0.0 {
            return Err(eyre!("ethereum.gas_price_adjustment must be a positive number"));
        }
        if self.ethereum.max_gas_price == 0 {
            return Err(eyre!("ethereum.max_gas_price must be positive"));
        }

        if self.oracle.loop_interval_secs == 0 {
            return Err(eyre!("oracle.loop_interval_secs must be positive"));
        }
        if self.oracle.max_block_span == 0 {
            return Err(eyre!("oracle.max_block_span must be positive"));
        }
        if !self.oracle.min_batch_fee_usd.is_finite() || self.oracle.min_batch_fee_usd < 0.0 {
            return Err(eyre!("oracle.min_batch_fee_usd must be a non-negative number"));
        }

        if self.relayer.loop_interval_secs == 0 {
            return Err(eyre!("relayer.loop_interval_secs must be positive"));
        }
        if self.relayer.valset_search_window == 0 {
            return Err(eyre!("relayer.valset_search_window must be positive"));
        }

        Ok(())
    }

    pub fn peggy_address(&self) -> Result<Address> {
        self.ethereum
            .peggy_address
            .parse()
            .wrap_err("ethereum.peggy_address is not a valid address")
    }
}

impl EthereumConfig {
    pub fn gas_policy(&self) -> GasPolicy {
        GasPolicy {
            price_adjustment: self.gas_price_adjustment,
            max_gas_price: self.max_gas_price,
        }
    }

    pub fn pending_tx_wait(&self) -> Duration {
        Duration::from_secs(self.pending_tx_wait_secs)
    }

    pub fn tx_timeout(&self) -> Duration {
        Duration::from_secs(self.tx_timeout_secs)
    }
}

impl OracleConfig {
    pub fn loop_interval(&self) -> Duration {
        Duration::from_secs(self.loop_interval_secs)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }
}

impl RelayerConfig {
    pub fn loop_interval(&self) -> Duration {
        Duration::from_secs(self.loop_interval_secs)
    }

    pub fn relay_valset_offset(&self) -> Duration {
        Duration::from_secs(self.relay_valset_offset_secs)
    }

    pub fn relay_batch_offset(&self) -> Duration {
        Duration::from_secs(self.relay_batch_offset_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use serial_test::serial;

    const VARS: &[(&str, &str)] = &[
        ("COSMOS_CHAIN_ID", "injective-888"),
        ("COSMOS_LCD_URL", "http://localhost:10337"),
        ("TENDERMINT_RPC_URL", "http://localhost:26657"),
        ("COSMOS_MNEMONIC", "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"),
        ("ETH_RPC_URL", "http://localhost:8545"),
        ("ETH_CHAIN_ID", "31337"),
        ("ETH_PEGGY_ADDRESS", "0x5FbDB2315678afecb367f032d93F642f64180aa3"),
        ("ETH_PRIVATE_KEY", "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"),
    ];

    const OPTIONAL: &[&str] = &[
        "ORCHESTRATOR_MODE",
        "MAX_ATTEMPTS",
        "ERC20_DENOMS",
        "MIN_BATCH_FEE_USD",
        "RELAY_VALSETS",
        "RELAY_BATCHES",
        "ETH_GAS_PRICE_ADJUSTMENT",
        "ETH_MAX_GAS_PRICE",
        "ETH_PENDING_TX_WAIT_SECS",
        "COSMOS_CLAIMS_PER_TX",
    ];

    fn set_required_env() {
        for (key, value) in VARS {
            env::set_var(key, value);
        }
        for key in OPTIONAL {
            env::remove_var(key);
        }
    }

    fn test_config() -> Config {
        Config {
            mode: Mode::Auto,
            max_attempts: 10,
            cosmos: CosmosConfig {
                chain_id: "injective-888".to_string(),
                lcd_url: "http://localhost:10337".to_string(),
                tendermint_rpc_url: "http://localhost:26657".to_string(),
                mnemonic: Secret::new("abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"),
                derivation_path: None,
                account_prefix: "inj".to_string(),
                gas_limit: 400_000,
                gas_price: 0.025,
                fee_denom: "inj".to_string(),
                request_timeout_secs: 30,
                claims_per_tx: 10,
            },
            ethereum: EthereumConfig {
                rpc_url: "http://localhost:8545".to_string(),
                chain_id: 31337,
                peggy_address: "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string(),
                private_key: Secret::new(
                    "0x0000000000000000000000000000000000000000000000000000000000000001",
                ),
                max_block_range: 2000,
                tx_timeout_secs: 120,
                gas_price_adjustment: 1.3,
                max_gas_price: 500_000_000_000,
                pending_tx_wait_secs: 1200,
            },
            oracle: OracleConfig {
                loop_interval_secs: 60,
                confirmation_delay: 12,
                max_block_span: 2000,
                resync_interval_secs: 86400,
                min_batch_fee_usd: 23.3,
                erc20_denoms: HashMap::new(),
                coingecko_api: default_coingecko_api(),
            },
            relayer: RelayerConfig {
                relay_valsets: true,
                relay_valset_offset_secs: 300,
                relay_batches: true,
                relay_batch_offset_secs: 300,
                loop_interval_secs: 300,
                valset_search_window: 2000,
            },
            metrics: MetricsConfig {
                enabled: true,
                bind_address: "0.0.0.0".to_string(),
                port: 9090,
            },
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(default_max_attempts(), 10);
        assert_eq!(default_confirmation_delay(), 12);
        assert_eq!(default_max_block_span(), 2000);
        assert_eq!(default_resync_interval(), 86400);
        assert_eq!(default_relayer_interval(), 300);
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_peggy_address_validation() {
        let mut config = test_config();
        config.ethereum.peggy_address = "0x1234".to_string();
        assert!(config.validate().is_err());

        config.ethereum.peggy_address = "5FbDB2315678afecb367f032d93F642f64180aa3ab".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_private_key_validation() {
        let mut config = test_config();
        config.ethereum.private_key = Secret::new("0x01");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_mnemonic_rejected() {
        let mut config = test_config();
        config.cosmos.mnemonic = Secret::new("abandon abandon about");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut config = test_config();
        config.oracle.loop_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.relayer.valset_search_window = 0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gas_settings_validation() {
        let mut config = test_config();
        config.ethereum.gas_price_adjustment = 0.0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.ethereum.gas_price_adjustment = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.ethereum.max_gas_price = 0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.cosmos.claims_per_tx = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gas_policy_from_config() {
        let policy = test_config().ethereum.gas_policy();
        assert_eq!(policy.price_adjustment, 1.3);
        assert_eq!(policy.max_gas_price, 500_000_000_000);
        assert_eq!(
            test_config().ethereum.pending_tx_wait(),
            Duration::from_secs(1200)
        );
    }

    #[test]
    fn test_negative_min_fee_rejected() {
        let mut config = test_config();
        config.oracle.min_batch_fee_usd = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = test_config();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("abandon"));
        assert!(!debug.contains("0000000000000000000000000000000000000000000000000000000000000001"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("validator".parse::<Mode>().unwrap(), Mode::Validator);
        assert_eq!(" Relayer ".parse::<Mode>().unwrap(), Mode::Relayer);
        assert_eq!("auto".parse::<Mode>().unwrap(), Mode::Auto);
        assert!("oracle".parse::<Mode>().is_err());
    }

    #[test]
    fn test_parse_erc20_denoms() {
        let denoms = parse_erc20_denoms(
            "0xe28b3B32B6c345A34Ff64674606124Dd5Aceca30:inj, 0xdAC17F958D2ee523a2206206994597C13D831ec7:peggy0xdAC17F958D2ee523a2206206994597C13D831ec7",
        )
        .unwrap();

        assert_eq!(denoms.len(), 2);
        assert_eq!(
            denoms[&address!("e28b3B32B6c345A34Ff64674606124Dd5Aceca30")],
            "inj"
        );
        assert!(parse_erc20_denoms("").unwrap().is_empty());
        assert!(parse_erc20_denoms("0xe28b3B32B6c345A34Ff64674606124Dd5Aceca30").is_err());
        assert!(parse_erc20_denoms("notanaddress:inj").is_err());
        assert!(parse_erc20_denoms("0xe28b3B32B6c345A34Ff64674606124Dd5Aceca30:").is_err());
    }

    #[test]
    #[serial]
    fn test_load_from_env_with_defaults() {
        set_required_env();

        let config = Config::load_from_env().unwrap();
        assert_eq!(config.mode, Mode::Auto);
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.ethereum.chain_id, 31337);
        assert_eq!(config.cosmos.account_prefix, "inj");
        assert!(!config.relayer.relay_valsets);
        assert_eq!(config.oracle.loop_interval(), Duration::from_secs(60));
        assert_eq!(config.relayer.loop_interval(), Duration::from_secs(300));
        assert_eq!(config.cosmos.claims_per_tx, 10);
        assert_eq!(config.ethereum.gas_price_adjustment, 1.3);
        assert_eq!(config.ethereum.max_gas_price, 500_000_000_000);
        assert_eq!(config.ethereum.pending_tx_wait_secs, 1200);
        assert_eq!(
            config.peggy_address().unwrap(),
            address!("5FbDB2315678afecb367f032d93F642f64180aa3")
        );
    }

    #[test]
    #[serial]
    fn test_load_from_env_overrides() {
        set_required_env();
        env::set_var("ORCHESTRATOR_MODE", "relayer");
        env::set_var("MAX_ATTEMPTS", "3");
        env::set_var("RELAY_VALSETS", "true");
        env::set_var("MIN_BATCH_FEE_USD", "0");
        env::set_var("ETH_GAS_PRICE_ADJUSTMENT", "1.1");
        env::set_var("ETH_MAX_GAS_PRICE", "80gwei");
        env::set_var("COSMOS_CLAIMS_PER_TX", "25");
        env::set_var(
            "ERC20_DENOMS",
            "0xe28b3B32B6c345A34Ff64674606124Dd5Aceca30:inj",
        );

        let config = Config::load_from_env().unwrap();
        assert_eq!(config.mode, Mode::Relayer);
        assert_eq!(config.max_attempts, 3);
        assert!(config.relayer.relay_valsets);
        assert_eq!(config.oracle.min_batch_fee_usd, 0.0);
        assert_eq!(config.oracle.erc20_denoms.len(), 1);
        assert_eq!(config.ethereum.gas_price_adjustment, 1.1);
        assert_eq!(config.ethereum.max_gas_price, 80_000_000_000);
        assert_eq!(config.cosmos.claims_per_tx, 25);

        for key in OPTIONAL {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_missing_required_var() {
        set_required_env();
        env::remove_var("ETH_RPC_URL");

        let err = Config::load_from_env().unwrap_err();
        assert!(err.to_string().contains("ETH_RPC_URL"));
    }

    #[test]
    #[serial]
    fn test_unparseable_max_gas_price_rejected() {
        set_required_env();
        env::set_var("ETH_MAX_GAS_PRICE", "fast");

        let err = Config::load_from_env().unwrap_err();
        assert!(err.to_string().contains("ETH_MAX_GAS_PRICE"));
        env::remove_var("ETH_MAX_GAS_PRICE");
    }

    #[test]
    #[serial]
    fn test_invalid_mode_rejected() {
        set_required_env();
        env::set_var("ORCHESTRATOR_MODE", "observer");

        assert!(Config::load_from_env().is_err());
        env::remove_var("ORCHESTRATOR_MODE");
    }
}
