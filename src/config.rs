//! Configuration module
//!
//! Settings are layered, lowest precedence first:
//! 1. built-in defaults
//! 2. optional TOML file (`--config`)
//! 3. environment (including `.env`), read by clap
//! 4. command-line flags
//!
//! Clap merges 3 and 4 into [`ConfigOverrides`]; [`Config::resolve`] lays
//! those over the file and the defaults and validates the result.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use zeroize::Zeroizing;

use crate::ledger::RpcLedgerConfig;
use crate::reclaim::{
    batch::{
        DEFAULT_COMPUTE_UNIT_LIMIT, DEFAULT_COMPUTE_UNIT_PRICE, DEFAULT_MAX_INSTRUCTIONS,
    },
    BatchLimits, ExecutionMode, ProtectedMintSet, ReclaimError, ReclaimSettings,
    DEFAULT_BALANCE_CONCURRENCY,
};
use crate::wallet::WalletManager;

/// Contents of the optional TOML config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub rpc_endpoint: Option<String>,
    pub private_key: Option<String>,
    pub keypair_path: Option<String>,
    pub skip_usdc: Option<bool>,
    pub protected_mints: Vec<String>,
    pub max_instructions: Option<usize>,
    pub compute_unit_price: Option<u64>,
    pub compute_unit_limit: Option<u32>,
    pub dry_run: Option<bool>,
    pub rpc_timeout_secs: Option<u64>,
    pub confirm_timeout_secs: Option<u64>,
    pub balance_concurrency: Option<usize>,
    pub explorer_url: Option<String>,
}

impl FileConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ReclaimError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReclaimError::config(format!("Failed to read {}: {}", path, e)))?;
        toml::from_str(&content)
            .map_err(|e| ReclaimError::config(format!("Failed to parse {}: {}", path, e)))
    }
}

/// Values supplied by the command line or environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub rpc_endpoint: Option<String>,
    pub private_key: Option<String>,
    pub keypair_path: Option<String>,
    pub skip_usdc: Option<bool>,
    pub protected_mints: Vec<String>,
    pub max_instructions: Option<usize>,
    pub compute_unit_price: Option<u64>,
    pub compute_unit_limit: Option<u32>,
    pub dry_run: Option<bool>,
    pub rpc_timeout_secs: Option<u64>,
    pub confirm_timeout_secs: Option<u64>,
    pub balance_concurrency: Option<usize>,
    pub explorer_url: Option<String>,
}

/// Where the signing key comes from
pub enum KeySource {
    /// Base58-encoded 64-byte keypair
    PrivateKey(Zeroizing<String>),
    /// Path to a keypair file
    KeypairFile(String),
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::PrivateKey(_) => f.write_str("PrivateKey(<redacted>)"),
            KeySource::KeypairFile(path) => f.debug_tuple("KeypairFile").field(path).finish(),
        }
    }
}

/// Fully resolved and validated configuration
#[derive(Debug)]
pub struct Config {
    pub rpc_endpoint: String,
    pub key_source: KeySource,
    pub skip_usdc: bool,
    pub protected_mints: Vec<Pubkey>,
    pub max_instructions: usize,
    pub compute_unit_price: u64,
    pub compute_unit_limit: u32,
    pub dry_run: bool,
    pub rpc_timeout_secs: u64,
    pub confirm_timeout_secs: u64,
    pub balance_concurrency: usize,
    pub explorer_url: String,
}

// Default value functions
fn default_true() -> bool { true }
fn default_rpc_timeout() -> u64 { 30 }
fn default_confirm_timeout() -> u64 { 60 }
fn default_explorer_url() -> String { "https://solscan.io/tx/".to_string() }

impl Config {
    /// Merge overrides over the file config and defaults, then validate
    pub fn resolve(file: FileConfig, cli: ConfigOverrides) -> Result<Self, ReclaimError> {
        let rpc_endpoint = cli
            .rpc_endpoint
            .or(file.rpc_endpoint)
            .ok_or_else(|| ReclaimError::config("RPC endpoint is required (--rpc-endpoint or RPC_ENDPOINT)"))?;

        // A key given on a higher layer replaces both key kinds from lower layers
        let (private_key, keypair_path) = if cli.private_key.is_some() || cli.keypair_path.is_some() {
            (cli.private_key, cli.keypair_path)
        } else {
            (file.private_key, file.keypair_path)
        };
        let key_source = match (private_key, keypair_path) {
            (Some(key), None) => KeySource::PrivateKey(Zeroizing::new(key)),
            (None, Some(path)) => KeySource::KeypairFile(path),
            (Some(_), Some(_)) => {
                return Err(ReclaimError::config(
                    "Specify either a private key or a keypair path, not both",
                ))
            }
            (None, None) => {
                return Err(ReclaimError::config(
                    "Private key is required (--private-key / PRIVATE_KEY or --keypair-path)",
                ))
            }
        };

        let mint_strings = if cli.protected_mints.is_empty() {
            file.protected_mints
        } else {
            cli.protected_mints
        };
        let protected_mints = mint_strings
            .iter()
            .map(|s| {
                Pubkey::from_str(s)
                    .map_err(|e| ReclaimError::config(format!("Invalid protected mint '{}': {}", s, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let config = Self {
            rpc_endpoint,
            key_source,
            skip_usdc: cli.skip_usdc.or(file.skip_usdc).unwrap_or_else(default_true),
            protected_mints,
            max_instructions: cli
                .max_instructions
                .or(file.max_instructions)
                .unwrap_or(DEFAULT_MAX_INSTRUCTIONS),
            compute_unit_price: cli
                .compute_unit_price
                .or(file.compute_unit_price)
                .unwrap_or(DEFAULT_COMPUTE_UNIT_PRICE),
            compute_unit_limit: cli
                .compute_unit_limit
                .or(file.compute_unit_limit)
                .unwrap_or(DEFAULT_COMPUTE_UNIT_LIMIT),
            dry_run: cli.dry_run.or(file.dry_run).unwrap_or(false),
            rpc_timeout_secs: cli
                .rpc_timeout_secs
                .or(file.rpc_timeout_secs)
                .unwrap_or_else(default_rpc_timeout),
            confirm_timeout_secs: cli
                .confirm_timeout_secs
                .or(file.confirm_timeout_secs)
                .unwrap_or_else(default_confirm_timeout),
            balance_concurrency: cli
                .balance_concurrency
                .or(file.balance_concurrency)
                .unwrap_or(DEFAULT_BALANCE_CONCURRENCY),
            explorer_url: cli
                .explorer_url
                .or(file.explorer_url)
                .unwrap_or_else(default_explorer_url),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ReclaimError> {
        if !(self.rpc_endpoint.starts_with("http://") || self.rpc_endpoint.starts_with("https://")) {
            return Err(ReclaimError::config(format!(
                "RPC endpoint must be an http(s) URL, got '{}'",
                self.rpc_endpoint
            )));
        }
        if self.rpc_timeout_secs == 0 {
            return Err(ReclaimError::config("rpc_timeout_secs must be > 0"));
        }
        if self.confirm_timeout_secs == 0 {
            return Err(ReclaimError::config("confirm_timeout_secs must be > 0"));
        }
        if self.balance_concurrency == 0 {
            return Err(ReclaimError::config("balance_concurrency must be > 0"));
        }
        // Range checks for packing limits live with the packer
        self.batch_limits()?;
        Ok(())
    }

    pub fn batch_limits(&self) -> Result<BatchLimits, ReclaimError> {
        BatchLimits::new(
            self.max_instructions,
            self.compute_unit_price,
            self.compute_unit_limit,
        )
    }

    /// Pipeline settings derived from this config
    pub fn reclaim_settings(&self) -> Result<ReclaimSettings, ReclaimError> {
        Ok(ReclaimSettings {
            protected: ProtectedMintSet::from_config(
                self.skip_usdc,
                self.protected_mints.iter().copied(),
            ),
            limits: self.batch_limits()?,
            mode: if self.dry_run {
                ExecutionMode::DryRun
            } else {
                ExecutionMode::Live
            },
            balance_concurrency: self.balance_concurrency,
        })
    }

    pub fn ledger_config(&self) -> RpcLedgerConfig {
        RpcLedgerConfig {
            endpoint: self.rpc_endpoint.clone(),
            request_timeout: Duration::from_secs(self.rpc_timeout_secs),
            confirm_timeout: Duration::from_secs(self.confirm_timeout_secs),
        }
    }

    /// Decode the signing identity
    pub fn load_wallet(&self) -> Result<WalletManager, ReclaimError> {
        match &self.key_source {
            KeySource::PrivateKey(key) => WalletManager::from_base58(key),
            KeySource::KeypairFile(path) => WalletManager::from_file(path),
        }
    }

    /// Explorer link for a transaction signature
    pub fn explorer_link(&self, signature: &impl std::fmt::Display) -> String {
        format!("{}{}", self.explorer_url, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reclaim::classifier::usdc_mint;
    use std::io::Write;

    fn minimal_cli() -> ConfigOverrides {
        ConfigOverrides {
            rpc_endpoint: Some("https://api.mainnet-beta.solana.com".to_string()),
            private_key: Some("key".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::resolve(FileConfig::default(), minimal_cli()).unwrap();
        assert!(config.skip_usdc);
        assert_eq!(config.max_instructions, 22);
        assert_eq!(config.compute_unit_price, 220_000);
        assert_eq!(config.compute_unit_limit, 350_000);
        assert!(!config.dry_run);
        assert_eq!(config.explorer_url, "https://solscan.io/tx/");

        let settings = config.reclaim_settings().unwrap();
        assert!(settings.protected.contains(&usdc_mint()));
        assert_eq!(settings.mode, ExecutionMode::Live);
    }

    #[test]
    fn test_missing_endpoint_or_key_is_config_error() {
        let cli = ConfigOverrides {
            rpc_endpoint: None,
            ..minimal_cli()
        };
        assert!(matches!(
            Config::resolve(FileConfig::default(), cli),
            Err(ReclaimError::Config(_))
        ));

        let cli = ConfigOverrides {
            private_key: None,
            ..minimal_cli()
        };
        let err = Config::resolve(FileConfig::default(), cli).unwrap_err();
        assert!(err.to_string().contains("Private key is required"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig {
            rpc_endpoint: Some("http://file-endpoint:8899".to_string()),
            max_instructions: Some(10),
            compute_unit_price: Some(5),
            skip_usdc: Some(false),
            ..FileConfig::default()
        };
        let cli = ConfigOverrides {
            max_instructions: Some(12),
            ..minimal_cli()
        };

        let config = Config::resolve(file, cli).unwrap();
        assert_eq!(config.rpc_endpoint, "https://api.mainnet-beta.solana.com");
        assert_eq!(config.max_instructions, 12);
        assert_eq!(config.compute_unit_price, 5);
        assert!(!config.skip_usdc);
    }

    #[test]
    fn test_dry_run_from_file_can_be_switched_off() {
        let file = FileConfig {
            dry_run: Some(true),
            ..FileConfig::default()
        };
        let config = Config::resolve(file.clone(), minimal_cli()).unwrap();
        assert!(config.dry_run);

        let cli = ConfigOverrides {
            dry_run: Some(false),
            ..minimal_cli()
        };
        let config = Config::resolve(file, cli).unwrap();
        assert!(!config.dry_run);
        assert_eq!(
            config.reclaim_settings().unwrap().mode,
            ExecutionMode::Live
        );
    }

    #[test]
    fn test_cli_key_replaces_file_keypair_path() {
        let file = FileConfig {
            keypair_path: Some("/etc/keys/id.json".to_string()),
            ..FileConfig::default()
        };
        let config = Config::resolve(file, minimal_cli()).unwrap();
        assert!(matches!(config.key_source, KeySource::PrivateKey(_)));
    }

    #[test]
    fn test_both_key_kinds_rejected() {
        let cli = ConfigOverrides {
            keypair_path: Some("/tmp/id.json".to_string()),
            ..minimal_cli()
        };
        assert!(Config::resolve(FileConfig::default(), cli).is_err());
    }

    #[test]
    fn test_validation_ranges() {
        let cases = vec![
            ConfigOverrides {
                rpc_endpoint: Some("ws://localhost:8900".to_string()),
                ..minimal_cli()
            },
            ConfigOverrides {
                max_instructions: Some(1),
                ..minimal_cli()
            },
            ConfigOverrides {
                compute_unit_limit: Some(0),
                ..minimal_cli()
            },
            ConfigOverrides {
                balance_concurrency: Some(0),
                ..minimal_cli()
            },
            ConfigOverrides {
                protected_mints: vec!["not-a-pubkey".to_string()],
                ..minimal_cli()
            },
        ];

        for cli in cases {
            let result = Config::resolve(FileConfig::default(), cli);
            assert!(matches!(result, Err(ReclaimError::Config(_))));
        }
    }

    #[test]
    fn test_protected_mints_extend_set() {
        let extra = Pubkey::new_unique();
        let cli = ConfigOverrides {
            skip_usdc: Some(false),
            protected_mints: vec![extra.to_string()],
            ..minimal_cli()
        };
        let settings = Config::resolve(FileConfig::default(), cli)
            .unwrap()
            .reclaim_settings()
            .unwrap();
        assert!(settings.protected.contains(&extra));
        assert!(!settings.protected.contains(&usdc_mint()));
    }

    #[test]
    fn test_file_config_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
rpc_endpoint = "https://rpc.example.com"
keypair_path = "/home/user/.config/solana/id.json"
max_instructions = 16
dry_run = true
protected_mints = ["Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"]
"#
        )
        .unwrap();

        let parsed = FileConfig::from_file(file.path().to_str().unwrap()).unwrap();
        let config = Config::resolve(parsed, ConfigOverrides::default()).unwrap();
        assert_eq!(config.rpc_endpoint, "https://rpc.example.com");
        assert_eq!(config.max_instructions, 16);
        assert!(config.dry_run);
        assert_eq!(config.protected_mints.len(), 1);
        assert!(matches!(config.key_source, KeySource::KeypairFile(_)));
    }

    #[test]
    fn test_file_config_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_instuctions = 3").unwrap();
        assert!(FileConfig::from_file(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_key_source_debug_is_redacted() {
        let source = KeySource::PrivateKey(Zeroizing::new("secret-material".to_string()));
        assert!(!format!("{:?}", source).contains("secret-material"));
    }

    #[test]
    fn test_explorer_link() {
        let config = Config::resolve(FileConfig::default(), minimal_cli()).unwrap();
        assert_eq!(config.explorer_link(&"abc"), "https://solscan.io/tx/abc");
    }
}
