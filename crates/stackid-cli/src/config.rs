//! CLI configuration, parsed from TOML plus environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stackid_registry::RegistryConfig;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    #[serde(default)]
    pub wallet: WalletSection,

    /// Registry endpoints, proof checking and trust policy
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Local wallet settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSection {
    /// Directory holding the ledger snapshot
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Bitcoin network: "bitcoin", "testnet", "signet", "regtest"
    #[serde(default = "default_network")]
    pub network: String,
}

impl Default for WalletSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            network: default_network(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("stackid-data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_network() -> String {
    "bitcoin".to_string()
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `STACKID_DATA_DIR`
    /// - `STACKID_LOG_LEVEL`
    /// - `STACKID_NETWORK`
    /// - `STACKID_CORE_API_PASSWORD`
    /// - `STACKID_NAME_LOOKUP_URL`
    /// - `STACKID_ADDRESS_LOOKUP_URL`
    /// - `STACKID_GAIA_URL_PREFIX`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("STACKID_DATA_DIR") {
            self.wallet.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("STACKID_LOG_LEVEL") {
            self.wallet.log_level = v;
        }
        if let Ok(v) = std::env::var("STACKID_NETWORK") {
            self.wallet.network = v;
        }
        if let Ok(v) = std::env::var("STACKID_CORE_API_PASSWORD") {
            self.registry.core_api_password = Some(v);
        }
        if let Ok(v) = std::env::var("STACKID_NAME_LOOKUP_URL") {
            self.registry.name_lookup_url = v;
        }
        if let Ok(v) = std::env::var("STACKID_ADDRESS_LOOKUP_URL") {
            self.registry.address_lookup_url = v;
        }
        if let Ok(v) = std::env::var("STACKID_GAIA_URL_PREFIX") {
            self.registry.gaia_url_prefix = v;
        }
    }

    /// Parse the network string to a `bitcoin::Network`.
    pub fn network(&self) -> bitcoin::Network {
        match self.wallet.network.as_str() {
            "testnet" | "testnet3" => bitcoin::Network::Testnet,
            "signet" => bitcoin::Network::Signet,
            "regtest" => bitcoin::Network::Regtest,
            _ => bitcoin::Network::Bitcoin,
        }
    }

    /// Where the ledger snapshot lives
    pub fn snapshot_path(&self) -> PathBuf {
        self.wallet.data_dir.join("ledger.json")
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            LOG_LEVELS.contains(&self.wallet.log_level.as_str()),
            "wallet.log_level must be one of {:?}",
            LOG_LEVELS
        );
        anyhow::ensure!(
            ["bitcoin", "testnet", "testnet3", "signet", "regtest"]
                .contains(&self.wallet.network.as_str()),
            "wallet.network {:?} is not a known network",
            self.wallet.network
        );

        let registry = &self.registry;
        anyhow::ensure!(
            registry.name_lookup_url.contains("{name}"),
            "registry.name_lookup_url must contain {{name}}"
        );
        anyhow::ensure!(
            registry.address_lookup_url.contains("{address}"),
            "registry.address_lookup_url must contain {{address}}"
        );
        anyhow::ensure!(
            registry.address_balance_url.contains("{address}"),
            "registry.address_balance_url must contain {{address}}"
        );
        anyhow::ensure!(
            registry.zone_file_update_url.contains("{name}")
                && registry.name_transfer_url.contains("{name}"),
            "registry broadcast URLs must contain {{name}}"
        );
        anyhow::ensure!(
            registry.gaia_url_prefix.ends_with('/'),
            "registry.gaia_url_prefix must end with '/'"
        );
        anyhow::ensure!(
            registry.request_timeout_secs > 0,
            "registry.request_timeout_secs must be > 0"
        );
        anyhow::ensure!(
            registry.owner_key.suffix_hex.len() % 2 == 0
                && registry
                    .owner_key
                    .suffix_hex
                    .chars()
                    .all(|c| c.is_ascii_hexdigit()),
            "registry.owner_key.suffix_hex must be hex"
        );

        Ok(())
    }
}
