//! Registry endpoints and policies
//!
//! URL templates use `{name}` and `{address}` placeholders.

use serde::{Deserialize, Serialize};

use crate::trust::TrustPolicy;

/// Which key material is sent as `owner_key`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKeySource {
    PublicKey,
    PrivateKey,
}

/// Owner key encoding expected by the registry node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerKeyFormat {
    #[serde(default = "default_owner_key_source")]
    pub source: OwnerKeySource,
    /// Appended to the key hex; `01` marks a compressed key
    #[serde(default = "default_owner_key_suffix")]
    pub suffix_hex: String,
}

impl Default for OwnerKeyFormat {
    fn default() -> Self {
        Self {
            source: default_owner_key_source(),
            suffix_hex: default_owner_key_suffix(),
        }
    }
}

/// How proofs are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProofMode {
    /// POST to the validation service
    #[default]
    Service,
    /// Fetch each proof URL directly
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_name_lookup_url")]
    pub name_lookup_url: String,

    #[serde(default = "default_address_lookup_url")]
    pub address_lookup_url: String,

    #[serde(default = "default_gaia_url_prefix")]
    pub gaia_url_prefix: String,

    #[serde(default = "default_proof_validation_url")]
    pub proof_validation_url: String,

    #[serde(default = "default_zone_file_update_url")]
    pub zone_file_update_url: String,

    #[serde(default = "default_name_transfer_url")]
    pub name_transfer_url: String,

    #[serde(default = "default_address_balance_url")]
    pub address_balance_url: String,

    #[serde(default = "default_wallet_payment_address_url")]
    pub wallet_payment_address_url: String,

    #[serde(default = "default_core_wallet_withdraw_url")]
    pub core_wallet_withdraw_url: String,

    /// Bearer secret for the local registry node
    #[serde(default)]
    pub core_api_password: Option<String>,

    #[serde(default)]
    pub owner_key: OwnerKeyFormat,

    #[serde(default)]
    pub proof_mode: ProofMode,

    #[serde(default)]
    pub trust: TrustPolicy,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_owner_key_source() -> OwnerKeySource {
    OwnerKeySource::PublicKey
}

fn default_owner_key_suffix() -> String {
    "01".to_string()
}

fn default_name_lookup_url() -> String {
    "http://localhost:6270/v1/names/{name}".to_string()
}

fn default_address_lookup_url() -> String {
    "http://localhost:6270/v1/addresses/{address}".to_string()
}

fn default_gaia_url_prefix() -> String {
    "https://gaia.blockstack.org/hub/".to_string()
}

fn default_proof_validation_url() -> String {
    "https://proofs.blockstack.org/validate/".to_string()
}

fn default_zone_file_update_url() -> String {
    "http://localhost:6270/v1/names/{name}/zonefile".to_string()
}

fn default_name_transfer_url() -> String {
    "http://localhost:6270/v1/names/{name}/owner".to_string()
}

fn default_address_balance_url() -> String {
    "https://explorer.blockstack.org/insight-api/addr/{address}/?noTxList=1".to_string()
}

fn default_wallet_payment_address_url() -> String {
    "http://localhost:6270/v1/wallet/payment_address".to_string()
}

fn default_core_wallet_withdraw_url() -> String {
    "http://localhost:6270/v1/wallet/balance".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name_lookup_url: default_name_lookup_url(),
            address_lookup_url: default_address_lookup_url(),
            gaia_url_prefix: default_gaia_url_prefix(),
            proof_validation_url: default_proof_validation_url(),
            zone_file_update_url: default_zone_file_update_url(),
            name_transfer_url: default_name_transfer_url(),
            address_balance_url: default_address_balance_url(),
            wallet_payment_address_url: default_wallet_payment_address_url(),
            core_wallet_withdraw_url: default_core_wallet_withdraw_url(),
            core_api_password: None,
            owner_key: OwnerKeyFormat::default(),
            proof_mode: ProofMode::default(),
            trust: TrustPolicy::default(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl RegistryConfig {
    pub fn name_url(&self, name: &str) -> String {
        self.name_lookup_url.replace("{name}", name)
    }

    pub fn address_url(&self, address: &str) -> String {
        self.address_lookup_url.replace("{address}", address)
    }

    pub fn balance_url(&self, address: &str) -> String {
        self.address_balance_url.replace("{address}", address)
    }

    pub fn zone_file_url(&self, name: &str) -> String {
        self.zone_file_update_url.replace("{name}", name)
    }

    pub fn transfer_url(&self, name: &str) -> String {
        self.name_transfer_url.replace("{name}", name)
    }

    /// Default profile locations for identity `index`, in lookup order
    pub fn default_profile_urls(&self, address: &str, first_address: &str, index: usize) -> Vec<String> {
        vec![
            format!("{}{}/profile.json", self.gaia_url_prefix, address),
            format!("{}{}/{}/profile.json", self.gaia_url_prefix, first_address, index),
        ]
    }
}
