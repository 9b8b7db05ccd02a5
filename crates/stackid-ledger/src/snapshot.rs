//! Durable ledger snapshot
//!
//! Only what cannot be refetched is persisted: the encrypted secret, the two
//! public keychains, derived addresses and indices. Balances, the core wallet
//! and withdrawal progress are rebuilt from the network on the next refresh.

use serde::{Deserialize, Serialize};
use stackid_core::{DerivedKeypair, EncryptedSecret};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::identity::IdentityBook;
use crate::ledger::{AccountLedger, IdentityChainState, PaymentChainState};

/// Errors from snapshot persistence
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot is inconsistent: {0}")]
    Inconsistent(String),
}

/// Persisted identity chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StoredIdentityChain {
    pub public_keychain: Option<String>,
    pub addresses: Vec<String>,
    /// Public halves only
    pub keypairs: Vec<DerivedKeypair>,
    pub address_index: u32,
}

/// Persisted payment chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StoredPaymentChain {
    pub public_keychain: Option<String>,
    pub addresses: Vec<String>,
    pub address_index: u32,
}

/// On-disk form of the account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LedgerSnapshot {
    pub encrypted_secret: Option<EncryptedSecret>,
    pub identity: StoredIdentityChain,
    pub payment: StoredPaymentChain,
    #[serde(default)]
    pub identities: IdentityBook,
}

impl LedgerSnapshot {
    /// Capture the durable subset of a ledger
    pub fn capture(ledger: &AccountLedger, identities: &IdentityBook) -> Self {
        if !ledger.account_created {
            return Self::default();
        }
        Self {
            encrypted_secret: ledger.encrypted_secret.clone(),
            identity: StoredIdentityChain {
                public_keychain: ledger.identity.public_keychain.clone(),
                addresses: ledger.identity.addresses.clone(),
                keypairs: ledger
                    .identity
                    .keypairs
                    .iter()
                    .map(DerivedKeypair::public_only)
                    .collect(),
                address_index: ledger.identity.address_index,
            },
            payment: StoredPaymentChain {
                public_keychain: ledger.payment.public_keychain.clone(),
                addresses: ledger.payment.addresses.clone(),
                address_index: ledger.payment.address_index,
            },
            identities: identities.clone(),
        }
    }

    /// True when the snapshot holds a created account
    pub fn has_account(&self) -> bool {
        self.encrypted_secret.is_some()
    }

    /// Rebuild the ledger and identity book
    pub fn restore(&self) -> Result<(AccountLedger, IdentityBook), SnapshotError> {
        if !self.has_account() {
            return Ok((AccountLedger::new(), IdentityBook::new()));
        }

        let ledger = AccountLedger {
            account_created: true,
            encrypted_secret: self.encrypted_secret.clone(),
            identity: IdentityChainState {
                public_keychain: self.identity.public_keychain.clone(),
                addresses: self.identity.addresses.clone(),
                keypairs: self.identity.keypairs.clone(),
                address_index: self.identity.address_index,
            },
            payment: PaymentChainState {
                public_keychain: self.payment.public_keychain.clone(),
                addresses: self.payment.addresses.clone(),
                address_index: self.payment.address_index,
                ..Default::default()
            },
            ..Default::default()
        };

        if !ledger.is_consistent() {
            return Err(SnapshotError::Inconsistent(
                "address count does not match address index".into(),
            ));
        }
        ledger
            .verify_addresses()
            .map_err(|e| SnapshotError::Inconsistent(e.to_string()))?;

        let mut identities = self.identities.clone();
        if identities.local.is_empty() {
            identities = IdentityBook::for_addresses(&ledger.identity.addresses);
        }
        Ok((ledger, identities))
    }

    /// Load snapshot from file, or an empty one if the file does not exist
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let snapshot: LedgerSnapshot = serde_json::from_str(&contents)?;
            log::debug!("Loaded snapshot from {}", path.display());
            Ok(snapshot)
        } else {
            Ok(Self::default())
        }
    }

    /// Save snapshot to file
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        log::debug!("Saved snapshot to {}", path.display());
        Ok(())
    }
}
