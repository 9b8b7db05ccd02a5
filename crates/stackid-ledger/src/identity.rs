//! Identity records
//!
//! One [`IdentityRecord`] per identity address, plus records for names looked
//! up on behalf of the user. Resolver output arrives as [`IdentityUpdate`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::LedgerError;

/// Outcome of checking one social proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub service: String,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_url: Option<String>,
    pub valid: bool,
    /// Set when the proof could not be checked at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Verification {
    pub fn valid(service: &str, identifier: &str, proof_url: Option<String>) -> Self {
        Self {
            service: service.to_string(),
            identifier: identifier.to_string(),
            proof_url,
            valid: true,
            error: None,
        }
    }

    pub fn invalid(service: &str, identifier: &str, proof_url: Option<String>) -> Self {
        Self {
            valid: false,
            ..Self::valid(service, identifier, proof_url)
        }
    }

    /// Proof that could not be fetched or checked
    pub fn unchecked(
        service: &str,
        identifier: &str,
        proof_url: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            ..Self::valid(service, identifier, proof_url)
        }
    }

    pub fn is_transient(&self) -> bool {
        self.error.is_some()
    }
}

/// Resolved state of one identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IdentityRecord {
    pub owner_address: String,
    pub username: Option<String>,
    pub zone_file: Option<String>,
    pub profile: Option<Value>,
    pub expire_block: Option<u64>,
    pub verifications: Vec<Verification>,
    pub trust_level: u32,
    /// Most recent resolution failure; cleared by the next success
    pub last_error: Option<String>,
}

impl IdentityRecord {
    pub fn new(owner_address: impl Into<String>) -> Self {
        Self {
            owner_address: owner_address.into(),
            ..Default::default()
        }
    }
}

/// A name looked up by the user, not owned by this account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicIdentity {
    pub username: String,
    pub record: IdentityRecord,
}

/// Changes to the identity book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentityUpdate {
    IdentityCreated {
        index: usize,
        owner_address: String,
    },
    UsernameOwned {
        index: usize,
        username: String,
    },
    NoUsernameOwned {
        index: usize,
    },
    ProfileUpdated {
        index: usize,
        profile: Value,
        zone_file: Option<String>,
        expire_block: Option<u64>,
    },
    VerificationsUpdated {
        index: usize,
        verifications: Vec<Verification>,
        trust_level: u32,
    },
    ResolutionFailed {
        index: usize,
        reason: String,
    },
    DefaultIdentitySet {
        index: usize,
    },
    PublicIdentityUpdated(PublicIdentity),
}

/// All identity records known to the wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IdentityBook {
    pub local: Vec<IdentityRecord>,
    pub default_identity: usize,
    pub public: BTreeMap<String, PublicIdentity>,
}

impl IdentityBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Book with one empty record per identity address
    pub fn for_addresses(addresses: &[String]) -> Self {
        Self {
            local: addresses.iter().map(IdentityRecord::new).collect(),
            ..Default::default()
        }
    }

    pub fn get(&self, index: usize) -> Option<&IdentityRecord> {
        self.local.get(index)
    }

    pub fn default_record(&self) -> Option<&IdentityRecord> {
        self.local.get(self.default_identity)
    }

    /// Apply one update, producing the next book
    pub fn apply(&self, update: IdentityUpdate) -> Result<IdentityBook, LedgerError> {
        let mut next = self.clone();
        match update {
            IdentityUpdate::IdentityCreated {
                index,
                owner_address,
            } => {
                if index != next.local.len() {
                    return Err(LedgerError::Rejected(format!(
                        "identity {} created out of order (have {})",
                        index,
                        next.local.len()
                    )));
                }
                next.local.push(IdentityRecord::new(owner_address));
            }
            IdentityUpdate::UsernameOwned { index, username } => {
                next.record_mut(index)?.username = Some(username);
            }
            IdentityUpdate::NoUsernameOwned { index } => {
                next.record_mut(index)?.username = None;
            }
            IdentityUpdate::ProfileUpdated {
                index,
                profile,
                zone_file,
                expire_block,
            } => {
                let record = next.record_mut(index)?;
                record.profile = Some(profile);
                if zone_file.is_some() {
                    record.zone_file = zone_file;
                }
                if expire_block.is_some() {
                    record.expire_block = expire_block;
                }
                record.last_error = None;
            }
            IdentityUpdate::VerificationsUpdated {
                index,
                verifications,
                trust_level,
            } => {
                let record = next.record_mut(index)?;
                record.verifications = verifications;
                record.trust_level = trust_level;
            }
            IdentityUpdate::ResolutionFailed { index, reason } => {
                log::warn!("Resolution of identity {} failed: {}", index, reason);
                next.record_mut(index)?.last_error = Some(reason);
            }
            IdentityUpdate::DefaultIdentitySet { index } => {
                next.record_mut(index)?;
                next.default_identity = index;
            }
            IdentityUpdate::PublicIdentityUpdated(identity) => {
                next.public.insert(identity.username.clone(), identity);
            }
        }
        Ok(next)
    }

    /// Apply updates in order, stopping at the first rejection
    pub fn apply_all<I>(&self, updates: I) -> Result<IdentityBook, LedgerError>
    where
        I: IntoIterator<Item = IdentityUpdate>,
    {
        updates
            .into_iter()
            .try_fold(self.clone(), |book, update| book.apply(update))
    }

    fn record_mut(&mut self, index: usize) -> Result<&mut IdentityRecord, LedgerError> {
        self.local
            .get_mut(index)
            .ok_or_else(|| LedgerError::Rejected(format!("no identity at index {}", index)))
    }
}
