//! Profile resolution
//!
//! Resolves every identity address concurrently. Each address either finds a
//! registered name (name record → zone file → profile document) or falls back
//! to the default storage locations. One address failing never affects the
//! others; the batch settles when every lookup has finished.

use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use stackid_ledger::{IdentityRecord, IdentityUpdate, PublicIdentity, Verification};
use std::sync::Arc;

use crate::config::RegistryConfig;
use crate::error::{LookupError, ProofCheckError};
use crate::profile::extract_profile;
use crate::proofs::{validator_for, ProofValidator};
use crate::transport::{HttpRequest, HttpTransport};
use crate::trust::TrustPolicy;
use crate::zonefile::parse_zone_file;

#[derive(Debug, Deserialize)]
struct AddressNames {
    #[serde(default)]
    names: Vec<String>,
}

/// Registry record for a name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NameRecord {
    pub zonefile: String,
    pub address: String,
    #[serde(default)]
    pub expire_block: Option<u64>,
}

/// What the registry says about an address's names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// Address lookup itself failed
    Unknown,
    Unowned,
    Owned(String),
}

/// Profile found for an address
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
    pub profile: Value,
    pub zone_file: Option<String>,
    pub expire_block: Option<u64>,
    pub verifications: Result<(Vec<Verification>, u32), ProofCheckError>,
}

/// Outcome for one address
#[derive(Debug, Clone, PartialEq)]
pub struct AddressResolution {
    pub index: usize,
    pub address: String,
    pub ownership: Ownership,
    /// `Ok(None)`: nothing published and nothing failed
    pub outcome: Result<Option<ResolvedProfile>, LookupError>,
}

impl AddressResolution {
    /// Updates for the identity book, in application order
    pub fn updates(&self) -> Vec<IdentityUpdate> {
        let index = self.index;
        let mut updates = Vec::new();

        match &self.ownership {
            Ownership::Owned(username) => updates.push(IdentityUpdate::UsernameOwned {
                index,
                username: username.clone(),
            }),
            Ownership::Unowned => updates.push(IdentityUpdate::NoUsernameOwned { index }),
            Ownership::Unknown => {}
        }

        match &self.outcome {
            Ok(Some(resolved)) => {
                updates.push(IdentityUpdate::ProfileUpdated {
                    index,
                    profile: resolved.profile.clone(),
                    zone_file: resolved.zone_file.clone(),
                    expire_block: resolved.expire_block,
                });
                // A failed proof check keeps the previous verifications
                if let Ok((verifications, trust_level)) = &resolved.verifications {
                    updates.push(IdentityUpdate::VerificationsUpdated {
                        index,
                        verifications: verifications.clone(),
                        trust_level: *trust_level,
                    });
                }
            }
            Ok(None) => {}
            Err(e) => updates.push(IdentityUpdate::ResolutionFailed {
                index,
                reason: e.to_string(),
            }),
        }
        updates
    }
}

/// Settled results of one refresh, ordered by address index
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionBatch {
    pub results: Vec<AddressResolution>,
}

impl ResolutionBatch {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &LookupError)> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (r.address.as_str(), e)))
    }

    pub fn into_updates(self) -> Vec<IdentityUpdate> {
        self.results.iter().flat_map(AddressResolution::updates).collect()
    }
}

pub struct ProfileResolver {
    config: RegistryConfig,
    transport: Arc<dyn HttpTransport>,
    validator: Arc<dyn ProofValidator>,
    trust: TrustPolicy,
}

impl ProfileResolver {
    /// Resolver using the validator selected by the config
    pub fn new(config: RegistryConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let validator = validator_for(&config, transport.clone());
        Self::with_validator(config, transport, validator)
    }

    pub fn with_validator(
        config: RegistryConfig,
        transport: Arc<dyn HttpTransport>,
        validator: Arc<dyn ProofValidator>,
    ) -> Self {
        let trust = config.trust.clone();
        Self {
            config,
            transport,
            validator,
            trust,
        }
    }

    /// Resolve every address concurrently
    pub async fn resolve_for_addresses(&self, addresses: &[String]) -> ResolutionBatch {
        let Some(first) = addresses.first() else {
            return ResolutionBatch {
                results: Vec::new(),
            };
        };
        log::info!("Resolving {} identity addresses", addresses.len());

        let lookups = addresses
            .iter()
            .enumerate()
            .map(|(index, address)| self.resolve_address(index, address, first));
        let results = join_all(lookups).await;

        let failed = results.iter().filter(|r| r.outcome.is_err()).count();
        if failed > 0 {
            log::warn!("{} of {} identity lookups failed", failed, results.len());
        }
        ResolutionBatch { results }
    }

    async fn resolve_address(&self, index: usize, address: &str, first_address: &str) -> AddressResolution {
        let (ownership, outcome) = match self.names_owned(address).await {
            Err(e) => (Ownership::Unknown, Err(e)),
            Ok(names) if names.is_empty() => {
                log::debug!("{} owns no names, trying default locations", address);
                let outcome = self
                    .default_location_profile(index, address, first_address, None)
                    .await;
                (Ownership::Unowned, outcome)
            }
            Ok(names) => {
                if names.len() > 1 {
                    log::info!(
                        "{} owns {} names, using {}",
                        address,
                        names.len(),
                        names[0]
                    );
                }
                let username = names[0].clone();
                let outcome = self.name_profile(&username, Some(address)).await.map(Some);
                (Ownership::Owned(username), outcome)
            }
        };

        if let Ok(Some(ResolvedProfile {
            verifications: Err(e),
            ..
        })) = &outcome
        {
            log::error!("{}: keeping previous verifications", e);
        }

        AddressResolution {
            index,
            address: address.to_string(),
            ownership,
            outcome,
        }
    }

    async fn names_owned(&self, address: &str) -> Result<Vec<String>, LookupError> {
        let url = self.config.address_url(address);
        let body: AddressNames = self.get_json(address, &url).await?;
        Ok(body.names)
    }

    /// Look up a name and verify its profile.
    ///
    /// `owner_address` is the address the profile token must be issued by;
    /// when absent the registry's owner address is used.
    async fn name_profile(
        &self,
        name: &str,
        owner_address: Option<&str>,
    ) -> Result<ResolvedProfile, LookupError> {
        let record = self.lookup_name(name).await?;
        let owner = owner_address.unwrap_or(&record.address);
        let profile = self.zone_file_profile(name, &record.zonefile, owner).await?;
        let verifications = self.verify(&profile, owner, Some(name)).await;

        Ok(ResolvedProfile {
            profile,
            zone_file: Some(record.zonefile),
            expire_block: record.expire_block,
            verifications,
        })
    }

    /// GET the registry record for `name`
    pub async fn lookup_name(&self, name: &str) -> Result<NameRecord, LookupError> {
        let url = self.config.name_url(name);
        self.get_json(name, &url).await
    }

    /// Dereference a zone file to a verified profile
    pub async fn zone_file_profile(
        &self,
        name: &str,
        zone_file: &str,
        owner_address: &str,
    ) -> Result<Value, LookupError> {
        // Legacy names store the profile itself in place of a zone file
        if let Ok(legacy @ Value::Object(_)) = serde_json::from_str::<Value>(zone_file) {
            log::debug!("{} has a legacy inline profile", name);
            return Ok(legacy);
        }

        let zone = parse_zone_file(zone_file).map_err(|e| LookupError::ZoneFile {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let url = zone
            .profile_url()
            .ok_or_else(|| LookupError::NoProfileLocation {
                name: name.to_string(),
            })?;

        let document: Value = self.get_json(name, &url).await?;
        extract_profile(&document, Some(owner_address)).map_err(|e| LookupError::Profile {
            target: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Try each default storage location in order.
    ///
    /// A 404 means nothing is stored there. Any other failure is remembered,
    /// and when no location yields a profile the last one is returned so a
    /// storage outage is not mistaken for an empty identity.
    async fn default_location_profile(
        &self,
        index: usize,
        address: &str,
        first_address: &str,
        username: Option<&str>,
    ) -> Result<Option<ResolvedProfile>, LookupError> {
        let mut last_error = None;
        for url in self.config.default_profile_urls(address, first_address, index) {
            let document: Value = match self.get_json(address, &url).await {
                Ok(document) => document,
                Err(LookupError::Status { status: 404, .. }) => {
                    log::debug!("No profile at {}", url);
                    continue;
                }
                Err(e) => {
                    log::warn!("Profile location {} unavailable: {}", url, e);
                    last_error = Some(e);
                    continue;
                }
            };
            match extract_profile(&document, Some(address)) {
                Ok(profile) => {
                    log::debug!("Profile for {} found at {}", address, url);
                    let verifications = self.verify(&profile, address, username).await;
                    return Ok(Some(ResolvedProfile {
                        profile,
                        zone_file: None,
                        expire_block: None,
                        verifications,
                    }));
                }
                Err(e) => {
                    log::warn!("Ignoring profile at {}: {}", url, e);
                    last_error = Some(LookupError::Profile {
                        target: address.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        last_error.map_or(Ok(None), Err)
    }

    async fn verify(
        &self,
        profile: &Value,
        address: &str,
        username: Option<&str>,
    ) -> Result<(Vec<Verification>, u32), ProofCheckError> {
        let verifications = self.validator.validate(profile, address, username).await?;
        let level = self.trust.trust_level(&verifications);
        Ok((verifications, level))
    }

    /// Re-run proof checks for one identity
    pub async fn refresh_verifications(
        &self,
        index: usize,
        owner_address: &str,
        username: Option<&str>,
        profile: &Value,
    ) -> Result<IdentityUpdate, ProofCheckError> {
        let (verifications, trust_level) = self.verify(profile, owner_address, username).await?;
        Ok(IdentityUpdate::VerificationsUpdated {
            index,
            verifications,
            trust_level,
        })
    }

    /// Resolve a name owned by someone else.
    ///
    /// Failures are kept on the record rather than returned, so the caller
    /// can still show the username.
    pub async fn fetch_public_identity(&self, username: &str) -> PublicIdentity {
        let record = match self.lookup_name(username).await {
            Err(e) => {
                log::error!("Public identity {}: {}", username, e);
                IdentityRecord {
                    username: Some(username.to_string()),
                    last_error: Some(e.to_string()),
                    ..Default::default()
                }
            }
            Ok(name) => {
                let mut record = IdentityRecord {
                    owner_address: name.address.clone(),
                    username: Some(username.to_string()),
                    zone_file: Some(name.zonefile.clone()),
                    expire_block: name.expire_block,
                    ..Default::default()
                };
                match self
                    .zone_file_profile(username, &name.zonefile, &name.address)
                    .await
                {
                    Ok(profile) => {
                        match self.verify(&profile, &name.address, Some(username)).await {
                            Ok((verifications, level)) => {
                                record.verifications = verifications;
                                record.trust_level = level;
                            }
                            Err(e) => log::error!("Public identity {}: {}", username, e),
                        }
                        record.profile = Some(profile);
                    }
                    Err(e) => {
                        log::error!("Public identity {}: {}", username, e);
                        record.last_error = Some(e.to_string());
                    }
                }
                record
            }
        };

        PublicIdentity {
            username: username.to_string(),
            record,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        target: &str,
        url: &str,
    ) -> Result<T, LookupError> {
        let response = self
            .transport
            .send(HttpRequest::get(url))
            .await
            .map_err(|source| LookupError::Transport {
                target: target.to_string(),
                source,
            })?;
        if !response.is_success() {
            return Err(LookupError::Status {
                target: target.to_string(),
                status: response.status,
            });
        }
        response.json(url).map_err(|source| LookupError::Transport {
            target: target.to_string(),
            source,
        })
    }
}
