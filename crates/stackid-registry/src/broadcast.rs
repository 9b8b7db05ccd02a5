//! Name-registry broadcasts
//!
//! Zone file updates and name transfers are PUT to the local registry node,
//! authorized with the core API password and signed off by the owner key of
//! the identity that holds the name.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use stackid_core::DerivedKeypair;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{OwnerKeySource, RegistryConfig};
use crate::error::BroadcastError;
use crate::transport::{HttpRequest, HttpTransport};

/// Progress of the latest broadcast for a name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum BroadcastStatus {
    Broadcasting,
    Broadcasted,
    BroadcastError(String),
}

impl BroadcastStatus {
    pub fn from_result(result: &Result<(), BroadcastError>) -> Self {
        match result {
            Ok(()) => BroadcastStatus::Broadcasted,
            Err(e) => BroadcastStatus::BroadcastError(e.to_string()),
        }
    }
}

/// Per-name broadcast status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NameBroadcasts {
    pub by_name: BTreeMap<String, BroadcastStatus>,
}

impl NameBroadcasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, name: &str, status: BroadcastStatus) -> NameBroadcasts {
        let mut next = self.clone();
        next.by_name.insert(name.to_string(), status);
        next
    }

    pub fn status(&self, name: &str) -> Option<&BroadcastStatus> {
        self.by_name.get(name)
    }
}

/// Operation to publish for a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameOperation {
    ZoneFileUpdate { zone_file: String },
    Transfer { new_owner_address: String },
}

#[derive(Debug, Clone)]
pub struct BroadcastRequest {
    pub name: String,
    pub keypair: DerivedKeypair,
    pub operation: NameOperation,
}

pub struct Broadcaster {
    config: RegistryConfig,
    transport: Arc<dyn HttpTransport>,
}

impl Broadcaster {
    pub fn new(config: RegistryConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Owner key as the registry node expects it
    pub fn owner_key(&self, name: &str, keypair: &DerivedKeypair) -> Result<String, BroadcastError> {
        let format = &self.config.owner_key;
        if hex::decode(&format.suffix_hex).is_err() {
            return Err(BroadcastError::OwnerKey {
                name: name.to_string(),
                reason: format!("suffix {:?} is not hex", format.suffix_hex),
            });
        }
        let key = match format.source {
            OwnerKeySource::PublicKey => keypair.public_key.as_str(),
            OwnerKeySource::PrivateKey => keypair
                .private_key
                .as_ref()
                .map(|k| k.as_str())
                .ok_or_else(|| BroadcastError::OwnerKey {
                    name: name.to_string(),
                    reason: "identity is locked".into(),
                })?,
        };
        Ok(format!("{}{}", key, format.suffix_hex))
    }

    pub async fn broadcast_zone_file_update(
        &self,
        name: &str,
        keypair: &DerivedKeypair,
        zone_file: &str,
    ) -> Result<(), BroadcastError> {
        let body = json!({
            "owner_key": self.owner_key(name, keypair)?,
            "zonefile": zone_file,
        });
        self.put(name, self.config.zone_file_url(name), body).await
    }

    pub async fn broadcast_name_transfer(
        &self,
        name: &str,
        keypair: &DerivedKeypair,
        new_owner_address: &str,
    ) -> Result<(), BroadcastError> {
        let body = json!({
            "owner_key": self.owner_key(name, keypair)?,
            "owner": new_owner_address,
        });
        self.put(name, self.config.transfer_url(name), body).await
    }

    pub async fn broadcast(&self, request: &BroadcastRequest) -> Result<(), BroadcastError> {
        match &request.operation {
            NameOperation::ZoneFileUpdate { zone_file } => {
                self.broadcast_zone_file_update(&request.name, &request.keypair, zone_file)
                    .await
            }
            NameOperation::Transfer { new_owner_address } => {
                self.broadcast_name_transfer(&request.name, &request.keypair, new_owner_address)
                    .await
            }
        }
    }

    /// Broadcast for several names concurrently, returning the updated
    /// statuses and each name's result in request order
    pub async fn broadcast_all(
        &self,
        statuses: &NameBroadcasts,
        requests: &[BroadcastRequest],
    ) -> (NameBroadcasts, Vec<(String, Result<(), BroadcastError>)>) {
        let mut next = statuses.clone();
        for request in requests {
            next = next.apply(&request.name, BroadcastStatus::Broadcasting);
        }

        let results = join_all(requests.iter().map(|r| self.broadcast(r))).await;
        let results: Vec<(String, Result<(), BroadcastError>)> = requests
            .iter()
            .map(|r| r.name.clone())
            .zip(results)
            .collect();

        for (name, result) in &results {
            next = next.apply(name, BroadcastStatus::from_result(result));
        }
        (next, results)
    }

    async fn put(&self, name: &str, url: String, body: serde_json::Value) -> Result<(), BroadcastError> {
        let password = self
            .config
            .core_api_password
            .as_deref()
            .ok_or_else(|| BroadcastError::MissingApiPassword {
                name: name.to_string(),
            })?;

        log::info!("Broadcasting {} to {}", name, url);
        let response = self
            .transport
            .send(HttpRequest::put_json(url, body).bearer(password))
            .await
            .map_err(|source| BroadcastError::Transport {
                name: name.to_string(),
                source,
            })?;

        if response.is_success() {
            log::info!("Broadcast for {} accepted", name);
            Ok(())
        } else {
            let reason = response.error_message();
            log::error!("Broadcast for {} rejected: {}", name, reason);
            Err(BroadcastError::Rejected {
                name: name.to_string(),
                status: response.status,
                reason,
            })
        }
    }
}
