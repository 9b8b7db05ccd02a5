//! Social proof verification
//!
//! A profile lists external accounts under `account[]`, each optionally
//! pointing at a public post (`proofUrl`) that names the owner. Proofs are
//! checked either by the remote validation service or locally by fetching
//! each post.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use stackid_ledger::Verification;
use std::sync::Arc;

use crate::config::{ProofMode, RegistryConfig};
use crate::error::ProofCheckError;
use crate::transport::{HttpRequest, HttpTransport};

#[async_trait]
pub trait ProofValidator: Send + Sync {
    async fn validate(
        &self,
        profile: &Value,
        address: &str,
        username: Option<&str>,
    ) -> Result<Vec<Verification>, ProofCheckError>;
}

/// Build the validator selected by `config.proof_mode`
pub fn validator_for(
    config: &RegistryConfig,
    transport: Arc<dyn HttpTransport>,
) -> Arc<dyn ProofValidator> {
    match config.proof_mode {
        ProofMode::Service => Arc::new(ProofService::new(
            transport,
            config.proof_validation_url.clone(),
        )),
        ProofMode::Local => Arc::new(LocalProofChecker::new(transport)),
    }
}

/// Remote validation service
pub struct ProofService {
    transport: Arc<dyn HttpTransport>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ServiceProof {
    service: String,
    identifier: String,
    #[serde(default, alias = "proofUrl")]
    proof_url: Option<String>,
    #[serde(default)]
    valid: bool,
}

impl ProofService {
    pub fn new(transport: Arc<dyn HttpTransport>, url: String) -> Self {
        Self { transport, url }
    }
}

#[async_trait]
impl ProofValidator for ProofService {
    async fn validate(
        &self,
        profile: &Value,
        address: &str,
        username: Option<&str>,
    ) -> Result<Vec<Verification>, ProofCheckError> {
        let mut body = json!({ "profile": profile, "address": address });
        if let Some(username) = username {
            body["username"] = json!(username);
        }

        let response = self
            .transport
            .send(HttpRequest::post_json(&self.url, body))
            .await
            .map_err(|source| ProofCheckError::Transport {
                address: address.to_string(),
                source,
            })?;
        if !response.is_success() {
            return Err(ProofCheckError::Status {
                address: address.to_string(),
                status: response.status,
            });
        }

        let proofs: Vec<ServiceProof> =
            response
                .json(&self.url)
                .map_err(|e| ProofCheckError::Decode {
                    address: address.to_string(),
                    reason: e.to_string(),
                })?;
        log::debug!("{} proofs checked for {}", proofs.len(), address);

        Ok(proofs
            .into_iter()
            .map(|p| Verification {
                service: p.service,
                identifier: p.identifier,
                proof_url: p.proof_url,
                valid: p.valid,
                error: None,
            })
            .collect())
    }
}

/// Account claim from a profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountClaim {
    pub service: String,
    pub identifier: String,
    pub proof_url: Option<String>,
}

/// Account claims listed by a profile
pub fn account_claims(profile: &Value) -> Vec<AccountClaim> {
    let Some(accounts) = profile.get("account").and_then(Value::as_array) else {
        return Vec::new();
    };
    accounts
        .iter()
        .filter_map(|account| {
            let service = account.get("service")?.as_str()?;
            let identifier = account.get("identifier")?.as_str()?;
            Some(AccountClaim {
                service: service.to_string(),
                identifier: identifier.to_string(),
                proof_url: account
                    .get("proofUrl")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect()
}

/// Checks proofs by fetching each proof post
pub struct LocalProofChecker {
    transport: Arc<dyn HttpTransport>,
}

impl LocalProofChecker {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    async fn check(&self, claim: AccountClaim, address: &str, username: Option<&str>) -> Verification {
        let Some(url) = claim.proof_url.clone() else {
            return Verification::invalid(&claim.service, &claim.identifier, None);
        };

        let response = match self.transport.send(HttpRequest::get(&url)).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Proof {} for {} unreachable: {}", url, address, e);
                return Verification::unchecked(&claim.service, &claim.identifier, Some(url), e.to_string());
            }
        };
        if !response.is_success() {
            return Verification::unchecked(
                &claim.service,
                &claim.identifier,
                Some(url),
                format!("status {}", response.status),
            );
        }

        let mentions_owner = response.body.contains(address)
            || username.is_some_and(|name| response.body.contains(name));
        if mentions_owner {
            Verification::valid(&claim.service, &claim.identifier, Some(url))
        } else {
            Verification::invalid(&claim.service, &claim.identifier, Some(url))
        }
    }
}

#[async_trait]
impl ProofValidator for LocalProofChecker {
    async fn validate(
        &self,
        profile: &Value,
        address: &str,
        username: Option<&str>,
    ) -> Result<Vec<Verification>, ProofCheckError> {
        let checks = account_claims(profile)
            .into_iter()
            .map(|claim| self.check(claim, address, username));
        Ok(join_all(checks).await)
    }
}
