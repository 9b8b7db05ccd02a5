//! Balance and core-wallet endpoints
//!
//! Results come back as ledger events for the caller to apply.

use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use stackid_ledger::{LedgerError, LedgerEvent, WithdrawalEvent, WithdrawalState};
use std::sync::Arc;

use crate::config::RegistryConfig;
use crate::error::WalletError;
use crate::transport::{HttpRequest, HttpTransport};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressBalance {
    #[serde(default)]
    balance: f64,
    #[serde(default)]
    unconfirmed_balance: f64,
}

#[derive(Debug, Deserialize)]
struct PaymentAddress {
    address: String,
}

#[derive(Debug, Deserialize)]
struct WithdrawResponse {
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    transaction_hash: Option<String>,
}

pub struct WalletClient {
    config: RegistryConfig,
    transport: Arc<dyn HttpTransport>,
}

impl WalletClient {
    pub fn new(config: RegistryConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Fetch confirmed balances for every payment address.
    ///
    /// All lookups run concurrently; any failure fails the whole refresh
    /// since a partial total would be wrong.
    pub async fn refresh_balances(&self, addresses: &[String]) -> Result<LedgerEvent, WalletError> {
        let lookups = addresses.iter().map(|address| async move {
            let balance = self.address_balance(address).await?;
            Ok::<_, WalletError>((address.clone(), balance.balance))
        });
        let balances = join_all(lookups)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("Fetched balances for {} addresses", balances.len());
        Ok(LedgerEvent::BalancesUpdated { balances })
    }

    /// Address of the registry node's own wallet
    pub async fn core_wallet_address(&self) -> Result<LedgerEvent, WalletError> {
        let operation = "core wallet address lookup";
        let password = self.password(operation)?;
        let url = &self.config.wallet_payment_address_url;
        let response = self
            .transport
            .send(HttpRequest::get(url).bearer(password))
            .await
            .map_err(|source| WalletError::Transport {
                operation: operation.into(),
                source,
            })?;
        if !response.is_success() {
            return Err(WalletError::Status {
                operation: operation.into(),
                status: response.status,
            });
        }
        let body: PaymentAddress = response.json(url).map_err(|e| WalletError::Decode {
            operation: operation.into(),
            reason: e.to_string(),
        })?;
        Ok(LedgerEvent::CoreWalletAddressUpdated {
            address: body.address,
        })
    }

    /// Core wallet balance, unconfirmed funds included
    pub async fn core_wallet_balance(&self, address: &str) -> Result<LedgerEvent, WalletError> {
        let balance = self.address_balance(address).await?;
        Ok(LedgerEvent::CoreWalletBalanceUpdated {
            balance: balance.balance + balance.unconfirmed_balance,
        })
    }

    /// Withdraw the whole core wallet balance to `recipient`.
    ///
    /// `current` is the ledger's withdrawal state. A withdrawal already in
    /// flight is refused before anything is sent. Otherwise returns the
    /// withdrawal events in order, ending in success or error.
    pub async fn withdraw(
        &self,
        current: &WithdrawalState,
        recipient: &str,
    ) -> Result<Vec<WithdrawalEvent>, LedgerError> {
        let start = WithdrawalEvent::StartBuild {
            recipient: recipient.to_string(),
        };
        current.transition(&start)?;

        let mut events = vec![start];
        match self.post_withdrawal(recipient).await {
            Ok(tx_hash) => {
                log::info!("Core wallet withdrawal to {} accepted", recipient);
                events.push(WithdrawalEvent::BuildSucceeded { tx_hex: tx_hash });
                events.push(WithdrawalEvent::StartBroadcast);
                events.push(WithdrawalEvent::BroadcastSucceeded);
            }
            Err(e) => {
                log::error!("Core wallet withdrawal to {} failed: {}", recipient, e);
                events.push(WithdrawalEvent::BuildFailed {
                    reason: e.to_string(),
                });
            }
        }
        Ok(events)
    }

    async fn post_withdrawal(&self, recipient: &str) -> Result<String, WalletError> {
        let operation = "core wallet withdrawal";
        let password = self.password(operation)?;
        let url = &self.config.core_wallet_withdraw_url;
        let body = json!({ "address": recipient, "min_confs": 0 });

        let response = self
            .transport
            .send(HttpRequest::post_json(url, body).bearer(password))
            .await
            .map_err(|source| WalletError::Transport {
                operation: operation.into(),
                source,
            })?;
        let parsed: Result<WithdrawResponse, _> = response.json(url);
        match parsed {
            Ok(WithdrawResponse { error: Some(error), .. }) => Err(WalletError::Rejected(
                error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string()),
            )),
            _ if !response.is_success() => Err(WalletError::Status {
                operation: operation.into(),
                status: response.status,
            }),
            Ok(body) => Ok(body.transaction_hash.unwrap_or_default()),
            Err(e) => Err(WalletError::Decode {
                operation: operation.into(),
                reason: e.to_string(),
            }),
        }
    }

    async fn address_balance(&self, address: &str) -> Result<AddressBalance, WalletError> {
        let operation = format!("balance lookup for {}", address);
        let url = self.config.balance_url(address);
        let response = self
            .transport
            .send(HttpRequest::get(&url))
            .await
            .map_err(|source| WalletError::Transport {
                operation: operation.clone(),
                source,
            })?;
        if !response.is_success() {
            return Err(WalletError::Status {
                operation,
                status: response.status,
            });
        }
        response
            .json(&url)
            .map_err(|e| WalletError::Decode {
                operation,
                reason: e.to_string(),
            })
    }

    fn password(&self, operation: &str) -> Result<&str, WalletError> {
        self.config
            .core_api_password
            .as_deref()
            .ok_or_else(|| WalletError::MissingApiPassword {
                operation: operation.into(),
            })
    }
}
