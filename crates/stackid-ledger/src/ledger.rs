//! Account ledger reducer
//!
//! The ledger is an immutable snapshot. Every change goes through
//! [`AccountLedger::apply`], which returns a new snapshot or rejects the event
//! without touching the old one.

use serde::{Deserialize, Serialize};
use stackid_core::{
    derive_address, ChainKeychain, ChainPurpose, DerivedKeypair, EncryptedSecret, KeyError,
};
use std::collections::BTreeMap;

use crate::withdrawal::{WithdrawalEvent, WithdrawalState};
use crate::LedgerError;

/// Identity chain bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IdentityChainState {
    /// Serialized xpub of the chain root
    pub public_keychain: Option<String>,
    pub addresses: Vec<String>,
    pub keypairs: Vec<DerivedKeypair>,
    pub address_index: u32,
}

/// Payment chain bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PaymentChainState {
    pub public_keychain: Option<String>,
    pub addresses: Vec<String>,
    pub address_index: u32,
    pub balances: Balances,
}

/// Per-address balances and their sum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Balances {
    pub by_address: BTreeMap<String, f64>,
    pub total: f64,
}

impl Balances {
    /// Build from an address/balance list. Duplicate addresses are rejected.
    pub fn from_entries(entries: &[(String, f64)]) -> Result<Self, LedgerError> {
        let mut by_address = BTreeMap::new();
        let mut total = 0.0;
        for (address, balance) in entries {
            if by_address.insert(address.clone(), *balance).is_some() {
                log::warn!("Duplicate address {} in balance update", address);
                return Err(LedgerError::Rejected(format!(
                    "duplicate address {} in balance update",
                    address
                )));
            }
            total += balance;
        }
        Ok(Self { by_address, total })
    }

    pub fn get(&self, address: &str) -> Option<f64> {
        self.by_address.get(address).copied()
    }
}

/// Node-managed wallet used for withdrawals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CoreWallet {
    pub address: Option<String>,
    pub balance: f64,
    pub withdrawal: WithdrawalState,
}

/// Full account state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AccountLedger {
    pub account_created: bool,
    pub encrypted_secret: Option<EncryptedSecret>,
    pub identity: IdentityChainState,
    pub payment: PaymentChainState,
    pub core_wallet: CoreWallet,
}

/// Events accepted by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    AccountCreated {
        encrypted_secret: EncryptedSecret,
        identity_public_keychain: String,
        payment_public_keychain: String,
        first_identity_keypair: DerivedKeypair,
        first_payment_address: String,
    },
    AccountDeleted,
    BackupPhraseUpdated {
        encrypted_secret: EncryptedSecret,
    },
    NextIdentityAddressUsed,
    NextPaymentAddressUsed,
    /// Keypair for the next identity index, derived from the unlocked chain
    IdentityKeypairAdded {
        keypair: DerivedKeypair,
    },
    BalancesUpdated {
        balances: Vec<(String, f64)>,
    },
    CoreWalletAddressUpdated {
        address: String,
    },
    CoreWalletBalanceUpdated {
        balance: f64,
    },
    Withdrawal(WithdrawalEvent),
}

impl AccountLedger {
    /// Empty ledger with no account
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event, producing the next snapshot
    pub fn apply(&self, event: LedgerEvent) -> Result<AccountLedger, LedgerError> {
        match event {
            LedgerEvent::AccountCreated {
                encrypted_secret,
                identity_public_keychain,
                payment_public_keychain,
                first_identity_keypair,
                first_payment_address,
            } => {
                if self.account_created {
                    return Err(LedgerError::Rejected("account already exists".into()));
                }
                if first_identity_keypair.index != 0 {
                    return Err(LedgerError::Rejected(
                        "first identity keypair must be index 0".into(),
                    ));
                }
                let created = AccountLedger {
                    account_created: true,
                    encrypted_secret: Some(encrypted_secret),
                    identity: IdentityChainState {
                        public_keychain: Some(identity_public_keychain),
                        addresses: vec![first_identity_keypair.address.clone()],
                        keypairs: vec![first_identity_keypair],
                        address_index: 0,
                    },
                    payment: PaymentChainState {
                        public_keychain: Some(payment_public_keychain),
                        addresses: vec![first_payment_address],
                        address_index: 0,
                        balances: self.payment.balances.clone(),
                    },
                    core_wallet: self.core_wallet.clone(),
                };
                created.verify_addresses()?;
                Ok(created)
            }

            LedgerEvent::AccountDeleted => Ok(AccountLedger {
                account_created: false,
                encrypted_secret: None,
                ..self.clone()
            }),

            LedgerEvent::BackupPhraseUpdated { encrypted_secret } => Ok(AccountLedger {
                encrypted_secret: Some(encrypted_secret),
                ..self.clone()
            }),

            LedgerEvent::NextIdentityAddressUsed => {
                let next = self.next_keypair(ChainPurpose::Identity)?;
                let mut identity = self.identity.clone();
                identity.addresses.push(next.address.clone());
                identity.keypairs.push(next);
                identity.address_index += 1;
                Ok(AccountLedger {
                    identity,
                    ..self.clone()
                })
            }

            LedgerEvent::IdentityKeypairAdded { keypair } => {
                let expected = self.next_keypair(ChainPurpose::Identity)?;
                if keypair.index != expected.index || keypair.address != expected.address {
                    return Err(LedgerError::Rejected(format!(
                        "identity keypair {} at index {} is not the next address (expected index {})",
                        keypair.address, keypair.index, expected.index
                    )));
                }
                let mut identity = self.identity.clone();
                identity.addresses.push(keypair.address.clone());
                identity.keypairs.push(keypair);
                identity.address_index += 1;
                Ok(AccountLedger {
                    identity,
                    ..self.clone()
                })
            }

            LedgerEvent::NextPaymentAddressUsed => {
                let next = self.next_keypair(ChainPurpose::Payment)?;
                let mut payment = self.payment.clone();
                payment.addresses.push(next.address);
                payment.address_index += 1;
                Ok(AccountLedger {
                    payment,
                    ..self.clone()
                })
            }

            LedgerEvent::BalancesUpdated { balances } => {
                let balances = Balances::from_entries(&balances)?;
                Ok(AccountLedger {
                    payment: PaymentChainState {
                        balances,
                        ..self.payment.clone()
                    },
                    ..self.clone()
                })
            }

            LedgerEvent::CoreWalletAddressUpdated { address } => Ok(AccountLedger {
                core_wallet: CoreWallet {
                    address: Some(address),
                    ..self.core_wallet.clone()
                },
                ..self.clone()
            }),

            LedgerEvent::CoreWalletBalanceUpdated { balance } => Ok(AccountLedger {
                core_wallet: CoreWallet {
                    balance,
                    ..self.core_wallet.clone()
                },
                ..self.clone()
            }),

            LedgerEvent::Withdrawal(event) => {
                let withdrawal = self.core_wallet.withdrawal.transition(&event)?;
                Ok(AccountLedger {
                    core_wallet: CoreWallet {
                        withdrawal,
                        ..self.core_wallet.clone()
                    },
                    ..self.clone()
                })
            }
        }
    }

    /// Apply events in order, stopping at the first rejection
    pub fn apply_all<I>(&self, events: I) -> Result<AccountLedger, LedgerError>
    where
        I: IntoIterator<Item = LedgerEvent>,
    {
        events
            .into_iter()
            .try_fold(self.clone(), |ledger, event| ledger.apply(event))
    }

    /// Watch-only chain rebuilt from the stored public keychain
    pub fn chain(&self, purpose: ChainPurpose) -> Result<ChainKeychain, LedgerError> {
        let xpub = match purpose {
            ChainPurpose::Identity => self.identity.public_keychain.as_deref(),
            ChainPurpose::Payment => self.payment.public_keychain.as_deref(),
        };
        let xpub = xpub.ok_or(LedgerError::NoAccount)?;
        Ok(ChainKeychain::from_public_keychain(purpose, xpub)?)
    }

    /// The keypair the next `Next*AddressUsed` event would append
    pub fn next_keypair(&self, purpose: ChainPurpose) -> Result<DerivedKeypair, LedgerError> {
        if !self.account_created {
            return Err(LedgerError::NoAccount);
        }
        let index = self.address_index(purpose) + 1;
        let chain = self.chain(purpose)?;
        Ok(derive_address(&chain, index)?)
    }

    pub fn address_index(&self, purpose: ChainPurpose) -> u32 {
        match purpose {
            ChainPurpose::Identity => self.identity.address_index,
            ChainPurpose::Payment => self.payment.address_index,
        }
    }

    pub fn addresses(&self, purpose: ChainPurpose) -> &[String] {
        match purpose {
            ChainPurpose::Identity => &self.identity.addresses,
            ChainPurpose::Payment => &self.payment.addresses,
        }
    }

    /// Canonical first identity address
    pub fn owner_address(&self) -> Option<&str> {
        self.identity.addresses.first().map(String::as_str)
    }

    /// Identity keypair for an address
    pub fn identity_keypair(&self, address: &str) -> Option<&DerivedKeypair> {
        self.identity.keypairs.iter().find(|k| k.address == address)
    }

    /// Re-derive every stored address from its chain's public keychain.
    ///
    /// Identity keypairs must also carry the public key derived at their index.
    pub fn verify_addresses(&self) -> Result<(), LedgerError> {
        if !self.account_created {
            return Ok(());
        }
        for purpose in [ChainPurpose::Identity, ChainPurpose::Payment] {
            let chain = self.chain(purpose)?;
            for (index, address) in self.addresses(purpose).iter().enumerate() {
                let derived = derive_address(&chain, index as u32)?;
                if derived.address != *address {
                    return Err(LedgerError::Rejected(format!(
                        "{:?} address {} at index {} does not match public keychain (expected {})",
                        purpose, address, index, derived.address
                    )));
                }
            }
        }

        let chain = self.chain(ChainPurpose::Identity)?;
        for keypair in &self.identity.keypairs {
            let derived = derive_address(&chain, keypair.index)?;
            if derived.address != keypair.address || derived.public_key != keypair.public_key {
                return Err(LedgerError::Rejected(format!(
                    "identity keypair {} at index {} does not match public keychain",
                    keypair.address, keypair.index
                )));
            }
        }
        Ok(())
    }

    /// `addresses.len() == address_index + 1` on both chains
    pub fn is_consistent(&self) -> bool {
        if !self.account_created {
            return true;
        }
        self.identity.addresses.len() == self.identity.address_index as usize + 1
            && self.identity.keypairs.len() == self.identity.addresses.len()
            && self.payment.addresses.len() == self.payment.address_index as usize + 1
    }
}

impl From<KeyError> for LedgerError {
    fn from(e: KeyError) -> Self {
        LedgerError::Derivation(e.to_string())
    }
}
