//! StackID Ledger
//!
//! Account state as immutable snapshots changed only by applying events.
//!
//! - [`AccountLedger`]: both key chains, balances and the core wallet
//! - [`WithdrawalState`]: core-wallet withdrawal state machine
//! - [`IdentityBook`]: resolved identity records
//! - [`LedgerSnapshot`]: durable on-disk form
//!
//! # Example
//!
//! ```ignore
//! use stackid_ledger::{AccountLedger, LedgerEvent};
//!
//! let ledger = AccountLedger::new().apply(LedgerEvent::AccountCreated { .. })?;
//! let ledger = ledger.apply(LedgerEvent::NextPaymentAddressUsed)?;
//! assert_eq!(ledger.payment.address_index, 1);
//! ```

pub mod identity;
pub mod ledger;
pub mod snapshot;
pub mod withdrawal;

use thiserror::Error;

pub use identity::{IdentityBook, IdentityRecord, IdentityUpdate, PublicIdentity, Verification};
pub use ledger::{
    AccountLedger, Balances, CoreWallet, IdentityChainState, LedgerEvent, PaymentChainState,
};
pub use snapshot::{LedgerSnapshot, SnapshotError};
pub use withdrawal::{WithdrawalEvent, WithdrawalState};

/// Errors from applying events
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Event rejected: {0}")]
    Rejected(String),

    #[error("No account exists")]
    NoAccount,

    #[error("Address derivation failed: {0}")]
    Derivation(String),
}
