//! Core-wallet withdrawal state machine
//!
//! ```text
//! Idle ──StartBuild──▶ Building ──StartBroadcast──▶ Broadcasting ──▶ Success
//!                         │                              │
//!                         └──BuildFailed──▶ Error ◀──BroadcastFailed
//! ```
//!
//! `Reset` returns to `Idle` from any state. Only one withdrawal may be in
//! flight: `StartBuild` is accepted from `Idle`, `Error` and `Success` only.

use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// Current withdrawal state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WithdrawalState {
    #[default]
    Idle,
    Building {
        recipient: String,
        /// Signed transaction, attached once the build succeeds
        tx_hex: Option<String>,
        /// Cleared when the build step finishes
        building: bool,
    },
    Broadcasting {
        recipient: String,
        tx_hex: String,
    },
    Success {
        recipient: String,
    },
    Error {
        recipient: Option<String>,
        reason: String,
    },
}

/// Inputs to the withdrawal state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WithdrawalEvent {
    StartBuild { recipient: String },
    BuildSucceeded { tx_hex: String },
    BuildFailed { reason: String },
    StartBroadcast,
    BroadcastSucceeded,
    BroadcastFailed { reason: String },
    Reset,
}

impl WithdrawalState {
    /// Compute the next state. Rejected transitions leave `self` untouched.
    pub fn transition(&self, event: &WithdrawalEvent) -> Result<WithdrawalState, LedgerError> {
        use WithdrawalEvent as E;
        use WithdrawalState as S;

        let next = match (self, event) {
            (_, E::Reset) => S::Idle,

            (S::Idle | S::Error { .. } | S::Success { .. }, E::StartBuild { recipient }) => {
                S::Building {
                    recipient: recipient.clone(),
                    tx_hex: None,
                    building: true,
                }
            }

            (
                S::Building {
                    recipient,
                    building: true,
                    ..
                },
                E::BuildSucceeded { tx_hex },
            ) => S::Building {
                recipient: recipient.clone(),
                tx_hex: Some(tx_hex.clone()),
                building: false,
            },

            (S::Building { recipient, .. }, E::BuildFailed { reason }) => S::Error {
                recipient: Some(recipient.clone()),
                reason: reason.clone(),
            },

            (
                S::Building {
                    recipient,
                    tx_hex: Some(tx_hex),
                    building: false,
                },
                E::StartBroadcast,
            ) => S::Broadcasting {
                recipient: recipient.clone(),
                tx_hex: tx_hex.clone(),
            },

            (S::Broadcasting { recipient, .. }, E::BroadcastSucceeded) => S::Success {
                recipient: recipient.clone(),
            },

            (S::Broadcasting { recipient, .. }, E::BroadcastFailed { reason }) => S::Error {
                recipient: Some(recipient.clone()),
                reason: reason.clone(),
            },

            (state, event) => {
                return Err(LedgerError::Rejected(format!(
                    "withdrawal event {:?} not allowed in state {}",
                    event,
                    state.name()
                )))
            }
        };
        Ok(next)
    }

    /// True while a withdrawal occupies the wallet
    pub fn in_progress(&self) -> bool {
        matches!(
            self,
            WithdrawalState::Building { .. } | WithdrawalState::Broadcasting { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            WithdrawalState::Idle => "idle",
            WithdrawalState::Building { .. } => "building",
            WithdrawalState::Broadcasting { .. } => "broadcasting",
            WithdrawalState::Success { .. } => "success",
            WithdrawalState::Error { .. } => "error",
        }
    }
}
