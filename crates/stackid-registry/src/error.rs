//! Registry error types
//!
//! Every variant names the address, name or operation it concerns so partial
//! results can be reported per item.

use thiserror::Error;

/// HTTP-level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Invalid response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// Failures resolving an address or name to a profile
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Lookup of {target} failed: {source}")]
    Transport {
        target: String,
        source: TransportError,
    },

    #[error("Lookup of {target} returned status {status}")]
    Status { target: String, status: u16 },

    #[error("Zone file for {name} is invalid: {reason}")]
    ZoneFile { name: String, reason: String },

    #[error("Zone file for {name} has no profile location")]
    NoProfileLocation { name: String },

    #[error("Profile for {target} is invalid: {reason}")]
    Profile { target: String, reason: String },
}

/// Failures running proof validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofCheckError {
    #[error("Proof validation for {address} failed: {source}")]
    Transport {
        address: String,
        source: TransportError,
    },

    #[error("Proof validation for {address} returned status {status}")]
    Status { address: String, status: u16 },

    #[error("Proof validation for {address} returned invalid data: {reason}")]
    Decode { address: String, reason: String },
}

/// Failures publishing a name operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("Broadcast for {name} failed: {source}")]
    Transport {
        name: String,
        source: TransportError,
    },

    #[error("Registry rejected broadcast for {name} ({status}): {reason}")]
    Rejected {
        name: String,
        status: u16,
        reason: String,
    },

    #[error("No usable owner key for {name}: {reason}")]
    OwnerKey { name: String, reason: String },

    #[error("Broadcast for {name} needs the core API password, which is not configured")]
    MissingApiPassword { name: String },
}

/// Failures talking to balance and core-wallet endpoints
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("{operation} failed: {source}")]
    Transport {
        operation: String,
        source: TransportError,
    },

    #[error("{operation} returned status {status}")]
    Status { operation: String, status: u16 },

    #[error("{operation} returned invalid data: {reason}")]
    Decode { operation: String, reason: String },

    #[error("Core wallet rejected withdrawal: {0}")]
    Rejected(String),

    #[error("{operation} failed: Core API password is not configured")]
    MissingApiPassword { operation: String },
}
