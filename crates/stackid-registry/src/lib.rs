//! StackID Registry
//!
//! Everything that talks to the name registry and its storage:
//!
//! - [`ProfileResolver`]: address → name → zone file → verified profile
//! - [`ProofValidator`]: social proof checks, scored by [`TrustPolicy`]
//! - [`Broadcaster`]: zone file updates and name transfers
//! - [`WalletClient`]: balances and core-wallet withdrawals
//!
//! All network access goes through [`HttpTransport`].
//!
//! # Example
//!
//! ```ignore
//! use stackid_registry::{ProfileResolver, RegistryConfig, ReqwestTransport};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(30))?);
//! let resolver = ProfileResolver::new(RegistryConfig::default(), transport);
//! let batch = resolver.resolve_for_addresses(&ledger.identity.addresses).await;
//! let book = book.apply_all(batch.into_updates())?;
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod profile;
pub mod proofs;
pub mod resolver;
pub mod transport;
pub mod trust;
pub mod wallet;
pub mod zonefile;

pub use broadcast::{BroadcastRequest, BroadcastStatus, Broadcaster, NameBroadcasts, NameOperation};
pub use config::{OwnerKeyFormat, OwnerKeySource, ProofMode, RegistryConfig};
pub use error::{BroadcastError, LookupError, ProofCheckError, TransportError, WalletError};
pub use profile::{extract_profile, sign_profile, verify_token, ProfileError};
pub use proofs::{validator_for, LocalProofChecker, ProofService, ProofValidator};
pub use resolver::{AddressResolution, NameRecord, Ownership, ProfileResolver, ResolutionBatch, ResolvedProfile};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
pub use trust::{trust_level, TrustPolicy};
pub use wallet::WalletClient;
pub use zonefile::{make_zone_file, parse_zone_file, ZoneFile, ZoneFileError};
