//! StackID Core
//!
//! Recovery phrase handling, at-rest encryption, and key derivation for
//! StackID accounts.
//!
//! # Key Derivation
//!
//! From a single BIP-39 seed, two independent chains:
//! - Identity chain: m/888'/0' (addresses at m/888'/0'/i)
//! - Payment chain: m/44'/0'/0'/0 (addresses at m/44'/0'/0'/0/i)
//!
//! # Encrypted Storage
//!
//! The recovery phrase is encrypted at rest using Argon2id + AES-256-GCM.

pub mod crypto;
pub mod keys;
pub mod seed;

pub use crypto::{
    decrypt_phrase, encrypt_phrase, CryptoError, EncryptedSecret, KdfParams, SecretCodec,
};
pub use keys::*;
pub use seed::*;
