//! Password-based encryption of the recovery phrase
//!
//! Argon2id derives a 256-bit key from the password; AES-256-GCM encrypts and
//! authenticates the secret.
//!
//! # Security Notes
//!
//! - Argon2id is memory-hard (resistant to GPU/ASIC attacks)
//! - AES-256-GCM provides authenticated encryption, so a wrong password or
//!   any tampering is detected instead of yielding garbage plaintext
//! - Every encryption uses a fresh random salt and nonce
//! - Password is never stored or logged
//!
//! # Envelope
//!
//! ```text
//! [version (1)][m_cost (4 LE)][t_cost (4 LE)][p_cost (4 LE)][salt (16)][nonce (12)][ciphertext + tag]
//! ```
//!
//! The KDF parameters travel with the ciphertext, so any codec instance can
//! decrypt what another produced.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use bip39::Mnemonic;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::seed::{mnemonic_from_bytes, phrase_bytes};

/// Current envelope version
const ENVELOPE_VERSION: u8 = 1;

/// Salt length for Argon2
const SALT_LEN: usize = 16;

/// Nonce length for AES-256-GCM
const NONCE_LEN: usize = 12;

/// GCM authentication tag length
const TAG_LEN: usize = 16;

/// version + three u32 parameters
const HEADER_LEN: usize = 1 + 4 + 4 + 4;

const KEY_LEN: usize = 32;

/// Upper bounds accepted from an envelope (1 GiB memory)
const MAX_M_COST: u32 = 1 << 20;
const MAX_T_COST: u32 = 64;
const MAX_P_COST: u32 = 16;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
    #[error("Invalid ciphertext format")]
    InvalidFormat,
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u8),
    #[error("KDF parameters out of range")]
    InvalidParams,
    #[error("Decrypted secret is not a valid recovery phrase")]
    InvalidPhrase,
}

impl CryptoError {
    /// True for every failure that means "this ciphertext cannot be opened
    /// with this password".
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            CryptoError::DecryptionFailed(_)
                | CryptoError::InvalidFormat
                | CryptoError::UnsupportedVersion(_)
                | CryptoError::InvalidParams
                | CryptoError::InvalidPhrase
        )
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory in KiB
    pub m_cost: u32,
    /// Iterations
    pub t_cost: u32,
    /// Lanes
    pub p_cost: u32,
}

impl Default for KdfParams {
    /// OWASP recommendation: 64 MiB, 3 iterations, 4 lanes
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

impl KdfParams {
    fn check(&self) -> Result<(), CryptoError> {
        let in_range = (1..=MAX_M_COST).contains(&self.m_cost)
            && (1..=MAX_T_COST).contains(&self.t_cost)
            && (1..=MAX_P_COST).contains(&self.p_cost);
        if in_range {
            Ok(())
        } else {
            Err(CryptoError::InvalidParams)
        }
    }
}

/// Encrypted recovery phrase, persisted as a hex string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSecret {
    params: KdfParams,
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
    /// Ciphertext + authentication tag
    ciphertext: Vec<u8>,
}

impl EncryptedSecret {
    /// Serialize to the binary envelope
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(HEADER_LEN + SALT_LEN + NONCE_LEN + self.ciphertext.len());
        bytes.push(ENVELOPE_VERSION);
        bytes.extend_from_slice(&self.params.m_cost.to_le_bytes());
        bytes.extend_from_slice(&self.params.t_cost.to_le_bytes());
        bytes.extend_from_slice(&self.params.p_cost.to_le_bytes());
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Deserialize from the binary envelope
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        // Minimum: header + salt + nonce + at least 1 byte ciphertext + tag
        if bytes.len() < HEADER_LEN + SALT_LEN + NONCE_LEN + TAG_LEN + 1 {
            return Err(CryptoError::InvalidFormat);
        }
        if bytes[0] != ENVELOPE_VERSION {
            return Err(CryptoError::UnsupportedVersion(bytes[0]));
        }

        let read_u32 = |at: usize| {
            let mut word = [0u8; 4];
            word.copy_from_slice(&bytes[at..at + 4]);
            u32::from_le_bytes(word)
        };
        let params = KdfParams {
            m_cost: read_u32(1),
            t_cost: read_u32(5),
            p_cost: read_u32(9),
        };
        params.check()?;

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        let body = &bytes[HEADER_LEN..];
        salt.copy_from_slice(&body[..SALT_LEN]);
        nonce.copy_from_slice(&body[SALT_LEN..SALT_LEN + NONCE_LEN]);
        let ciphertext = body[SALT_LEN + NONCE_LEN..].to_vec();

        Ok(Self {
            params,
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Lowercase hex rendering used for storage
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse the hex rendering
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim()).map_err(|_| CryptoError::InvalidFormat)?;
        Self::from_bytes(&bytes)
    }

    /// KDF parameters this secret was sealed with
    pub fn params(&self) -> KdfParams {
        self.params
    }
}

impl Serialize for EncryptedSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EncryptedSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EncryptedSecret::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Symmetric password-based codec
#[derive(Debug, Clone, Default)]
pub struct SecretCodec {
    params: KdfParams,
}

impl SecretCodec {
    /// Create a codec that seals with the given KDF parameters
    pub fn new(params: KdfParams) -> Result<Self, CryptoError> {
        params.check()?;
        Ok(Self { params })
    }

    /// Encrypt a secret with a password.
    ///
    /// Each call generates a new random salt and nonce.
    pub fn encrypt(&self, secret: &[u8], password: &str) -> Result<EncryptedSecret, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let nonce_arr = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&nonce_arr);

        let key = derive_key(password, &salt, &self.params)?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), secret)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(EncryptedSecret {
            params: self.params,
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt a secret with a password.
    ///
    /// # Errors
    /// Returns an error if the password is wrong or the ciphertext was tampered
    /// with; never returns partial plaintext.
    pub fn decrypt(
        &self,
        encrypted: &EncryptedSecret,
        password: &str,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        encrypted.params.check()?;
        let key = derive_key(password, &encrypted.salt, &encrypted.params)?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&encrypted.nonce),
                encrypted.ciphertext.as_slice(),
            )
            .map_err(|_| {
                CryptoError::DecryptionFailed("Invalid password or corrupted data".to_string())
            })?;

        Ok(Zeroizing::new(plaintext))
    }
}

/// Derive an encryption key from a password using Argon2id
fn derive_key(
    password: &str,
    salt: &[u8; SALT_LEN],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
    let argon_params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(KEY_LEN))
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    Ok(key)
}

/// Encrypt a recovery phrase with the default codec
pub fn encrypt_phrase(mnemonic: &Mnemonic, password: &str) -> Result<EncryptedSecret, CryptoError> {
    SecretCodec::default().encrypt(&phrase_bytes(mnemonic), password)
}

/// Decrypt a recovery phrase.
///
/// The decrypted bytes must form a valid mnemonic.
pub fn decrypt_phrase(encrypted: &EncryptedSecret, password: &str) -> Result<Mnemonic, CryptoError> {
    let plaintext = SecretCodec::default().decrypt(encrypted, password)?;
    mnemonic_from_bytes(&plaintext).map_err(|_| CryptoError::InvalidPhrase)
}
