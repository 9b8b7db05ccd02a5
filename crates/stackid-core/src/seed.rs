//! BIP-39 recovery phrase management
//!
//! Handles phrase generation, validation, and seed derivation.

use bip39::{Language, Mnemonic};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("Mnemonic generation failed: {0}")]
    GenerationFailed(String),
    #[error("Recovered secret is not valid UTF-8")]
    NotUtf8,
}

/// Supported phrase lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordCount {
    Twelve,
    TwentyFour,
}

impl WordCount {
    fn count(self) -> usize {
        match self {
            WordCount::Twelve => 12,
            WordCount::TwentyFour => 24,
        }
    }
}

/// Generate a new English BIP-39 mnemonic
pub fn generate_mnemonic(words: WordCount) -> Result<Mnemonic, SeedError> {
    Mnemonic::generate_in(Language::English, words.count())
        .map_err(|e| SeedError::GenerationFailed(e.to_string()))
}

/// Parse a mnemonic from words, validating word list and checksum
pub fn parse_mnemonic(words: &str) -> Result<Mnemonic, SeedError> {
    Mnemonic::parse_in(Language::English, words)
        .map_err(|e| SeedError::InvalidMnemonic(e.to_string()))
}

/// Use the supplied phrase when it is valid, otherwise generate a fresh one.
///
/// Returns the phrase and whether it was freshly generated.
pub fn ensure_mnemonic(words: Option<&str>) -> Result<(Mnemonic, bool), SeedError> {
    if let Some(words) = words {
        match parse_mnemonic(words) {
            Ok(mnemonic) => return Ok((mnemonic, false)),
            Err(_) => log::warn!("Supplied recovery phrase is invalid, generating a new one"),
        }
    }
    Ok((generate_mnemonic(WordCount::Twelve)?, true))
}

/// Derive seed bytes from mnemonic (with optional passphrase)
pub fn derive_seed(mnemonic: &Mnemonic, passphrase: &str) -> Zeroizing<[u8; 64]> {
    Zeroizing::new(mnemonic.to_seed(passphrase))
}

/// Render the phrase as bytes for encryption
pub fn phrase_bytes(mnemonic: &Mnemonic) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(mnemonic.to_string().into_bytes())
}

/// Rebuild a mnemonic from decrypted bytes
pub fn mnemonic_from_bytes(bytes: &[u8]) -> Result<Mnemonic, SeedError> {
    let words = std::str::from_utf8(bytes).map_err(|_| SeedError::NotUtf8)?;
    parse_mnemonic(words)
}
