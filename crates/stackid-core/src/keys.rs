//! Two-chain key derivation from a BIP-39 seed
//!
//! The master key space is partitioned into two fixed subtrees so identity
//! keys and payment keys can never collide:
//!
//! - Identity chain: `m/888'/0'`, address `i` at `m/888'/0'/i`
//! - Payment chain: `m/44'/0'/0'/0`, address `i` at `m/44'/0'/0'/0/i`
//!
//! Address children are non-hardened, so a chain reduced to its xpub
//! (watch-only) still derives every future address, just not signing keys.

use bip39::Mnemonic;
use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv, Xpub};
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address, CompressedPublicKey, Network};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::seed::derive_seed;

/// Identity chain root
pub const IDENTITY_CHAIN_PATH: &str = "m/888'/0'";

/// Payment chain root (BIP-44 external chain, account 0)
pub const PAYMENT_CHAIN_PATH: &str = "m/44'/0'/0'/0";

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Derivation failed: {0}")]
    DerivationFailed(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Address index {0} is out of range for non-hardened derivation")]
    IndexOutOfRange(u32),
    #[error("Invalid public keychain: {0}")]
    InvalidKeychain(String),
}

/// Which of the two chains a keychain belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainPurpose {
    Identity,
    Payment,
}

impl ChainPurpose {
    /// Fixed derivation path of the chain root
    pub fn path(&self) -> &'static str {
        match self {
            ChainPurpose::Identity => IDENTITY_CHAIN_PATH,
            ChainPurpose::Payment => PAYMENT_CHAIN_PATH,
        }
    }
}

impl fmt::Display for ChainPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainPurpose::Identity => write!(f, "identity"),
            ChainPurpose::Payment => write!(f, "payment"),
        }
    }
}

impl FromStr for ChainPurpose {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(ChainPurpose::Identity),
            "payment" | "bitcoin" => Ok(ChainPurpose::Payment),
            other => Err(KeyError::InvalidPath(format!("unknown chain: {}", other))),
        }
    }
}

/// BIP-32 master key. Session-only; intentionally not serializable.
pub struct MasterKeychain {
    xpriv: Xpriv,
}

impl MasterKeychain {
    /// Build the master key from a 64-byte seed
    pub fn from_seed(seed: &[u8; 64], network: Network) -> Result<Self, KeyError> {
        let xpriv = Xpriv::new_master(network, seed)
            .map_err(|e| KeyError::DerivationFailed(e.to_string()))?;
        Ok(Self { xpriv })
    }

    /// Build the master key directly from a recovery phrase
    pub fn from_mnemonic(
        mnemonic: &Mnemonic,
        passphrase: &str,
        network: Network,
    ) -> Result<Self, KeyError> {
        let seed = derive_seed(mnemonic, passphrase);
        Self::from_seed(&seed, network)
    }
}

/// Root of one chain. Without `xpriv` the chain is watch-only.
#[derive(Clone)]
pub struct ChainKeychain {
    purpose: ChainPurpose,
    xpub: Xpub,
    xpriv: Option<Xpriv>,
}

impl ChainKeychain {
    /// Rebuild a watch-only chain from its serialized xpub
    pub fn from_public_keychain(purpose: ChainPurpose, xpub: &str) -> Result<Self, KeyError> {
        let xpub = Xpub::from_str(xpub).map_err(|e| KeyError::InvalidKeychain(e.to_string()))?;
        Ok(Self {
            purpose,
            xpub,
            xpriv: None,
        })
    }

    pub fn purpose(&self) -> ChainPurpose {
        self.purpose
    }

    /// Serialized xpub, the durable form of this chain
    pub fn public_keychain(&self) -> String {
        self.xpub.to_string()
    }

    pub fn is_watch_only(&self) -> bool {
        self.xpriv.is_none()
    }

    /// Drop private material, keeping a chain that can only derive addresses
    pub fn watch_only(&self) -> Self {
        Self {
            purpose: self.purpose,
            xpub: self.xpub,
            xpriv: None,
        }
    }
}

impl fmt::Debug for ChainKeychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainKeychain")
            .field("purpose", &self.purpose)
            .field("xpub", &self.xpub.to_string())
            .field("watch_only", &self.is_watch_only())
            .finish()
    }
}

/// One derived address with its key material
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedKeypair {
    /// Child index under the chain root
    pub index: u32,
    /// P2PKH address
    pub address: String,
    /// Compressed public key (hex)
    pub public_key: String,
    /// Private key (hex). Session-only, never serialized.
    #[serde(skip)]
    pub private_key: Option<Zeroizing<String>>,
}

impl DerivedKeypair {
    /// Copy without private material
    pub fn public_only(&self) -> Self {
        Self {
            index: self.index,
            address: self.address.clone(),
            public_key: self.public_key.clone(),
            private_key: None,
        }
    }
}

impl fmt::Debug for DerivedKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKeypair")
            .field("index", &self.index)
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Derive one of the two chain roots from the master key
pub fn derive_chain(master: &MasterKeychain, purpose: ChainPurpose) -> Result<ChainKeychain, KeyError> {
    let path: DerivationPath = purpose
        .path()
        .parse()
        .map_err(|e: bitcoin::bip32::Error| KeyError::InvalidPath(e.to_string()))?;

    let secp = Secp256k1::new();
    let xpriv = master
        .xpriv
        .derive_priv(&secp, &path)
        .map_err(|e| KeyError::DerivationFailed(e.to_string()))?;
    let xpub = Xpub::from_priv(&secp, &xpriv);

    Ok(ChainKeychain {
        purpose,
        xpub,
        xpriv: Some(xpriv),
    })
}

/// Derive the keypair at `index` on a chain.
///
/// Pure: the same chain and index always produce byte-identical output.
/// Watch-only chains yield a keypair without a private key.
pub fn derive_address(chain: &ChainKeychain, index: u32) -> Result<DerivedKeypair, KeyError> {
    let child = ChildNumber::from_normal_idx(index).map_err(|_| KeyError::IndexOutOfRange(index))?;
    let secp = Secp256k1::new();

    let (public_key, private_key) = match &chain.xpriv {
        Some(xpriv) => {
            let child_priv = xpriv
                .derive_priv(&secp, &[child])
                .map_err(|e| KeyError::DerivationFailed(e.to_string()))?;
            let child_pub = Xpub::from_priv(&secp, &child_priv);
            let secret = Zeroizing::new(hex::encode(child_priv.private_key.secret_bytes()));
            (child_pub.public_key, Some(secret))
        }
        None => {
            let child_pub = chain
                .xpub
                .derive_pub(&secp, &[child])
                .map_err(|e| KeyError::DerivationFailed(e.to_string()))?;
            (child_pub.public_key, None)
        }
    };

    let compressed = CompressedPublicKey(public_key);
    let address = Address::p2pkh(compressed.pubkey_hash(), chain.xpub.network);

    Ok(DerivedKeypair {
        index,
        address: address.to_string(),
        public_key: hex::encode(compressed.to_bytes()),
        private_key,
    })
}

/// Index 0 of the identity chain: the account's bootstrap owner address
pub fn owner_address(identity_chain: &ChainKeychain) -> Result<String, KeyError> {
    Ok(derive_address(identity_chain, 0)?.address)
}
