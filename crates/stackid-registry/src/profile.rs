//! Profile documents
//!
//! A profile document is either a token file (a JSON array of signed
//! ES256K JWTs whose `claim` is the profile) or a legacy bare JSON profile.
//! Token signatures are checked against the issuer key, and the issuer key
//! must hash to the expected owner address.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bitcoin::address::NetworkUnchecked;
use bitcoin::hashes::{sha256, Hash};
use bitcoin::Address;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),
    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Token signature does not verify")]
    BadSignature,
    #[error("Token issuer does not own {0}")]
    OwnerMismatch(String),
    #[error("Document contains no profile")]
    NoProfile,
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

const TOKEN_ALGORITHM: &str = "ES256K";

/// Pull the profile out of a fetched document.
///
/// For token files the first token that verifies wins. `owner_address`, when
/// given, must match the issuer of that token.
pub fn extract_profile(document: &Value, owner_address: Option<&str>) -> Result<Value, ProfileError> {
    match document {
        Value::Array(records) => {
            let mut last_error = ProfileError::NoProfile;
            for record in records {
                let token = record
                    .get("token")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ProfileError::MalformedToken("record has no token".into()));
                match token.and_then(|t| verify_token(t, owner_address)) {
                    Ok(claim) => return Ok(claim),
                    Err(e) => {
                        log::debug!("Skipping profile token: {}", e);
                        last_error = e;
                    }
                }
            }
            Err(last_error)
        }
        Value::Object(_) => {
            log::debug!("Legacy profile document, no signature to check");
            Ok(document.clone())
        }
        _ => Err(ProfileError::NoProfile),
    }
}

/// Verify one token and return its `claim`
pub fn verify_token(token: &str, owner_address: Option<&str>) -> Result<Value, ProfileError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ProfileError::MalformedToken("expected three segments".into()));
    };

    let header = decode_json(header_b64)?;
    let alg = header.get("alg").and_then(Value::as_str).unwrap_or_default();
    if alg != TOKEN_ALGORITHM {
        return Err(ProfileError::UnsupportedAlgorithm(alg.to_string()));
    }

    let payload = decode_json(payload_b64)?;
    let issuer_hex = payload
        .pointer("/issuer/publicKey")
        .and_then(Value::as_str)
        .ok_or_else(|| ProfileError::MalformedToken("missing issuer public key".into()))?;
    let issuer_bytes = hex::decode(issuer_hex)
        .map_err(|e| ProfileError::MalformedToken(format!("issuer key: {}", e)))?;
    let issuer = PublicKey::from_slice(&issuer_bytes)
        .map_err(|e| ProfileError::MalformedToken(format!("issuer key: {}", e)))?;

    let signature_bytes = URL_SAFE_NO_PAD
        .decode(signature_b64.trim_end_matches('='))
        .map_err(|e| ProfileError::MalformedToken(format!("signature: {}", e)))?;
    let mut signature =
        Signature::from_compact(&signature_bytes).map_err(|_| ProfileError::BadSignature)?;
    signature.normalize_s();

    let signing_input = format!("{}.{}", header_b64, payload_b64);
    let message = signing_message(&signing_input);
    Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature, &issuer)
        .map_err(|_| ProfileError::BadSignature)?;

    if let Some(owner) = owner_address {
        if !key_owns_address(&issuer_bytes, owner)? {
            return Err(ProfileError::OwnerMismatch(owner.to_string()));
        }
    }

    payload
        .get("claim")
        .cloned()
        .ok_or(ProfileError::NoProfile)
}

/// Sign a profile as a single-token document
pub fn sign_profile(profile: &Value, secret_key_hex: &str) -> Result<Value, ProfileError> {
    let secret_bytes =
        hex::decode(secret_key_hex).map_err(|e| ProfileError::InvalidKey(e.to_string()))?;
    let secret =
        SecretKey::from_slice(&secret_bytes).map_err(|e| ProfileError::InvalidKey(e.to_string()))?;
    let secp = Secp256k1::signing_only();
    let public = PublicKey::from_secret_key(&secp, &secret);
    let public_hex = hex::encode(public.serialize());

    let header = json!({"typ": "JWT", "alg": TOKEN_ALGORITHM});
    let payload = json!({
        "subject": {"publicKey": public_hex},
        "issuer": {"publicKey": public_hex},
        "claim": profile,
    });
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    );
    let signature = secp.sign_ecdsa(&signing_message(&signing_input), &secret);
    let token = format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature.serialize_compact())
    );

    Ok(json!([{
        "token": token,
        "decodedToken": {"header": header, "payload": payload},
    }]))
}

fn signing_message(input: &str) -> Message {
    let digest = sha256::Hash::hash(input.as_bytes());
    Message::from_digest(digest.to_byte_array())
}

fn decode_json(segment: &str) -> Result<Value, ProfileError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| ProfileError::MalformedToken(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ProfileError::MalformedToken(e.to_string()))
}

/// True when `key` (compressed or uncompressed SEC1) hashes to the P2PKH `address`
fn key_owns_address(key: &[u8], address: &str) -> Result<bool, ProfileError> {
    let address: Address<NetworkUnchecked> = address
        .parse()
        .map_err(|_| ProfileError::OwnerMismatch(address.to_string()))?;
    let key = bitcoin::PublicKey::from_slice(key)
        .map_err(|e| ProfileError::MalformedToken(format!("issuer key: {}", e)))?;
    Ok(address.assume_checked().pubkey_hash() == Some(key.pubkey_hash()))
}
