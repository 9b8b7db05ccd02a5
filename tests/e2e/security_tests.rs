//! Security-specific tests.
//!
//! These tests verify:
//! 1. The secret envelope fails closed on any tampering
//! 2. Hostile envelopes cannot force expensive key derivation
//! 3. Private keys never reach disk or logs
//! 4. Malformed inputs don't panic

use bitcoin::Network;
use stackid_core::{
    derive_address, derive_chain, generate_mnemonic, ChainPurpose, CryptoError, EncryptedSecret,
    KdfParams, MasterKeychain, SecretCodec, WordCount,
};
use stackid_ledger::{AccountLedger, IdentityBook, LedgerEvent, LedgerSnapshot};
use stackid_registry::{extract_profile, parse_zone_file, sign_profile, verify_token};

fn codec() -> SecretCodec {
    SecretCodec::new(KdfParams {
        m_cost: 1024,
        t_cost: 1,
        p_cost: 1,
    })
    .unwrap()
}

// ============================================================================
// 1. Envelope tampering
// ============================================================================

#[test]
fn test_every_byte_flip_is_detected() {
    let encrypted = codec().encrypt(b"secret phrase", "pw").unwrap();
    let bytes = encrypted.to_bytes();

    for i in 0..bytes.len() {
        let mut tampered = bytes.clone();
        tampered[i] ^= 0x01;
        let result = EncryptedSecret::from_bytes(&tampered)
            .and_then(|parsed| codec().decrypt(&parsed, "pw"));
        assert!(result.is_err(), "flip at byte {} was not detected", i);
    }
}

#[test]
fn test_truncation_is_detected() {
    let bytes = codec().encrypt(b"secret", "pw").unwrap().to_bytes();
    for len in 0..bytes.len() {
        let result = EncryptedSecret::from_bytes(&bytes[..len])
            .and_then(|parsed| codec().decrypt(&parsed, "pw"));
        assert!(result.is_err(), "truncation to {} bytes accepted", len);
    }
}

// ============================================================================
// 2. Hostile parameters
// ============================================================================

#[test]
fn test_oversized_kdf_params_rejected_before_derivation() {
    let mut bytes = codec().encrypt(b"secret", "pw").unwrap().to_bytes();
    // m_cost sits right after the version byte
    bytes[1..5].copy_from_slice(&u32::MAX.to_le_bytes());

    let result = EncryptedSecret::from_bytes(&bytes)
        .and_then(|parsed| codec().decrypt(&parsed, "pw"));
    assert!(matches!(result, Err(CryptoError::InvalidParams)));
}

// ============================================================================
// 3. Private keys stay in memory
// ============================================================================

#[test]
fn test_snapshot_contains_no_private_keys() {
    let mnemonic = generate_mnemonic(WordCount::Twelve).unwrap();
    let master = MasterKeychain::from_mnemonic(&mnemonic, "", Network::Bitcoin).unwrap();
    let identity = derive_chain(&master, ChainPurpose::Identity).unwrap();
    let payment = derive_chain(&master, ChainPurpose::Payment).unwrap();
    let first = derive_address(&identity, 0).unwrap();
    let secret = first.private_key.clone().unwrap();

    let ledger = AccountLedger::new()
        .apply(LedgerEvent::AccountCreated {
            encrypted_secret: codec()
                .encrypt(mnemonic.to_string().as_bytes(), "pw")
                .unwrap(),
            identity_public_keychain: identity.public_keychain(),
            payment_public_keychain: payment.public_keychain(),
            first_identity_keypair: first.clone(),
            first_payment_address: derive_address(&payment, 0).unwrap().address,
        })
        .unwrap();

    let json = serde_json::to_string(&LedgerSnapshot::capture(&ledger, &IdentityBook::new())).unwrap();
    assert!(!json.contains(secret.as_str()));
    assert!(!json.contains(&mnemonic.to_string()));
    assert!(!format!("{:?}", ledger).contains(secret.as_str()));
}

// ============================================================================
// 4. Malformed inputs
// ============================================================================

#[test]
fn test_malformed_inputs_do_not_panic() {
    let inputs = [
        "",
        "00",
        "zz",
        "01ffffffff",
        "\u{0}\u{1}",
        "$ORIGIN",
        "_http._tcp IN URI",
        "a.b.c",
        "..",
        "eyJhbGciOiJFUzI1NksifQ.e30.",
    ];
    for input in inputs {
        let _ = EncryptedSecret::from_hex(input);
        let _ = parse_zone_file(input);
        let _ = verify_token(input, Some("1BoatSLRHtKNngkdXEeobR76b53LETtpyT"));
        let _ = extract_profile(&serde_json::json!([{ "token": input }]), None);
    }
}

#[test]
fn test_profile_signed_with_identity_key_verifies() {
    let mnemonic = generate_mnemonic(WordCount::Twelve).unwrap();
    let master = MasterKeychain::from_mnemonic(&mnemonic, "", Network::Bitcoin).unwrap();
    let identity = derive_chain(&master, ChainPurpose::Identity).unwrap();
    let owner = derive_address(&identity, 0).unwrap();
    let other = derive_address(&identity, 1).unwrap();

    let profile = serde_json::json!({"name": "Owner"});
    let document = sign_profile(&profile, owner.private_key.as_ref().unwrap()).unwrap();

    assert_eq!(extract_profile(&document, Some(&owner.address)).unwrap(), profile);
    assert!(extract_profile(&document, Some(&other.address)).is_err());
}
