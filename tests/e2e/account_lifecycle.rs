//! End-to-end account lifecycle: create, derive, persist, restore, unlock.

use bitcoin::Network;
use stackid_core::{
    derive_address, derive_chain, mnemonic_from_bytes, parse_mnemonic, ChainKeychain,
    ChainPurpose, KdfParams, MasterKeychain, SecretCodec,
};
use stackid_ledger::{
    AccountLedger, IdentityBook, IdentityUpdate, LedgerEvent, LedgerSnapshot, WithdrawalEvent,
    WithdrawalState,
};
use tempfile::tempdir;

const PHRASE: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";
const PASSWORD: &str = "correct horse battery staple";

fn codec() -> SecretCodec {
    SecretCodec::new(KdfParams {
        m_cost: 1024,
        t_cost: 1,
        p_cost: 1,
    })
    .unwrap()
}

fn create_account() -> (AccountLedger, ChainKeychain) {
    let mnemonic = parse_mnemonic(PHRASE).unwrap();
    let master = MasterKeychain::from_mnemonic(&mnemonic, "", Network::Bitcoin).unwrap();
    let identity = derive_chain(&master, ChainPurpose::Identity).unwrap();
    let payment = derive_chain(&master, ChainPurpose::Payment).unwrap();

    let ledger = AccountLedger::new()
        .apply(LedgerEvent::AccountCreated {
            encrypted_secret: codec().encrypt(PHRASE.as_bytes(), PASSWORD).unwrap(),
            identity_public_keychain: identity.public_keychain(),
            payment_public_keychain: payment.public_keychain(),
            first_identity_keypair: derive_address(&identity, 0).unwrap(),
            first_payment_address: derive_address(&payment, 0).unwrap().address,
        })
        .unwrap();
    (ledger, identity)
}

#[test]
fn test_full_lifecycle_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wallet").join("ledger.json");

    // Session 1: create, derive a few addresses, save
    let (ledger, _) = create_account();
    let ledger = ledger
        .apply_all([
            LedgerEvent::NextIdentityAddressUsed,
            LedgerEvent::NextPaymentAddressUsed,
            LedgerEvent::NextPaymentAddressUsed,
        ])
        .unwrap();
    let book = IdentityBook::for_addresses(&ledger.identity.addresses)
        .apply(IdentityUpdate::DefaultIdentitySet { index: 1 })
        .unwrap();
    LedgerSnapshot::capture(&ledger, &book).save(&path).unwrap();

    // Session 2: restore and keep going from the public keychains alone
    let (restored, restored_book) = LedgerSnapshot::load(&path).unwrap().restore().unwrap();
    assert_eq!(restored.identity.addresses, ledger.identity.addresses);
    assert_eq!(restored.payment.addresses, ledger.payment.addresses);
    assert_eq!(restored_book.default_identity, 1);

    let continued = restored.apply(LedgerEvent::NextPaymentAddressUsed).unwrap();
    let reference = ledger.apply(LedgerEvent::NextPaymentAddressUsed).unwrap();
    assert_eq!(continued.payment.addresses, reference.payment.addresses);
    assert!(continued.is_consistent());

    // Unlock: the stored secret opens to the same phrase and chains
    let secret = codec()
        .decrypt(restored.encrypted_secret.as_ref().unwrap(), PASSWORD)
        .unwrap();
    let mnemonic = mnemonic_from_bytes(&secret).unwrap();
    let master = MasterKeychain::from_mnemonic(&mnemonic, "", Network::Bitcoin).unwrap();
    let identity = derive_chain(&master, ChainPurpose::Identity).unwrap();
    assert_eq!(
        Some(identity.public_keychain()),
        restored.identity.public_keychain
    );
}

#[test]
fn test_unlocked_identity_keypairs_extend_watch_only_ledger() {
    let (ledger, identity) = create_account();

    // Signing keys come from the unlocked chain, addresses from the xpub
    let keypair = derive_address(&identity, 1).unwrap();
    let extended = ledger
        .apply(LedgerEvent::IdentityKeypairAdded {
            keypair: keypair.clone(),
        })
        .unwrap();
    assert_eq!(
        extended.next_keypair(ChainPurpose::Identity).unwrap().index,
        2
    );
    assert_eq!(
        extended.identity_keypair(&keypair.address).unwrap().private_key,
        keypair.private_key
    );

    // The public derivation of the same index agrees with the private one
    let via_xpub = ledger.next_keypair(ChainPurpose::Identity).unwrap();
    assert_eq!(via_xpub.address, keypair.address);
    assert!(via_xpub.private_key.is_none());
}

#[test]
fn test_wrong_password_leaves_account_locked() {
    let (ledger, _) = create_account();
    let err = codec()
        .decrypt(ledger.encrypted_secret.as_ref().unwrap(), "wrong")
        .unwrap_err();
    assert!(err.is_decryption_failure());
}

#[test]
fn test_backup_phrase_reencryption() {
    let (ledger, _) = create_account();
    let reencrypted = codec().encrypt(PHRASE.as_bytes(), "new password").unwrap();
    let ledger = ledger
        .apply(LedgerEvent::BackupPhraseUpdated {
            encrypted_secret: reencrypted,
        })
        .unwrap();

    let secret = ledger.encrypted_secret.as_ref().unwrap();
    assert!(codec().decrypt(secret, PASSWORD).is_err());
    assert_eq!(
        codec().decrypt(secret, "new password").unwrap().as_slice(),
        PHRASE.as_bytes()
    );
}

#[test]
fn test_withdrawal_through_ledger() {
    let (ledger, _) = create_account();
    let ledger = ledger
        .apply_all([
            LedgerEvent::CoreWalletAddressUpdated {
                address: "1CoreWallet".into(),
            },
            LedgerEvent::CoreWalletBalanceUpdated { balance: 0.1 },
            LedgerEvent::Withdrawal(WithdrawalEvent::StartBuild {
                recipient: ledger.payment.addresses[0].clone(),
            }),
            LedgerEvent::Withdrawal(WithdrawalEvent::BuildFailed {
                reason: "fee too high".into(),
            }),
        ])
        .unwrap();
    assert!(matches!(
        ledger.core_wallet.withdrawal,
        WithdrawalState::Error { .. }
    ));

    // A new attempt is allowed after an error
    let retry = ledger
        .apply(LedgerEvent::Withdrawal(WithdrawalEvent::StartBuild {
            recipient: "1Elsewhere".into(),
        }))
        .unwrap();
    assert!(retry.core_wallet.withdrawal.in_progress());
}
