//! End-to-end identity flows against a scripted registry node.
//!
//! Keys are derived from a fixed recovery phrase so every profile token is
//! signed by a real identity address.

use bitcoin::Network;
use serde_json::json;
use stackid_core::{
    derive_address, derive_chain, parse_mnemonic, ChainKeychain, ChainPurpose, DerivedKeypair,
    MasterKeychain,
};
use stackid_ledger::{
    AccountLedger, IdentityBook, IdentityUpdate, LedgerError, LedgerEvent, WithdrawalEvent,
    WithdrawalState,
};
use stackid_registry::transport::mock::MockTransport;
use stackid_registry::{
    make_zone_file, sign_profile, BroadcastRequest, BroadcastStatus, Broadcaster, Method,
    NameBroadcasts, NameOperation, ProfileResolver, RegistryConfig, WalletClient,
};
use std::sync::Arc;
use std::time::Duration;

const PHRASE: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";

struct Account {
    identity: ChainKeychain,
    keypairs: Vec<DerivedKeypair>,
}

fn account(count: u32) -> Account {
    let mnemonic = parse_mnemonic(PHRASE).unwrap();
    let master = MasterKeychain::from_mnemonic(&mnemonic, "", Network::Bitcoin).unwrap();
    let identity = derive_chain(&master, ChainPurpose::Identity).unwrap();
    let keypairs = (0..count)
        .map(|i| derive_address(&identity, i).unwrap())
        .collect();
    Account { identity, keypairs }
}

fn addresses(account: &Account) -> Vec<String> {
    account.keypairs.iter().map(|k| k.address.clone()).collect()
}

fn profile(name: &str) -> serde_json::Value {
    json!({
        "@type": "Person",
        "name": name,
        "account": [
            {"service": "twitter", "identifier": name.to_lowercase(), "proofUrl": "https://twitter.example/1"},
            {"service": "github", "identifier": name.to_lowercase()},
        ]
    })
}

/// Publish `name` for `keypair` with a signed profile behind a zone file
fn register(transport: &MockTransport, config: &RegistryConfig, name: &str, keypair: &DerivedKeypair) {
    let profile_url = format!("https://storage.example/{}/profile.json", name);
    transport.on_get(&config.address_url(&keypair.address), json!({ "names": [name] }));
    transport.on_get(
        &config.name_url(name),
        json!({
            "zonefile": make_zone_file(name, &profile_url),
            "address": keypair.address,
            "expire_block": 720_000,
        }),
    );
    let secret = keypair.private_key.as_ref().unwrap();
    transport.on_get(&profile_url, sign_profile(&profile(name), secret).unwrap());
}

/// Proof service that confirms only the twitter claim
fn proof_service(transport: &MockTransport, config: &RegistryConfig) {
    transport.respond(
        Method::Post,
        &config.proof_validation_url,
        200,
        json!([
            {"service": "twitter", "identifier": "alice", "proofUrl": "https://twitter.example/1", "valid": true},
            {"service": "github", "identifier": "alice", "valid": false},
        ])
        .to_string(),
    );
}

#[tokio::test]
async fn test_refresh_with_one_failed_address() {
    let account = account(3);
    let addresses = addresses(&account);
    let config = RegistryConfig::default();
    let transport = Arc::new(MockTransport::new());

    register(&transport, &config, "alice.id", &account.keypairs[0]);
    proof_service(&transport, &config);
    transport.fail(Method::Get, &config.address_url(&addresses[1]), "connection reset");
    transport.on_get(&config.address_url(&addresses[2]), json!({ "names": [] }));
    // Hold back the first lookup so completion order differs from index order
    transport.delay(&config.address_url(&addresses[0]), Duration::from_millis(30));

    let resolver = ProfileResolver::new(config.clone(), transport.clone());
    let batch = resolver.resolve_for_addresses(&addresses).await;
    assert_eq!(batch.failures().count(), 1);
    assert_eq!(batch.failures().next().unwrap().0, addresses[1]);

    // Updates land one at a time; nothing rejects
    let mut book = IdentityBook::for_addresses(&addresses);
    for update in batch.into_updates() {
        book = book.apply(update).unwrap();
    }

    let alice = book.get(0).unwrap();
    assert_eq!(alice.username.as_deref(), Some("alice.id"));
    assert_eq!(alice.profile.as_ref().unwrap()["name"], "alice.id");
    assert_eq!(alice.expire_block, Some(720_000));
    assert_eq!(alice.trust_level, 1);
    assert_eq!(alice.verifications.len(), 2);
    assert!(alice.last_error.is_none());

    let failed = book.get(1).unwrap();
    assert!(failed.profile.is_none());
    assert!(failed.last_error.as_ref().unwrap().contains("connection reset"));

    let unnamed = book.get(2).unwrap();
    assert!(unnamed.username.is_none());
    assert!(unnamed.last_error.is_none());
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_profile() {
    let account = account(1);
    let addresses = addresses(&account);
    let config = RegistryConfig::default();

    // First refresh succeeds
    let healthy = Arc::new(MockTransport::new());
    register(&healthy, &config, "alice.id", &account.keypairs[0]);
    proof_service(&healthy, &config);
    let batch = ProfileResolver::new(config.clone(), healthy)
        .resolve_for_addresses(&addresses)
        .await;
    let book = IdentityBook::for_addresses(&addresses)
        .apply_all(batch.into_updates())
        .unwrap();

    // Second refresh hits an outage
    let down = Arc::new(MockTransport::new());
    down.fail(Method::Get, &config.address_url(&addresses[0]), "timed out");
    let batch = ProfileResolver::new(config, down)
        .resolve_for_addresses(&addresses)
        .await;
    let after = book.apply_all(batch.into_updates()).unwrap();

    let record = after.get(0).unwrap();
    assert_eq!(record.username.as_deref(), Some("alice.id"));
    assert_eq!(record.profile, book.get(0).unwrap().profile);
    assert_eq!(record.trust_level, 1);
    assert!(record.last_error.is_some());
}

#[tokio::test]
async fn test_proof_service_outage_keeps_verifications() {
    let account = account(1);
    let addresses = addresses(&account);
    let config = RegistryConfig::default();
    let transport = Arc::new(MockTransport::new());
    register(&transport, &config, "alice.id", &account.keypairs[0]);
    transport.respond(Method::Post, &config.proof_validation_url, 503, "unavailable");

    let batch = ProfileResolver::new(config, transport)
        .resolve_for_addresses(&addresses)
        .await;
    assert_eq!(batch.failures().count(), 0);

    let updates = batch.into_updates();
    assert!(updates
        .iter()
        .all(|u| !matches!(u, IdentityUpdate::VerificationsUpdated { .. })));
    let book = IdentityBook::for_addresses(&addresses)
        .apply_all(updates)
        .unwrap();
    assert!(book.get(0).unwrap().profile.is_some());
    assert_eq!(book.get(0).unwrap().trust_level, 0);
}

#[tokio::test]
async fn test_public_identity_lookup() {
    let account = account(1);
    let config = RegistryConfig::default();
    let transport = Arc::new(MockTransport::new());
    register(&transport, &config, "alice.id", &account.keypairs[0]);
    proof_service(&transport, &config);

    let identity = ProfileResolver::new(config, transport)
        .fetch_public_identity("alice.id")
        .await;
    assert_eq!(identity.record.owner_address, account.keypairs[0].address);
    assert_eq!(identity.record.trust_level, 1);

    let book = IdentityBook::new()
        .apply(IdentityUpdate::PublicIdentityUpdated(identity))
        .unwrap();
    assert!(book.public.contains_key("alice.id"));
    assert!(book.local.is_empty());
}

#[tokio::test]
async fn test_zone_file_update_and_transfer_broadcast() {
    let account = account(2);
    let config = RegistryConfig {
        core_api_password: Some("hunter2".into()),
        ..RegistryConfig::default()
    };
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Put, &config.zone_file_url("alice.id"), 200, "{}");
    transport.respond(
        Method::Put,
        &config.transfer_url("bob.id"),
        400,
        json!({ "error": "name is not owned by this key" }).to_string(),
    );

    let requests = vec![
        BroadcastRequest {
            name: "alice.id".into(),
            keypair: account.keypairs[0].clone(),
            operation: NameOperation::ZoneFileUpdate {
                zone_file: make_zone_file("alice.id", "https://storage.example/alice.json"),
            },
        },
        BroadcastRequest {
            name: "bob.id".into(),
            keypair: account.keypairs[1].clone(),
            operation: NameOperation::Transfer {
                new_owner_address: "1BoatSLRHtKNngkdXEeobR76b53LETtpyT".into(),
            },
        },
    ];

    let broadcaster = Broadcaster::new(config, transport.clone());
    let (statuses, results) = broadcaster
        .broadcast_all(&NameBroadcasts::new(), &requests)
        .await;

    assert_eq!(results.len(), 2);
    assert!(results[0].1.is_ok());
    assert!(results[1].1.is_err());
    assert_eq!(statuses.status("alice.id"), Some(&BroadcastStatus::Broadcasted));
    assert!(matches!(
        statuses.status("bob.id"),
        Some(BroadcastStatus::BroadcastError(reason)) if reason.contains("not owned")
    ));

    for request in transport.requests() {
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.header("Authorization"), Some("bearer hunter2"));
        let owner_key = request.body.as_ref().unwrap()["owner_key"].as_str().unwrap();
        assert!(owner_key.ends_with("01"));
    }
}

#[tokio::test]
async fn test_balances_and_withdrawal_flow() {
    let account = account(1);
    let mnemonic = parse_mnemonic(PHRASE).unwrap();
    let master = MasterKeychain::from_mnemonic(&mnemonic, "", Network::Bitcoin).unwrap();
    let payment = derive_chain(&master, ChainPurpose::Payment).unwrap();

    let ledger = AccountLedger::new()
        .apply(LedgerEvent::AccountCreated {
            encrypted_secret: stackid_core::SecretCodec::new(stackid_core::KdfParams {
                m_cost: 1024,
                t_cost: 1,
                p_cost: 1,
            })
            .unwrap()
            .encrypt(PHRASE.as_bytes(), "pw")
            .unwrap(),
            identity_public_keychain: account.identity.public_keychain(),
            payment_public_keychain: payment.public_keychain(),
            first_identity_keypair: account.keypairs[0].public_only(),
            first_payment_address: derive_address(&payment, 0).unwrap().address,
        })
        .unwrap()
        .apply(LedgerEvent::NextPaymentAddressUsed)
        .unwrap();
    let payment_addresses = ledger.payment.addresses.clone();

    let config = RegistryConfig {
        core_api_password: Some("hunter2".into()),
        ..RegistryConfig::default()
    };
    let transport = Arc::new(MockTransport::new());
    transport.on_get(
        &config.balance_url(&payment_addresses[0]),
        json!({ "balance": 0.5, "unconfirmedBalance": 0.25 }),
    );
    transport.on_get(&config.balance_url(&payment_addresses[1]), json!({ "balance": 1.0 }));
    transport.on_get(&config.wallet_payment_address_url, json!({ "address": "1CoreWallet" }));
    transport.on_get(
        &config.balance_url("1CoreWallet"),
        json!({ "balance": 0.1, "unconfirmedBalance": 0.05 }),
    );
    transport.respond(
        Method::Post,
        &config.core_wallet_withdraw_url,
        200,
        json!({ "transaction_hash": "ab".repeat(32) }).to_string(),
    );

    let wallet = WalletClient::new(config, transport);

    // Payment balances count confirmed funds only
    let ledger = ledger
        .apply(wallet.refresh_balances(&payment_addresses).await.unwrap())
        .unwrap();
    assert_eq!(ledger.payment.balances.total, 1.5);

    let ledger = ledger
        .apply(wallet.core_wallet_address().await.unwrap())
        .unwrap();
    let core_address = ledger.core_wallet.address.clone().unwrap();
    let ledger = ledger
        .apply(wallet.core_wallet_balance(&core_address).await.unwrap())
        .unwrap();
    assert!((ledger.core_wallet.balance - 0.15).abs() < 1e-9);

    let events = wallet
        .withdraw(&ledger.core_wallet.withdrawal, &payment_addresses[0])
        .await
        .unwrap();
    let ledger = ledger
        .apply_all(events.into_iter().map(LedgerEvent::Withdrawal))
        .unwrap();
    assert_eq!(
        ledger.core_wallet.withdrawal,
        WithdrawalState::Success {
            recipient: payment_addresses[0].clone()
        }
    );
}

#[tokio::test]
async fn test_withdrawal_rejected_by_node() {
    let config = RegistryConfig {
        core_api_password: Some("hunter2".into()),
        ..RegistryConfig::default()
    };
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        Method::Post,
        &config.core_wallet_withdraw_url,
        200,
        json!({ "error": "Insufficient funds" }).to_string(),
    );

    let events = WalletClient::new(config, transport)
        .withdraw(&WithdrawalState::Idle, "1Recipient")
        .await
        .unwrap();
    let state = events
        .iter()
        .try_fold(WithdrawalState::Idle, |state, event| state.transition(event))
        .unwrap();
    assert!(matches!(
        state,
        WithdrawalState::Error { ref reason, .. } if reason.contains("Insufficient funds")
    ));
}

#[tokio::test]
async fn test_second_withdrawal_refused_while_in_flight() {
    let config = RegistryConfig {
        core_api_password: Some("hunter2".into()),
        ..RegistryConfig::default()
    };
    let transport = Arc::new(MockTransport::new());
    transport.respond(
        Method::Post,
        &config.core_wallet_withdraw_url,
        200,
        json!({ "transaction_hash": "cd".repeat(32) }).to_string(),
    );
    let wallet = WalletClient::new(config, transport.clone());

    let ledger = AccountLedger::new()
        .apply(LedgerEvent::Withdrawal(WithdrawalEvent::StartBuild {
            recipient: "1First".into(),
        }))
        .unwrap();
    assert!(ledger.core_wallet.withdrawal.in_progress());

    let err = wallet
        .withdraw(&ledger.core_wallet.withdrawal, "1Second")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(_)));
    assert!(transport.requests().is_empty());
}
