//! Live Registry Tests
//!
//! These tests make REAL network calls. No mocks.
//! Run with: cargo test -p stackid-e2e --test live_registry -- --ignored --nocapture
//!
//! Endpoints come from `RegistryConfig::default()`; point STACKID_NAME_LOOKUP_URL
//! and friends at a reachable node to run them elsewhere.

use stackid_registry::{ProfileResolver, RegistryConfig, ReqwestTransport, WalletClient};
use std::sync::Arc;
use std::time::Duration;

const KNOWN_NAME: &str = "muneeb.id";
const KNOWN_ADDRESS: &str = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";

fn config() -> RegistryConfig {
    let mut config = RegistryConfig::default();
    if let Ok(url) = std::env::var("STACKID_NAME_LOOKUP_URL") {
        config.name_lookup_url = url;
    }
    if let Ok(url) = std::env::var("STACKID_ADDRESS_LOOKUP_URL") {
        config.address_lookup_url = url;
    }
    config
}

fn transport() -> Arc<ReqwestTransport> {
    Arc::new(ReqwestTransport::new(Duration::from_secs(20)).unwrap())
}

#[tokio::test]
#[ignore = "requires network access - registry node"]
async fn test1_lookup_known_name() {
    println!("\n=== TEST 1: Name Lookup ===\n");

    let resolver = ProfileResolver::new(config(), transport());
    match resolver.lookup_name(KNOWN_NAME).await {
        Ok(record) => {
            println!("  Owner: {}", record.address);
            println!("  Expires at block: {:?}", record.expire_block);
            assert!(!record.zonefile.is_empty());
        }
        Err(e) => panic!("Lookup of {} failed: {}", KNOWN_NAME, e),
    }
}

#[tokio::test]
#[ignore = "requires network access - registry node"]
async fn test2_public_identity() {
    println!("\n=== TEST 2: Public Identity ===\n");

    let identity = ProfileResolver::new(config(), transport())
        .fetch_public_identity(KNOWN_NAME)
        .await;
    println!("  Owner: {}", identity.record.owner_address);
    println!("  Trust level: {}", identity.record.trust_level);
    for v in &identity.record.verifications {
        println!("    - {} {} valid={}", v.service, v.identifier, v.valid);
    }
    if let Some(error) = &identity.record.last_error {
        println!("  ⚠ {}", error);
    }
    assert_eq!(identity.username, KNOWN_NAME);
}

#[tokio::test]
#[ignore = "requires network access - registry node"]
async fn test3_address_batch() {
    println!("\n=== TEST 3: Address Batch ===\n");

    let batch = ProfileResolver::new(config(), transport())
        .resolve_for_addresses(&[KNOWN_ADDRESS.to_string()])
        .await;
    assert_eq!(batch.results.len(), 1);
    for (address, error) in batch.failures() {
        println!("  ✗ {}: {}", address, error);
    }
    println!("  Ownership: {:?}", batch.results[0].ownership);
}

#[tokio::test]
#[ignore = "requires network access - block explorer"]
async fn test4_address_balance() {
    println!("\n=== TEST 4: Address Balance ===\n");

    let event = WalletClient::new(config(), transport())
        .refresh_balances(&[KNOWN_ADDRESS.to_string()])
        .await;
    match event {
        Ok(event) => println!("  {:?}", event),
        Err(e) => panic!("Balance lookup failed: {}", e),
    }
}
