//! Command implementations
//!
//! Every command loads the snapshot, applies events, and saves the snapshot
//! back when the durable state changed.

use anyhow::{Context, Result};
use stackid_core::{
    decrypt_phrase, derive_address, derive_chain, encrypt_phrase, ensure_mnemonic, ChainPurpose,
    MasterKeychain,
};
use stackid_ledger::{
    AccountLedger, IdentityBook, IdentityUpdate, LedgerEvent, LedgerSnapshot,
};
use stackid_registry::{ProfileResolver, ReqwestTransport, WalletClient};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CliConfig;

fn load(config: &CliConfig) -> Result<(AccountLedger, IdentityBook)> {
    let path = config.snapshot_path();
    let snapshot = LedgerSnapshot::load(&path)
        .with_context(|| format!("Failed to load snapshot from {}", path.display()))?;
    Ok(snapshot.restore()?)
}

fn load_account(config: &CliConfig) -> Result<(AccountLedger, IdentityBook)> {
    let (ledger, book) = load(config)?;
    anyhow::ensure!(
        ledger.account_created,
        "No account found in {}. Run `stackid init` first.",
        config.wallet.data_dir.display()
    );
    Ok((ledger, book))
}

fn save(config: &CliConfig, ledger: &AccountLedger, book: &IdentityBook) -> Result<()> {
    let path = config.snapshot_path();
    LedgerSnapshot::capture(ledger, book)
        .save(&path)
        .with_context(|| format!("Failed to save snapshot to {}", path.display()))
}

fn password_from_env() -> Result<String> {
    let password = std::env::var("STACKID_PASSWORD")
        .context("STACKID_PASSWORD must be set to the wallet password")?;
    anyhow::ensure!(!password.is_empty(), "STACKID_PASSWORD must not be empty");
    Ok(password)
}

fn transport(config: &CliConfig) -> Result<Arc<ReqwestTransport>> {
    let timeout = Duration::from_secs(config.registry.request_timeout_secs);
    Ok(Arc::new(ReqwestTransport::new(timeout)?))
}

/// Create or restore the account
pub fn init(config: &CliConfig) -> Result<()> {
    let (existing, _) = load(config)?;
    anyhow::ensure!(
        !existing.account_created,
        "An account already exists in {}",
        config.wallet.data_dir.display()
    );

    let password = password_from_env()?;
    let supplied = std::env::var("STACKID_PHRASE").ok();
    let (mnemonic, fresh) = ensure_mnemonic(supplied.as_deref())?;

    let master = MasterKeychain::from_mnemonic(&mnemonic, "", config.network())?;
    let identity = derive_chain(&master, ChainPurpose::Identity)?;
    let payment = derive_chain(&master, ChainPurpose::Payment)?;

    log::info!("Encrypting recovery phrase");
    let encrypted_secret =
        encrypt_phrase(&mnemonic, &password).context("Failed to encrypt recovery phrase")?;

    let ledger = AccountLedger::new().apply(LedgerEvent::AccountCreated {
        encrypted_secret,
        identity_public_keychain: identity.public_keychain(),
        payment_public_keychain: payment.public_keychain(),
        first_identity_keypair: derive_address(&identity, 0)?.public_only(),
        first_payment_address: derive_address(&payment, 0)?.address,
    })?;
    let book = IdentityBook::for_addresses(&ledger.identity.addresses);
    save(config, &ledger, &book)?;

    println!("Account created.");
    if fresh {
        println!();
        println!("Write down your recovery phrase and keep it offline:");
        println!();
        println!("    {}", mnemonic);
        println!();
    }
    print_addresses(&ledger);
    Ok(())
}

/// List both chains' addresses
pub fn addresses(config: &CliConfig) -> Result<()> {
    let (ledger, _) = load_account(config)?;
    print_addresses(&ledger);
    Ok(())
}

fn print_addresses(ledger: &AccountLedger) {
    for purpose in [ChainPurpose::Identity, ChainPurpose::Payment] {
        println!("{} addresses:", purpose);
        for (i, address) in ledger.addresses(purpose).iter().enumerate() {
            println!("  [{}] {}", i, address);
        }
    }
}

/// Derive and record the next address on a chain
pub fn next_address(config: &CliConfig, purpose: ChainPurpose) -> Result<()> {
    let (ledger, mut book) = load_account(config)?;
    let event = match purpose {
        ChainPurpose::Identity => LedgerEvent::NextIdentityAddressUsed,
        ChainPurpose::Payment => LedgerEvent::NextPaymentAddressUsed,
    };
    let ledger = ledger.apply(event)?;
    let index = ledger.address_index(purpose) as usize;
    let address = ledger.addresses(purpose)[index].clone();

    if purpose == ChainPurpose::Identity {
        book = book.apply(IdentityUpdate::IdentityCreated {
            index,
            owner_address: address.clone(),
        })?;
    }
    save(config, &ledger, &book)?;

    println!("New {} address [{}]: {}", purpose, index, address);
    Ok(())
}

/// Check the password opens the stored phrase and that it matches the account
pub fn unlock_check(config: &CliConfig) -> Result<()> {
    let (ledger, _) = load_account(config)?;
    let password = password_from_env()?;
    let encrypted = ledger
        .encrypted_secret
        .as_ref()
        .context("Account has no encrypted recovery phrase")?;

    let mnemonic = decrypt_phrase(encrypted, &password).context("Wrong password")?;
    let master = MasterKeychain::from_mnemonic(&mnemonic, "", config.network())?;
    let identity = derive_chain(&master, ChainPurpose::Identity)?;
    anyhow::ensure!(
        ledger.identity.public_keychain.as_deref() == Some(identity.public_keychain().as_str()),
        "Recovery phrase does not match this account"
    );

    println!("Password OK.");
    Ok(())
}

/// Resolve every identity address and store the results
pub async fn refresh_identities(config: &CliConfig) -> Result<()> {
    let (ledger, mut book) = load_account(config)?;
    let resolver = ProfileResolver::new(config.registry.clone(), transport(config)?);

    let batch = resolver
        .resolve_for_addresses(&ledger.identity.addresses)
        .await;
    for (address, error) in batch.failures() {
        println!("  {}: {}", address, error);
    }

    for update in batch.into_updates() {
        match book.apply(update) {
            Ok(next) => book = next,
            Err(e) => log::warn!("Skipping identity update: {}", e),
        }
    }
    save(config, &ledger, &book)?;

    for (i, record) in book.local.iter().enumerate() {
        println!(
            "[{}] {} {} trust={}{}",
            i,
            record.owner_address,
            record.username.as_deref().unwrap_or("-"),
            record.trust_level,
            if record.last_error.is_some() { " (stale)" } else { "" }
        );
    }
    Ok(())
}

/// Fetch balances for every payment address
pub async fn refresh_balances(config: &CliConfig) -> Result<()> {
    let (ledger, _) = load_account(config)?;
    let wallet = WalletClient::new(config.registry.clone(), transport(config)?);

    let event = wallet
        .refresh_balances(&ledger.payment.addresses)
        .await
        .context("Balance refresh failed")?;
    let ledger = ledger.apply(event)?;

    for (address, balance) in &ledger.payment.balances.by_address {
        println!("  {} {:.8}", address, balance);
    }
    println!("Total: {:.8} BTC", ledger.payment.balances.total);
    Ok(())
}

/// Look up someone else's name
pub async fn lookup(config: &CliConfig, name: &str) -> Result<()> {
    let resolver = ProfileResolver::new(config.registry.clone(), transport(config)?);
    let identity = resolver.fetch_public_identity(name).await;
    println!("{}", serde_json::to_string_pretty(&identity)?);
    Ok(())
}
