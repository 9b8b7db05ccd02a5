//! StackID, a headless identity wallet
//!
//! Manages the encrypted recovery phrase, both address chains and the
//! identities registered to them.
//!
//! # Usage
//!
//! ```bash
//! STACKID_PASSWORD=... stackid init
//! stackid --config stackid.toml refresh-identities
//! stackid lookup alice.id
//! stackid --validate
//! ```

mod commands;
mod config;

use anyhow::{Context, Result};
use stackid_core::ChainPurpose;
use std::path::PathBuf;

fn main() -> Result<()> {
    // Parse CLI args (minimal, no clap dependency needed)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from("stackid.toml");
    let mut explicit_config = false;
    let mut validate_only = false;
    let mut command: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = PathBuf::from(&args[i]);
                    explicit_config = true;
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--validate" => {
                validate_only = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("stackid {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other if other.starts_with('-') => {
                anyhow::bail!("Unknown argument: {}", other);
            }
            other => command.push(other.to_string()),
        }
        i += 1;
    }

    // Load config; a missing default file means built-in defaults
    let mut cli_config = if explicit_config || config_path.exists() {
        config::CliConfig::from_file(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        config::CliConfig::default()
    };

    cli_config.apply_env_overrides();

    cli_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &cli_config.wallet.log_level);
    env_logger::init();

    if validate_only || command.first().map(String::as_str) == Some("validate") {
        println!("Configuration is valid.");
        println!("  Network:        {}", cli_config.wallet.network);
        println!("  Data dir:       {}", cli_config.wallet.data_dir.display());
        println!("  Name lookup:    {}", cli_config.registry.name_lookup_url);
        println!("  Address lookup: {}", cli_config.registry.address_lookup_url);
        println!("  Storage hub:    {}", cli_config.registry.gaia_url_prefix);
        println!("  Proof mode:     {:?}", cli_config.registry.proof_mode);
        println!(
            "  Core API auth:  {}",
            cli_config.registry.core_api_password.is_some()
        );
        return Ok(());
    }

    let Some(name) = command.first() else {
        print_help();
        anyhow::bail!("No command given");
    };

    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    match name.as_str() {
        "init" => commands::init(&cli_config),
        "addresses" => commands::addresses(&cli_config),
        "next-address" => {
            let chain = command
                .get(1)
                .context("next-address requires a chain: identity or payment")?;
            let purpose: ChainPurpose = chain
                .parse()
                .with_context(|| format!("Unknown chain: {}", chain))?;
            commands::next_address(&cli_config, purpose)
        }
        "unlock-check" => commands::unlock_check(&cli_config),
        "refresh-identities" => rt.block_on(commands::refresh_identities(&cli_config)),
        "refresh-balances" => rt.block_on(commands::refresh_balances(&cli_config)),
        "lookup" => {
            let username = command.get(1).context("lookup requires a name")?;
            rt.block_on(commands::lookup(&cli_config, username))
        }
        other => anyhow::bail!("Unknown command: {}", other),
    }
}

fn print_help() {
    println!(
        r#"StackID, a headless identity wallet

USAGE:
    stackid [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
    init                          Create or restore the account
    addresses                     List identity and payment addresses
    next-address <identity|payment>
                                  Derive the next address on a chain
    unlock-check                  Verify the wallet password
    refresh-identities            Resolve names and profiles for all identities
    refresh-balances              Fetch payment address balances
    lookup <name>                 Resolve someone else's name
    validate                      Validate configuration and exit

OPTIONS:
    -c, --config <PATH>   Config file path (default: stackid.toml)
    --validate            Validate config file and exit
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    STACKID_DATA_DIR            Data directory path
    STACKID_LOG_LEVEL           Log level (error/warn/info/debug/trace)
    STACKID_NETWORK             Bitcoin network (bitcoin/testnet/signet/regtest)
    STACKID_CORE_API_PASSWORD   Registry node API password
    STACKID_NAME_LOOKUP_URL     Name lookup URL template ({{name}})
    STACKID_ADDRESS_LOOKUP_URL  Address lookup URL template ({{address}})
    STACKID_GAIA_URL_PREFIX     Profile storage hub prefix

    STACKID_PASSWORD            Wallet password (init, unlock-check)
    STACKID_PHRASE              Recovery phrase to restore (init)

EXAMPLES:
    # Create a new account
    STACKID_PASSWORD=... stackid init

    # Refresh identities with a custom config
    stackid --config stackid.toml refresh-identities
"#
    );
}
