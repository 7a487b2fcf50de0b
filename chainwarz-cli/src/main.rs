//! ChainWarZ CLI - drive the wallet core against a JSON-RPC wallet endpoint.
//!
//! The endpoint stands in for a browser-injected wallet: a local dev node
//! with unlocked accounts works, as does any signer that speaks EIP-1193
//! over HTTP.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use chainwarz::config::IssueLevel;
use chainwarz::prelude::*;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// ChainWarZ - send strikes from the command line
#[derive(Parser)]
#[command(name = "chainwarz")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(
        short,
        long,
        env = "CHAINWARZ_CONFIG",
        default_value = "chainwarz.json",
        global = true
    )]
    config: PathBuf,

    /// JSON-RPC endpoint of the wallet
    #[arg(
        short,
        long,
        env = "CHAINWARZ_WALLET_URL",
        default_value = "http://127.0.0.1:8545",
        global = true
    )]
    wallet_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect the wallet and show the account and chain
    Connect,

    /// Show the session state without prompting the wallet
    Status,

    /// Send one strike on a configured chain
    Strike {
        /// Chain key, e.g. "base"
        chain: String,
    },

    /// Show a player profile
    Profile {
        /// Wallet address (defaults to the connected account)
        address: Option<String>,

        /// Look up by Farcaster fid instead
        #[arg(long, conflicts_with = "address")]
        fid: Option<u64>,
    },

    /// Show the leaderboard for a chain
    Leaderboard {
        /// Chain key, e.g. "base"
        chain: String,
    },

    /// List configured chains and validate the configuration
    Chains,

    /// Convert a decimal amount to its smallest unit
    Wei {
        /// Decimal amount, e.g. "0.000001337"
        amount: String,

        /// Currency decimals
        #[arg(short, long, default_value_t = ETHER_DECIMALS)]
        decimals: u8,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<Error>() {
                Some(err) => println!("{}", err.status_message()),
                None => tracing::error!("{e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "chainwarz={level},chainwarz_cli={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Wei { amount, decimals } => cmd_wei(&amount, decimals),
        Commands::Chains => cmd_chains(&cli.config),
        Commands::Connect => cmd_connect(&cli.config, &cli.wallet_url).await,
        Commands::Status => cmd_status(&cli.config, &cli.wallet_url).await,
        Commands::Strike { chain } => cmd_strike(&cli.config, &cli.wallet_url, &chain).await,
        Commands::Profile { address, fid } => {
            cmd_profile(&cli.config, &cli.wallet_url, address, fid).await
        }
        Commands::Leaderboard { chain } => cmd_leaderboard(&cli.config, &chain).await,
    }
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let config = AppConfig::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    for issue in config.validate() {
        match issue.level {
            IssueLevel::Error => tracing::error!("config: {}", issue.message),
            IssueLevel::Warning => tracing::warn!("config: {}", issue.message),
        }
    }
    Ok(config)
}

fn backend(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn BackendService>>> {
    let Some(url) = &config.backend_url else {
        return Ok(None);
    };
    let backend = HttpBackend::new(url, config.backend_timeout())?;
    Ok(Some(Arc::new(backend)))
}

async fn session(config_path: &Path, wallet_url: &str) -> anyhow::Result<WalletSession> {
    let config = load_config(config_path)?;
    let registry = config.registry()?;

    let wallet: BoxedProvider = Arc::new(HttpProvider::new(wallet_url)?);
    let selected = select_provider(false, None, Some(wallet)).await?;

    let mut builder = WalletSession::builder(registry)
        .negotiation(config.negotiation.into())
        .provider(selected);
    if let Some(backend) = backend(&config)? {
        builder = builder.backend(backend);
    }
    Ok(builder.build())
}

fn cmd_wei(amount: &str, decimals: u8) -> anyhow::Result<()> {
    let value = parse_units(amount, decimals)?;
    println!("{value}");
    println!("{}", to_hex_quantity(value));
    Ok(())
}

fn cmd_chains(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = config.registry()?;

    for chain in registry.iter() {
        let currency = chain.native_currency();
        println!(
            "{:<10} {:<8} {:<16} {} {} ({} wei) -> {}",
            chain.key(),
            chain.chain_id().to_string(),
            chain.name(),
            format_units(chain.strike_amount(), currency.decimals),
            currency.symbol,
            chain.strike_amount(),
            chain.contract(),
        );
    }
    Ok(())
}

async fn cmd_connect(config_path: &Path, wallet_url: &str) -> anyhow::Result<()> {
    let session = session(config_path, wallet_url).await?;
    let address = session.connect().await?;

    println!("Account: {address}");
    match session.chain_id() {
        Some(chain_id) => {
            let name = session
                .registry()
                .by_chain_id(chain_id)
                .map_or("unconfigured", ChainDescriptor::name);
            println!("Chain:   {chain_id} ({name})");
        }
        None => println!("Chain:   unknown"),
    }
    println!("Source:  {}", session.source());
    Ok(())
}

async fn cmd_status(config_path: &Path, wallet_url: &str) -> anyhow::Result<()> {
    let session = session(config_path, wallet_url).await?;
    if session.restore().await?.is_none() {
        println!("Not connected. Run `chainwarz connect` first.");
        return Ok(());
    }
    if let Err(e) = session.refresh_profile().await {
        tracing::warn!("profile unavailable: {e}");
    }

    let snapshot = session.snapshot();
    if let Some(account) = snapshot.account {
        println!("Account: {account}");
    }
    if let Some(chain_id) = snapshot.chain_id {
        println!("Chain:   {chain_id}");
    }
    println!("Source:  {}", snapshot.source);
    if let Some(profile) = snapshot.profile {
        print_profile(&profile);
    }
    Ok(())
}

async fn cmd_strike(config_path: &Path, wallet_url: &str, chain: &str) -> anyhow::Result<()> {
    let session = session(config_path, wallet_url).await?;
    if session.restore().await?.is_none() {
        session.connect().await?;
    }

    let strike = session.send_strike(chain).await?;
    println!("Strike sent on {}", strike.chain);
    println!("Tx:       {}", strike.tx_hash);
    println!("Explorer: {}", strike.explorer_url);
    Ok(())
}

async fn cmd_profile(
    config_path: &Path,
    wallet_url: &str,
    address: Option<String>,
    fid: Option<u64>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let Some(backend) = backend(&config)? else {
        bail!("backendUrl is not configured");
    };

    let profile = if let Some(fid) = fid {
        backend.profile_by_fid(fid).await?
    } else if let Some(address) = address {
        let address = address
            .parse()
            .with_context(|| format!("invalid address '{address}'"))?;
        backend.profile_by_address(address).await?
    } else {
        let session = session(config_path, wallet_url).await?;
        let Some(address) = session.restore().await? else {
            bail!("no address given and no wallet connected");
        };
        backend.profile_by_address(address).await?
    };

    print_profile(&profile);
    Ok(())
}

async fn cmd_leaderboard(config_path: &Path, chain: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = config.registry()?;
    let Some(descriptor) = registry.get(chain) else {
        return Err(Error::UnknownChain(chain.to_owned()).into());
    };
    let Some(backend) = backend(&config)? else {
        bail!("backendUrl is not configured");
    };

    let entries = backend.leaderboard(descriptor.key()).await?;
    if entries.is_empty() {
        println!("No strikes on {} yet.", descriptor.name());
    }
    for entry in entries {
        let name = entry.display_name.as_deref().unwrap_or(&entry.address);
        println!("{:>4}. {:<42} {}", entry.rank, name, entry.strikes);
    }
    Ok(())
}

fn print_profile(profile: &PlayerProfile) {
    println!(
        "Player:  {}",
        profile.display_name.as_deref().unwrap_or(&profile.address)
    );
    for (chain, strikes) in &profile.strikes {
        println!("  {chain:<10} {strikes}");
    }
    println!("  {:<10} {}", "total", profile.total_strikes());
}
