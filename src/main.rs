//! `wallet-sync` command line.
//!
//! ```text
//! config ──▶ logging / metrics
//!        ──▶ Wallet (env key) ──▶ BlockchainClient ──▶ RpcWallet poller ─┐
//!                                                  └──▶ AlloyContractRpc ─┤
//!                                                                         ▼
//!                                                  Session ──▶ CliSink ──▶ stdout
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use wallet_sync::blockchain::{AlloyContractRpc, BlockchainClient, ContractArtifact, RpcWallet, Wallet};
use wallet_sync::config::{load_config, AppConfig};
use wallet_sync::lifecycle::{signals, Shutdown};
use wallet_sync::observability::{logging, metrics};
use wallet_sync::session::format::short_address;
use wallet_sync::session::{
    Session, SessionError, SessionSink, SessionSnapshot, WalletProvider, WatchSink,
};

#[derive(Parser)]
#[command(name = "wallet-sync")]
#[command(about = "Keep a wallet session, its balance and its contract in sync", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconnect and print every snapshot change until interrupted
    Watch {
        /// Request account access instead of only reusing an existing grant
        #[arg(long)]
        connect: bool,
    },
    /// Deploy the contract once, optionally update the greeting, print the snapshot
    Greeter {
        /// New greeting to write
        #[arg(long)]
        set: Option<String>,
    },
}

/// Prints snapshots and announces activations.
struct CliSink {
    inner: WatchSink,
}

impl SessionSink for CliSink {
    fn publish(&self, snapshot: &SessionSnapshot) {
        self.inner.publish(snapshot);
    }

    fn on_activated(&self, account: Address) {
        tracing::info!(account = %short_address(&account), "Wallet connected");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("wallet-sync v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let wallet = Wallet::from_env(&config.wallet.private_key_env)?;
    let client = BlockchainClient::new(config.blockchain.clone(), wallet.as_ref()).await?;
    let artifact = ContractArtifact::load(config.contract.artifact_path.as_ref())?;
    let constructor_args = artifact.constructor_args(&config.contract.constructor_args)?;

    let provider = Arc::new(RpcWallet::new(
        client.clone(),
        wallet.as_ref().map(Wallet::address),
    ));
    let rpc = Arc::new(AlloyContractRpc::new(client, artifact.clone()));

    let reachability = provider.reachability();
    let shutdown = Shutdown::new();
    let poller = tokio::spawn(provider.clone().run(shutdown.subscribe()));
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let (inner, snapshots) = WatchSink::new();
    let session = Session::new(
        Some(provider as Arc<dyn WalletProvider>),
        rpc,
        Arc::new(CliSink { inner }),
        &config.contract,
    );

    let outcome = match cli.command {
        Commands::Watch { connect } => {
            run_watch(&session, connect, snapshots, reachability, &shutdown).await
        }
        Commands::Greeter { set } => {
            run_greeter(&session, &artifact, constructor_args, &config, set).await
        }
    };

    session.shutdown();
    shutdown.trigger();
    let _ = poller.await;

    outcome?;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_watch(
    session: &Session,
    connect: bool,
    mut snapshots: watch::Receiver<SessionSnapshot>,
    mut reachability: watch::Receiver<bool>,
    shutdown: &Shutdown,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stop = shutdown.subscribe();

    if connect {
        let state = session.connection().activate(true).await;
        if let Some(error) = state.error {
            tracing::warn!(error = %error, "Activation failed, waiting for provider events");
        }
    } else if !session.start().await {
        tracing::info!("No authorized account yet, run with --connect to request access");
    }

    print_snapshot(&snapshots.borrow_and_update())?;
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                print_snapshot(&snapshots.borrow_and_update())?;
            }
            changed = reachability.changed() => {
                if changed.is_err() {
                    break;
                }
                let reachable = *reachability.borrow_and_update();
                if reachable && !session.reconnect().await {
                    tracing::info!("Provider is back but no account is authorized");
                }
            }
            _ = stop.recv() => break,
        }
    }
    Ok(())
}

async fn run_greeter(
    session: &Session,
    artifact: &ContractArtifact,
    constructor_args: Vec<alloy::dyn_abi::DynSolValue>,
    config: &AppConfig,
    set: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = session.connection().activate(true).await;
    if !state.is_active() {
        if let Some(error) = state.error {
            return Err(error.into());
        }
        return Err(SessionError::AuthorizationRejected("no account authorized".to_string()).into());
    }

    let address = session.contract().deploy(constructor_args).await?;
    tracing::info!(address = %address, "Greeter ready");

    match set {
        Some(text) => {
            let args = artifact.method_args(&config.contract.write_method, &[text])?;
            session
                .contract()
                .write(&config.contract.write_method, args)
                .await?;
        }
        None => {
            session.contract().read(&config.contract.read_method).await?;
        }
    }

    println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    Ok(())
}

fn print_snapshot(snapshot: &SessionSnapshot) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(snapshot)?);
    Ok(())
}
