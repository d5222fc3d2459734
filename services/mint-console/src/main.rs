mod render;

use alloy_primitives::Address;
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use knot_client::config::{CHAIN_ID_VAR, CONTRACT_ADDRESS_VAR};
use knot_client::{ClientConfig, MintClient, WhitelistDraft};
use knot_provider::WalletProvider;
use knot_provider_jsonrpc::{DEFAULT_ENDPOINT, JsonRpcProvider, NODE_CONNECTOR};
use knot_types::{NetworkId, TxKind, TxStatus};
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;
use tracing::info;

/// Initial contract reads must finish within this window.
const LOAD_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Parser)]
#[command(name = "mint-console", version, about = "Terminal front-end for the KnotNFT mint page")]
struct Cli {
    /// JSON-RPC endpoint of a development node with unlocked accounts.
    #[arg(long, env = "ENDPOINT_URL", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Address of the deployed KnotNFT contract.
    #[arg(long, env = CONTRACT_ADDRESS_VAR)]
    contract: Address,

    /// Network the contract lives on.
    #[arg(long, env = CHAIN_ID_VAR, default_value_t = NetworkId::LOCALHOST.0)]
    chain_id: u64,

    /// Block and receipt polling interval, in milliseconds.
    #[arg(long, default_value_t = 4000)]
    poll_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render the mint page once.
    Status,
    /// Re-render on every change until Ctrl-C.
    Watch,
    /// Mint one token at the current sale price.
    Mint,
    /// Add an address to the whitelist (owner only).
    Whitelist { address: String },
    /// List wallet connectors and their readiness.
    Connectors,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    LocalSet::new().run_until(run(cli)).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let provider = Rc::new(
        JsonRpcProvider::new(Some(cli.endpoint))
            .with_poll_interval(Duration::from_millis(cli.poll_ms)),
    );

    if let Command::Connectors = cli.command {
        for connector in provider.connectors() {
            let readiness = if connector.ready { "ready" } else { "not supported" };
            println!("{:<12} {} ({})", connector.id, connector.name, readiness);
        }
        return Ok(());
    }

    let config = ClientConfig::new(cli.contract, NetworkId(cli.chain_id));
    let client = MintClient::new(config, provider.clone());
    let _watcher = provider.spawn_block_watcher();

    client.start().await;
    client
        .connect(NODE_CONNECTOR)
        .await
        .with_context(|| format!("connecting to {}", provider.endpoint()))?;
    wait_for_load(&client).await?;
    info!("read-model loaded for contract {}", cli.contract);

    match cli.command {
        Command::Status => print_view(&client),
        Command::Watch => watch(&client).await?,
        Command::Mint => {
            client.mint()?;
            settle(&client, TxKind::Mint).await?;
        }
        Command::Whitelist { address } => {
            client.add_to_whitelist(&address)?;
            settle(&client, TxKind::AddToWhitelist).await?;
        }
        Command::Connectors => {}
    }
    Ok(())
}

async fn wait_for_load(client: &MintClient) -> anyhow::Result<()> {
    let mut snapshot = client.read_model().subscribe();
    tokio::time::timeout(
        LOAD_TIMEOUT,
        snapshot.wait_for(|snapshot| snapshot.sell_price.is_some() && snapshot.owner.is_some()),
    )
    .await
    .context("timed out reading the contract; is the address right?")??;
    Ok(())
}

fn print_view(client: &MintClient) {
    println!("{}", render::render(&client.view(&WhitelistDraft::default())));
}

async fn watch(client: &MintClient) -> anyhow::Result<()> {
    let mut changes = client.subscribe();
    print_view(client);
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if !changed {
                    break;
                }
                print_view(client);
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }
    Ok(())
}

/// Print every status change of `kind` until it settles; fail on `Failed`.
async fn settle(client: &MintClient, kind: TxKind) -> anyhow::Result<()> {
    let mut updates = client.dispatcher().subscribe(kind);
    loop {
        let tx = updates.borrow_and_update().clone();
        info!("{:?}: {:?}", kind, tx.status);
        match tx.status {
            TxStatus::Confirmed => {
                print_view(client);
                return Ok(());
            }
            TxStatus::Failed => {
                bail!("{:?} failed: {}", kind, tx.error.unwrap_or_default());
            }
            _ => updates.changed().await?,
        }
    }
}
