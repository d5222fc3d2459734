//! Wallet-provider boundary.
//!
//! The interaction layer reaches the chain only through [`WalletProvider`]:
//! connector discovery, account authorization, network switching, read calls,
//! transaction submission and receipt tracking. Implementations live in
//! `knot-provider-jsonrpc` (development node) and the browser front-end
//! (`window.ethereum`).

pub mod rpc;

use alloy_primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use knot_types::{Connector, NetworkId};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

pub use rpc::RpcErrorObject;

/// Capacity of a provider's event channel. Slow subscribers observe
/// `RecvError::Lagged` and resume from the newest events.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("connector `{0}` is not available")]
    ConnectorUnavailable(String),
    #[error("request rejected by the user")]
    UserRejected,
    /// Carries the requested chain id when the wallet reported it.
    #[error("network {} is not configured in the wallet", network_label(.0))]
    UnrecognizedNetwork(Option<u64>),
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("insufficient funds for transaction")]
    InsufficientFunds,
    #[error("provider unreachable: {0}")]
    Unreachable(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed provider response: {0}")]
    Decode(String),
}

fn network_label(network: &Option<u64>) -> String {
    network.map_or_else(|| "(unknown)".to_owned(), |id| id.to_string())
}

/// Authorized account and the network the wallet is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Id of the connector that holds the authorization.
    pub connector: String,
    pub account: Address,
    pub network: NetworkId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRequest {
    pub to: Address,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
}

/// Wallet-side and chain-side notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// `None` when the wallet no longer exposes any account.
    AccountsChanged(Option<Address>),
    ChainChanged(NetworkId),
    Disconnected,
    NewBlock(u64),
}

#[async_trait(?Send)]
pub trait WalletProvider {
    fn connectors(&self) -> Vec<Connector>;

    /// Prompt the wallet behind `connector_id` for account access.
    async fn connect(&self, connector_id: &str) -> Result<Connection, ProviderError>;

    /// Account already authorized for this page, without prompting.
    async fn authorized(&self) -> Result<Option<Connection>, ProviderError>;

    async fn disconnect(&self) -> Result<(), ProviderError>;

    async fn switch_network(&self, network: NetworkId) -> Result<(), ProviderError>;

    async fn block_number(&self) -> Result<u64, ProviderError>;

    async fn call(&self, request: CallRequest) -> Result<Bytes, ProviderError>;

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, ProviderError>;

    /// Resolves once the transaction is mined. Has no timeout.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, ProviderError>;

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

pub fn event_channel() -> broadcast::Sender<ProviderEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}
