use alloy_primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;
use knot_provider::rpc::{RpcRequest, RpcResponse, parse_accounts, parse_quantity, parse_receipt};
use knot_provider::{
    CallRequest, Connection, ProviderError, ProviderEvent, TransactionRequest, TxReceipt,
    WalletProvider, event_channel,
};
use knot_types::{Connector, NetworkId};
use serde_json::{Value, json};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub const NODE_CONNECTOR: &str = "node";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8545";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Provider backed by a development node that signs with its own unlocked
/// accounts (`eth_accounts` / `eth_sendTransaction`).
///
/// Reads `ENDPOINT_URL` from environment at construction time
/// (default: `http://localhost:8545`).
pub struct JsonRpcProvider {
    endpoint: String,
    http: reqwest::Client,
    next_id: Cell<u64>,
    account: Cell<Option<Address>>,
    events: broadcast::Sender<ProviderEvent>,
    poll_interval: Duration,
}

impl Default for JsonRpcProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl JsonRpcProvider {
    pub fn new(endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var("ENDPOINT_URL").ok())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            next_id: Cell::new(1),
            account: Cell::new(None),
            events: event_channel(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Interval for block-height and receipt polling.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Publish `NewBlock` whenever the node's height changes. The task ends
    /// once the provider is dropped. Must be called inside a `LocalSet`.
    pub fn spawn_block_watcher(self: &Rc<Self>) -> tokio::task::JoinHandle<()> {
        let provider = Rc::downgrade(self);
        tokio::task::spawn_local(async move {
            let mut last_seen = None;
            loop {
                let Some(provider) = provider.upgrade() else {
                    break;
                };
                match provider.block_number().await {
                    Ok(height) if last_seen != Some(height) => {
                        last_seen = Some(height);
                        let _ = provider.events.send(ProviderEvent::NewBlock(height));
                    }
                    Ok(_) => {}
                    Err(err) => debug!("block poll against {} failed: {}", provider.endpoint, err),
                }
                let interval = provider.poll_interval;
                drop(provider);
                tokio::time::sleep(interval).await;
            }
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let response = self
            .http
            .post(&self.endpoint)
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .map_err(|err| ProviderError::Unreachable(format!("{method} transport: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unreachable(format!("{method} HTTP {status}: {text}")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Decode(format!("{method} parse: {err}")))?;
        body.into_result()
    }

    async fn chain_id(&self) -> Result<NetworkId, ProviderError> {
        let value = self.request("eth_chainId", json!([])).await?;
        Ok(NetworkId(parse_quantity(&value)?))
    }
}

#[async_trait(?Send)]
impl WalletProvider for JsonRpcProvider {
    fn connectors(&self) -> Vec<Connector> {
        vec![Connector {
            id: NODE_CONNECTOR.to_owned(),
            name: "Development node".to_owned(),
            ready: true,
        }]
    }

    async fn connect(&self, connector_id: &str) -> Result<Connection, ProviderError> {
        if connector_id != NODE_CONNECTOR {
            return Err(ProviderError::ConnectorUnavailable(connector_id.to_owned()));
        }

        let accounts = match self.request("eth_accounts", json!([])).await {
            Ok(value) => parse_accounts(value)?,
            Err(ProviderError::Unreachable(reason)) => {
                return Err(ProviderError::ConnectorUnavailable(format!(
                    "{connector_id} ({reason})"
                )));
            }
            Err(err) => return Err(err),
        };
        let Some(account) = accounts.first().copied() else {
            return Err(ProviderError::ConnectorUnavailable(format!(
                "{connector_id} (node exposes no accounts)"
            )));
        };

        let network = self.chain_id().await?;
        self.account.set(Some(account));
        info!("connected node account {} on network {}", account, network);

        Ok(Connection {
            connector: NODE_CONNECTOR.to_owned(),
            account,
            network,
        })
    }

    async fn authorized(&self) -> Result<Option<Connection>, ProviderError> {
        let Some(account) = self.account.get() else {
            return Ok(None);
        };
        let network = self.chain_id().await?;
        Ok(Some(Connection {
            connector: NODE_CONNECTOR.to_owned(),
            account,
            network,
        }))
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        self.account.set(None);
        Ok(())
    }

    async fn switch_network(&self, network: NetworkId) -> Result<(), ProviderError> {
        // A node serves exactly one chain.
        if self.chain_id().await? == network {
            Ok(())
        } else {
            Err(ProviderError::UnrecognizedNetwork(Some(network.0)))
        }
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        let value = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&value)
    }

    async fn call(&self, request: CallRequest) -> Result<Bytes, ProviderError> {
        let value = self.request("eth_call", json!([request, "latest"])).await?;
        serde_json::from_value(value).map_err(|err| ProviderError::Decode(format!("eth_call: {err}")))
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, ProviderError> {
        let value = self.request("eth_sendTransaction", json!([request])).await?;
        serde_json::from_value(value)
            .map_err(|err| ProviderError::Decode(format!("eth_sendTransaction: {err}")))
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, ProviderError> {
        loop {
            let value = self
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if let Some(receipt) = parse_receipt(value)? {
                return Ok(receipt);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
