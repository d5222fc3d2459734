//! `window.ethereum` (EIP-1193) as a [`WalletProvider`].
//!
//! Requests go through the injected provider's `request()`; wallet events are
//! forwarded from its `on()` listeners. Block height and receipts are polled
//! with `gloo-timers`, since injected providers offer no subscription for them.

use alloy_primitives::{Bytes, TxHash};
use async_trait::async_trait;
use gloo_timers::future::TimeoutFuture;
use knot_provider::rpc::{RpcErrorObject, parse_accounts, parse_quantity, parse_receipt};
use knot_provider::{
    CallRequest, Connection, ProviderError, ProviderEvent, TransactionRequest, TxReceipt,
    WalletProvider, event_channel,
};
use knot_types::{Connector, NetworkId};
use serde::Serialize;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::broadcast;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

pub const METAMASK: &str = "metaMask";
pub const INJECTED: &str = "injected";

const DEFAULT_POLL_MS: u32 = 4_000;

#[wasm_bindgen]
extern "C" {
    pub type Ethereum;

    #[wasm_bindgen(catch, method)]
    async fn request(this: &Ethereum, args: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method)]
    fn on(this: &Ethereum, event: &str, listener: &js_sys::Function);

    #[wasm_bindgen(method, getter, js_name = isMetaMask)]
    fn is_meta_mask(this: &Ethereum) -> Option<bool>;
}

pub struct Eip1193Provider {
    ethereum: Option<Ethereum>,
    events: broadcast::Sender<ProviderEvent>,
    connector: RefCell<Option<String>>,
    poll_ms: u32,
    listeners: RefCell<Vec<Closure<dyn FnMut(JsValue)>>>,
}

impl Eip1193Provider {
    /// Bind to `window.ethereum`, if a wallet extension injected one.
    pub fn detect() -> Self {
        let ethereum = web_sys::window()
            .and_then(|window| js_sys::Reflect::get(&window, &JsValue::from_str("ethereum")).ok())
            .filter(|value| !value.is_undefined() && !value.is_null())
            .map(|value| value.unchecked_into::<Ethereum>());
        if ethereum.is_none() {
            gloo_console::warn!("no injected wallet found (window.ethereum is missing)");
        }
        Self {
            ethereum,
            events: event_channel(),
            connector: RefCell::new(None),
            poll_ms: DEFAULT_POLL_MS,
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Forward `accountsChanged`, `chainChanged` and `disconnect`.
    pub fn listen(&self) {
        let Some(ethereum) = &self.ethereum else {
            return;
        };

        let events = self.events.clone();
        self.add_listener(ethereum, "accountsChanged", move |accounts| {
            let first = serde_wasm_bindgen::from_value::<Value>(accounts)
                .ok()
                .and_then(|value| parse_accounts(value).ok())
                .and_then(|accounts| accounts.first().copied());
            let _ = events.send(ProviderEvent::AccountsChanged(first));
        });

        let events = self.events.clone();
        self.add_listener(ethereum, "chainChanged", move |chain_id| {
            let parsed = serde_wasm_bindgen::from_value::<Value>(chain_id)
                .ok()
                .and_then(|value| parse_quantity(&value).ok());
            if let Some(id) = parsed {
                let _ = events.send(ProviderEvent::ChainChanged(NetworkId(id)));
            }
        });

        let events = self.events.clone();
        self.add_listener(ethereum, "disconnect", move |_| {
            let _ = events.send(ProviderEvent::Disconnected);
        });
    }

    /// Poll `eth_blockNumber` and publish `NewBlock` on every change.
    pub fn spawn_block_watcher(self: &Rc<Self>) {
        let provider = Rc::downgrade(self);
        wasm_bindgen_futures::spawn_local(async move {
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
                    Err(err) => gloo_console::debug!(format!("block poll failed: {err}")),
                }
                let poll_ms = provider.poll_ms;
                drop(provider);
                TimeoutFuture::new(poll_ms).await;
            }
        });
    }

    fn add_listener(&self, ethereum: &Ethereum, event: &str, handler: impl FnMut(JsValue) + 'static) {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(JsValue)>);
        ethereum.on(event, closure.as_ref().unchecked_ref());
        self.listeners.borrow_mut().push(closure);
    }

    fn ethereum(&self, connector_id: &str) -> Result<&Ethereum, ProviderError> {
        self.ethereum
            .as_ref()
            .ok_or_else(|| ProviderError::ConnectorUnavailable(connector_id.to_owned()))
    }

    fn default_connector(&self) -> &'static str {
        match &self.ethereum {
            Some(ethereum) if ethereum.is_meta_mask().unwrap_or(false) => METAMASK,
            _ => INJECTED,
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let ethereum = self.ethereum(INJECTED)?;
        let args = json!({ "method": method, "params": params })
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|err| ProviderError::Decode(format!("{method} args: {err}")))?;

        match ethereum.request(args).await {
            Ok(value) => serde_wasm_bindgen::from_value(value)
                .map_err(|err| ProviderError::Decode(format!("{method} result: {err}"))),
            Err(err) => Err(classify(err)),
        }
    }

    async fn chain_id(&self) -> Result<NetworkId, ProviderError> {
        let value = self.rpc("eth_chainId", json!([])).await?;
        Ok(NetworkId(parse_quantity(&value)?))
    }

    async fn connection(&self, method: &str, connector: String) -> Result<Option<Connection>, ProviderError> {
        let accounts = parse_accounts(self.rpc(method, json!([])).await?)?;
        let Some(account) = accounts.first().copied() else {
            return Ok(None);
        };
        let network = self.chain_id().await?;
        Ok(Some(Connection {
            connector,
            account,
            network,
        }))
    }
}

/// Wallets reject with `{ code, message }` objects; anything else means the
/// extension itself failed.
fn classify(err: JsValue) -> ProviderError {
    match serde_wasm_bindgen::from_value::<RpcErrorObject>(err.clone()) {
        Ok(object) => object.into(),
        Err(_) => ProviderError::Unreachable(
            err.as_string()
                .unwrap_or_else(|| "wallet request failed".to_owned()),
        ),
    }
}

#[async_trait(?Send)]
impl WalletProvider for Eip1193Provider {
    fn connectors(&self) -> Vec<Connector> {
        let injected = self.ethereum.is_some();
        let meta_mask = self
            .ethereum
            .as_ref()
            .is_some_and(|ethereum| ethereum.is_meta_mask().unwrap_or(false));
        vec![
            Connector {
                id: METAMASK.to_owned(),
                name: "MetaMask".to_owned(),
                ready: meta_mask,
            },
            Connector {
                id: INJECTED.to_owned(),
                name: "Browser wallet".to_owned(),
                ready: injected,
            },
        ]
    }

    async fn connect(&self, connector_id: &str) -> Result<Connection, ProviderError> {
        self.ethereum(connector_id)?;
        let connection = self
            .connection("eth_requestAccounts", connector_id.to_owned())
            .await?
            .ok_or_else(|| ProviderError::ConnectorUnavailable(connector_id.to_owned()))?;
        *self.connector.borrow_mut() = Some(connector_id.to_owned());
        Ok(connection)
    }

    async fn authorized(&self) -> Result<Option<Connection>, ProviderError> {
        if self.ethereum.is_none() {
            return Ok(None);
        }
        let connector = self
            .connector
            .borrow()
            .clone()
            .unwrap_or_else(|| self.default_connector().to_owned());
        self.connection("eth_accounts", connector).await
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        self.connector.borrow_mut().take();
        // Not every wallet implements revocation; the session ends either way.
        let _ = self
            .rpc("wallet_revokePermissions", json!([{ "eth_accounts": {} }]))
            .await;
        Ok(())
    }

    async fn switch_network(&self, network: NetworkId) -> Result<(), ProviderError> {
        match self
            .rpc("wallet_switchEthereumChain", json!([{ "chainId": network.to_hex() }]))
            .await
        {
            Ok(_) => Ok(()),
            Err(ProviderError::UnrecognizedNetwork(reported)) => {
                Err(ProviderError::UnrecognizedNetwork(reported.or(Some(network.0))))
            }
            Err(err) => Err(err),
        }
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        let value = self.rpc("eth_blockNumber", json!([])).await?;
        parse_quantity(&value)
    }

    async fn call(&self, request: CallRequest) -> Result<Bytes, ProviderError> {
        let value = self.rpc("eth_call", json!([request, "latest"])).await?;
        serde_json::from_value(value).map_err(|err| ProviderError::Decode(format!("eth_call: {err}")))
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, ProviderError> {
        let value = self.rpc("eth_sendTransaction", json!([request])).await?;
        serde_json::from_value(value)
            .map_err(|err| ProviderError::Decode(format!("eth_sendTransaction: {err}")))
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, ProviderError> {
        loop {
            let value = self
                .rpc("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if let Some(receipt) = parse_receipt(value)? {
                return Ok(receipt);
            }
            TimeoutFuture::new(self.poll_ms).await;
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
