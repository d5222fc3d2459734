//! In-memory wallet and contract for exercising the client without a node.
//!
//! [`FakeWallet`] implements [`WalletProvider`] over a [`FakeContract`] that
//! follows the KnotNFT rules: minting costs exactly the sale price, is limited
//! to the owner and whitelisted accounts, and stops at the maximum count.
//! Transactions stay pending until [`FakeWallet::confirm`] is called, unless
//! auto-mining is on.

use alloy_primitives::{Address, B256, Bytes, TxHash, U256};
use alloy_sol_types::{SolInterface, SolValue};
use async_trait::async_trait;
use knot_provider::{
    CallRequest, Connection, ProviderError, ProviderEvent, TransactionRequest, TxReceipt,
    WalletProvider, event_channel,
};
use knot_types::{Connector, NetworkId};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::{broadcast, watch};

use crate::contract::KnotNft::KnotNftCalls;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeContract {
    pub owner: Address,
    pub total_supply: u64,
    pub max_mint_count: u64,
    pub sell_price: U256,
    pub whitelist: HashSet<Address>,
    pub balances: HashMap<Address, u64>,
}

impl FakeContract {
    pub fn new(owner: Address, max_mint_count: u64, sell_price: U256) -> Self {
        Self {
            owner,
            total_supply: 0,
            max_mint_count,
            sell_price,
            whitelist: HashSet::new(),
            balances: HashMap::new(),
        }
    }

    pub fn mintable_count(&self) -> u64 {
        self.max_mint_count.saturating_sub(self.total_supply)
    }

    fn read(&self, call: KnotNftCalls) -> Result<Vec<u8>, ProviderError> {
        Ok(match call {
            KnotNftCalls::totalSupply(_) => U256::from(self.total_supply).abi_encode(),
            KnotNftCalls::balanceOf(call) => {
                U256::from(self.balances.get(&call.owner).copied().unwrap_or_default()).abi_encode()
            }
            KnotNftCalls::mintableCount(_) => U256::from(self.mintable_count()).abi_encode(),
            KnotNftCalls::maxMintCount(_) => U256::from(self.max_mint_count).abi_encode(),
            KnotNftCalls::sellPrice(_) => self.sell_price.abi_encode(),
            KnotNftCalls::owner(_) => self.owner.abi_encode(),
            KnotNftCalls::isInWhitelist(call) => self.whitelist.contains(&call.account).abi_encode(),
            KnotNftCalls::mint(_) | KnotNftCalls::addToWhitelist(_) => {
                return Err(ProviderError::Reverted("not a view function".to_owned()));
            }
        })
    }

    /// Pre-flight checks, as a node runs them while estimating gas.
    fn check(&self, request: &TransactionRequest, call: &KnotNftCalls) -> Result<(), ProviderError> {
        let reject = |reason: &str| Err(ProviderError::Reverted(reason.to_owned()));
        match call {
            KnotNftCalls::mint(_) => {
                if request.value != self.sell_price {
                    return reject("Wrong price");
                }
                if request.from != self.owner && !self.whitelist.contains(&request.from) {
                    return reject("Not whitelisted");
                }
                if self.total_supply >= self.max_mint_count {
                    return reject("Sold out");
                }
                Ok(())
            }
            KnotNftCalls::addToWhitelist(_) => {
                if request.from != self.owner {
                    return reject("Ownable: caller is not the owner");
                }
                Ok(())
            }
            _ => reject("not a state-changing function"),
        }
    }

    fn execute(&mut self, from: Address, call: &KnotNftCalls) {
        match call {
            KnotNftCalls::mint(_) => {
                self.total_supply += 1;
                *self.balances.entry(from).or_default() += 1;
            }
            KnotNftCalls::addToWhitelist(call) => {
                self.whitelist.insert(call.account);
            }
            _ => {}
        }
    }
}

/// Provider interaction recorded by [`FakeWallet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Connect(String),
    Authorized,
    Disconnect,
    SwitchNetwork(NetworkId),
    Call(CallRequest),
    SendTransaction(TransactionRequest),
}

struct QueuedTx {
    from: Address,
    call: KnotNftCalls,
}

pub struct FakeWallet {
    contract_address: Address,
    contract: RefCell<FakeContract>,
    connectors: RefCell<Vec<Connector>>,
    account: Cell<Address>,
    network: Cell<NetworkId>,
    known_networks: RefCell<Vec<NetworkId>>,
    authorized: RefCell<Option<String>>,
    calls: RefCell<Vec<ProviderCall>>,
    reject_connect: Cell<bool>,
    reject_switch: Cell<bool>,
    reject_transactions: Cell<bool>,
    fail_calls: Cell<bool>,
    auto_mine: Cell<bool>,
    block: Cell<u64>,
    nonce: Cell<u64>,
    queued: RefCell<BTreeMap<TxHash, QueuedTx>>,
    receipts: watch::Sender<HashMap<TxHash, TxReceipt>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl FakeWallet {
    /// Wallet holding `account` on the local network, with a ready `metaMask`
    /// connector and an unsupported `walletConnect` one.
    pub fn new(contract_address: Address, account: Address, contract: FakeContract) -> Self {
        Self {
            contract_address,
            contract: RefCell::new(contract),
            connectors: RefCell::new(vec![
                Connector {
                    id: "metaMask".to_owned(),
                    name: "MetaMask".to_owned(),
                    ready: true,
                },
                Connector {
                    id: "walletConnect".to_owned(),
                    name: "WalletConnect".to_owned(),
                    ready: false,
                },
            ]),
            account: Cell::new(account),
            network: Cell::new(NetworkId::LOCALHOST),
            known_networks: RefCell::new(vec![NetworkId::LOCALHOST]),
            authorized: RefCell::new(None),
            calls: RefCell::new(Vec::new()),
            reject_connect: Cell::new(false),
            reject_switch: Cell::new(false),
            reject_transactions: Cell::new(false),
            fail_calls: Cell::new(false),
            auto_mine: Cell::new(false),
            block: Cell::new(1),
            nonce: Cell::new(0),
            queued: RefCell::new(BTreeMap::new()),
            receipts: watch::channel(HashMap::new()).0,
            events: event_channel(),
        }
    }

    pub fn contract(&self) -> std::cell::RefMut<'_, FakeContract> {
        self.contract.borrow_mut()
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                ProviderCall::SendTransaction(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn network(&self) -> NetworkId {
        self.network.get()
    }

    pub fn block_height(&self) -> u64 {
        self.block.get()
    }

    /// Pre-authorize the page, as a wallet that remembers an earlier approval.
    pub fn authorize(&self, connector: &str) {
        *self.authorized.borrow_mut() = Some(connector.to_owned());
    }

    pub fn add_network(&self, network: NetworkId) {
        self.known_networks.borrow_mut().push(network);
    }

    pub fn set_reject_connect(&self, reject: bool) {
        self.reject_connect.set(reject);
    }

    pub fn set_reject_switch(&self, reject: bool) {
        self.reject_switch.set(reject);
    }

    pub fn set_reject_transactions(&self, reject: bool) {
        self.reject_transactions.set(reject);
    }

    pub fn set_fail_calls(&self, fail: bool) {
        self.fail_calls.set(fail);
    }

    pub fn set_auto_mine(&self, auto_mine: bool) {
        self.auto_mine.set(auto_mine);
    }

    /// The user switched accounts inside the wallet.
    pub fn switch_account(&self, account: Address) {
        self.account.set(account);
        if self.authorized.borrow().is_some() {
            self.emit(ProviderEvent::AccountsChanged(Some(account)));
        }
    }

    /// The user moved the wallet to another network.
    pub fn move_to_network(&self, network: NetworkId) {
        self.network.set(network);
        self.emit(ProviderEvent::ChainChanged(network));
    }

    /// The user revoked the page's access.
    pub fn revoke(&self) {
        *self.authorized.borrow_mut() = None;
        self.emit(ProviderEvent::AccountsChanged(None));
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn mine_block(&self) -> u64 {
        let height = self.block.get() + 1;
        self.block.set(height);
        self.emit(ProviderEvent::NewBlock(height));
        height
    }

    /// Mine a queued transaction, applying its effects when `success`.
    pub fn confirm(&self, tx_hash: TxHash, success: bool) -> bool {
        let Some(queued) = self.queued.borrow_mut().remove(&tx_hash) else {
            return false;
        };
        if success {
            self.contract.borrow_mut().execute(queued.from, &queued.call);
        }
        let block_number = self.mine_block();
        self.receipts.send_modify(|receipts| {
            receipts.insert(
                tx_hash,
                TxReceipt {
                    tx_hash,
                    block_number,
                    success,
                },
            );
        });
        true
    }

    pub fn queued_transactions(&self) -> Vec<TxHash> {
        self.queued.borrow().keys().copied().collect()
    }

    fn record(&self, call: ProviderCall) {
        self.calls.borrow_mut().push(call);
    }

    fn connection(&self, connector: String) -> Connection {
        Connection {
            connector,
            account: self.account.get(),
            network: self.network.get(),
        }
    }
}

#[async_trait(?Send)]
impl WalletProvider for FakeWallet {
    fn connectors(&self) -> Vec<Connector> {
        self.connectors.borrow().clone()
    }

    async fn connect(&self, connector_id: &str) -> Result<Connection, ProviderError> {
        self.record(ProviderCall::Connect(connector_id.to_owned()));
        let ready = self
            .connectors
            .borrow()
            .iter()
            .any(|connector| connector.id == connector_id && connector.ready);
        if !ready {
            return Err(ProviderError::ConnectorUnavailable(connector_id.to_owned()));
        }
        if self.reject_connect.get() {
            return Err(ProviderError::UserRejected);
        }
        self.authorize(connector_id);
        Ok(self.connection(connector_id.to_owned()))
    }

    async fn authorized(&self) -> Result<Option<Connection>, ProviderError> {
        self.record(ProviderCall::Authorized);
        let connector = self.authorized.borrow().clone();
        Ok(connector.map(|connector| self.connection(connector)))
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        self.record(ProviderCall::Disconnect);
        *self.authorized.borrow_mut() = None;
        Ok(())
    }

    async fn switch_network(&self, network: NetworkId) -> Result<(), ProviderError> {
        self.record(ProviderCall::SwitchNetwork(network));
        if self.reject_switch.get() {
            return Err(ProviderError::UserRejected);
        }
        if !self.known_networks.borrow().contains(&network) {
            return Err(ProviderError::UnrecognizedNetwork(Some(network.0)));
        }
        if self.network.get() != network {
            self.move_to_network(network);
        }
        Ok(())
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        Ok(self.block.get())
    }

    async fn call(&self, request: CallRequest) -> Result<Bytes, ProviderError> {
        self.record(ProviderCall::Call(request.clone()));
        if self.fail_calls.get() {
            return Err(ProviderError::Unreachable("fake node is down".to_owned()));
        }
        if request.to != self.contract_address {
            return Ok(Bytes::new());
        }
        let call = KnotNftCalls::abi_decode(&request.data, true)
            .map_err(|err| ProviderError::Decode(err.to_string()))?;
        Ok(Bytes::from(self.contract.borrow().read(call)?))
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, ProviderError> {
        self.record(ProviderCall::SendTransaction(request.clone()));
        if self.reject_transactions.get() {
            return Err(ProviderError::UserRejected);
        }
        if self.authorized.borrow().is_none() || request.from != self.account.get() {
            return Err(ProviderError::Rpc {
                code: 4100,
                message: "account not authorized".to_owned(),
            });
        }
        let call = KnotNftCalls::abi_decode(&request.data, true)
            .map_err(|err| ProviderError::Decode(err.to_string()))?;
        self.contract.borrow().check(&request, &call)?;

        let nonce = self.nonce.get() + 1;
        self.nonce.set(nonce);
        let tx_hash = B256::from(U256::from(nonce).to_be_bytes::<32>());
        self.queued.borrow_mut().insert(
            tx_hash,
            QueuedTx {
                from: request.from,
                call,
            },
        );

        if self.auto_mine.get() {
            self.confirm(tx_hash, true);
        }
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, ProviderError> {
        let mut receipts = self.receipts.subscribe();
        let receipts = receipts
            .wait_for(|receipts| receipts.contains_key(&tx_hash))
            .await
            .map_err(|_| ProviderError::Unreachable("fake wallet dropped".to_owned()))?;
        receipts
            .get(&tx_hash)
            .copied()
            .ok_or_else(|| ProviderError::Decode(format!("missing receipt for {tx_hash}")))
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
