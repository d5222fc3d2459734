//! State-changing contract calls.
//!
//! Each transaction kind owns one [`PendingTransaction`] slot. Dispatch
//! returns immediately; submission and confirmation run on a background task
//! and are observed through the slot's `watch` channel. Kinds are independent,
//! so a mint and a whitelist addition may be pending together.

use alloy_primitives::Address;
use knot_provider::{TransactionRequest, WalletProvider};
use knot_types::{PendingTransaction, TxKind, TxStatus};
use std::cell::Cell;
use std::rc::Rc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::contract::{Contract, parse_address};
use crate::read_model::ReadModel;
use crate::session::SessionState;
use crate::{ClientError, spawn};

struct Slot {
    state: watch::Sender<PendingTransaction>,
    generation: Cell<u64>,
}

impl Slot {
    fn new(kind: TxKind) -> Self {
        Self {
            state: watch::channel(PendingTransaction::idle(kind)).0,
            generation: Cell::new(0),
        }
    }
}

pub struct WriteDispatcher {
    provider: Rc<dyn WalletProvider>,
    contract: Contract,
    session: watch::Receiver<SessionState>,
    read_model: Rc<ReadModel>,
    mint: Slot,
    whitelist: Slot,
}

impl WriteDispatcher {
    pub fn new(
        provider: Rc<dyn WalletProvider>,
        contract: Contract,
        session: watch::Receiver<SessionState>,
        read_model: Rc<ReadModel>,
    ) -> Self {
        Self {
            provider,
            contract,
            session,
            read_model,
            mint: Slot::new(TxKind::Mint),
            whitelist: Slot::new(TxKind::AddToWhitelist),
        }
    }

    pub fn status(&self, kind: TxKind) -> PendingTransaction {
        self.slot(kind).state.borrow().clone()
    }

    pub fn subscribe(&self, kind: TxKind) -> watch::Receiver<PendingTransaction> {
        self.slot(kind).state.subscribe()
    }

    /// Mint one token, paying the sale price held by the read-model right now.
    pub fn mint(self: &Rc<Self>) -> Result<(), ClientError> {
        let prepared = self.sender().and_then(|from| {
            let price = self
                .read_model
                .snapshot()
                .sell_price
                .ok_or(ClientError::PriceNotLoaded)?;
            Ok(self.contract.mint_request(from, price))
        });
        self.submit(TxKind::Mint, prepared)
    }

    /// Whitelist `candidate`. The address is validated before anything is
    /// sent to the wallet.
    pub fn add_to_whitelist(self: &Rc<Self>, candidate: &str) -> Result<(), ClientError> {
        let prepared = parse_address(candidate).and_then(|account| {
            let from = self.sender()?;
            Ok(self.contract.add_to_whitelist_request(from, account))
        });
        self.submit(TxKind::AddToWhitelist, prepared)
    }

    /// Reset a confirmed or failed transaction back to idle.
    pub fn acknowledge(&self, kind: TxKind) {
        self.slot(kind).state.send_if_modified(|tx| {
            if !tx.status.is_terminal() {
                return false;
            }
            *tx = PendingTransaction::idle(kind);
            true
        });
    }

    fn sender(&self) -> Result<Address, ClientError> {
        self.session
            .borrow()
            .session
            .account()
            .ok_or(ClientError::NotConnected)
    }

    fn slot(&self, kind: TxKind) -> &Slot {
        match kind {
            TxKind::Mint => &self.mint,
            TxKind::AddToWhitelist => &self.whitelist,
        }
    }

    /// Start `prepared` on the kind's slot. A write refused before
    /// submission is recorded as `Failed`, unless a write of the same kind
    /// is in flight: that one keeps the slot and the error is only returned.
    fn submit(
        self: &Rc<Self>,
        kind: TxKind,
        prepared: Result<TransactionRequest, ClientError>,
    ) -> Result<(), ClientError> {
        let slot = self.slot(kind);
        let request = match prepared {
            Ok(request) => request,
            Err(err) => {
                warn!("{:?} not submitted: {}", kind, err);
                if !slot.state.borrow().status.is_in_flight() {
                    slot.generation.set(slot.generation.get() + 1);
                    slot.state.send_replace(PendingTransaction {
                        status: TxStatus::Failed,
                        error: Some(err.to_string()),
                        ..PendingTransaction::idle(kind)
                    });
                }
                return Err(err);
            }
        };

        let generation = slot.generation.get() + 1;
        slot.generation.set(generation);
        slot.state.send_replace(PendingTransaction {
            status: TxStatus::Submitting,
            ..PendingTransaction::idle(kind)
        });
        spawn::spawn_local(Rc::clone(self).drive(kind, generation, request));
        Ok(())
    }

    async fn drive(self: Rc<Self>, kind: TxKind, generation: u64, request: TransactionRequest) {
        let tx_hash = match self.provider.send_transaction(request).await {
            Ok(tx_hash) => tx_hash,
            Err(err) => {
                self.fail(kind, generation, ClientError::from_write(err));
                return;
            }
        };
        info!("{:?} submitted as {}", kind, tx_hash);
        self.update(kind, generation, |tx| {
            tx.status = TxStatus::Pending;
            tx.tx_hash = Some(tx_hash);
        });

        match self.provider.wait_for_receipt(tx_hash).await {
            Ok(receipt) if receipt.success => {
                info!("{:?} {} confirmed in block {}", kind, tx_hash, receipt.block_number);
                self.update(kind, generation, |tx| tx.status = TxStatus::Confirmed);
            }
            Ok(receipt) => self.fail(
                kind,
                generation,
                ClientError::TransactionReverted(format!(
                    "{} failed in block {}",
                    tx_hash, receipt.block_number
                )),
            ),
            Err(err) => self.fail(kind, generation, ClientError::from_write(err)),
        }
    }

    fn fail(&self, kind: TxKind, generation: u64, err: ClientError) {
        warn!("{:?} failed: {}", kind, err);
        self.update(kind, generation, |tx| {
            tx.status = TxStatus::Failed;
            tx.error = Some(err.to_string());
        });
    }

    /// Apply `change` unless a newer write of the same kind has started.
    fn update(&self, kind: TxKind, generation: u64, change: impl FnOnce(&mut PendingTransaction)) {
        let slot = self.slot(kind);
        if slot.generation.get() != generation {
            debug!("dropping update for superseded {:?} write", kind);
            return;
        }
        slot.state.send_modify(change);
    }
}
