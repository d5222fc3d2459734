//! Live read-model of the contract state.
//!
//! Every fact is refreshed by its own call; a snapshot may therefore mix
//! values read at different block heights. Failed reads keep the previous
//! value.

use alloy_primitives::Address;
use futures::future::{self, LocalBoxFuture};
use futures::{FutureExt, future::join_all};
use knot_provider::WalletProvider;
use knot_types::{Fact, Snapshot};
use std::rc::Rc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::contract::{self, Contract};
use crate::session::SessionState;

pub struct ReadModel {
    provider: Rc<dyn WalletProvider>,
    contract: Contract,
    snapshot: watch::Sender<Snapshot>,
}

impl ReadModel {
    pub fn new(provider: Rc<dyn WalletProvider>, contract: Contract) -> Self {
        Self {
            provider,
            contract,
            snapshot: watch::channel(Snapshot::default()).0,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    /// Account the account-scoped facts are currently evaluated for.
    pub fn account(&self) -> Option<Address> {
        self.snapshot.borrow().account
    }

    /// Re-query one fact. Returns whether the snapshot changed.
    pub async fn refresh(&self, fact: Fact) -> bool {
        let account = self.account();
        let Some(request) = self.contract.read_request(fact, account) else {
            return self.snapshot.send_if_modified(|snapshot| {
                let loaded = snapshot.is_loaded(fact);
                snapshot.clear(fact);
                loaded
            });
        };

        let data = match self.provider.call(request).await {
            Ok(data) => data,
            Err(err) => {
                debug!("read of {:?} failed, keeping previous value: {}", fact, err);
                return false;
            }
        };
        let value = match contract::decode(fact, &data) {
            Ok(value) => value,
            Err(err) => {
                debug!("could not decode {:?}: {}", fact, err);
                return false;
            }
        };

        self.snapshot.send_if_modified(|snapshot| {
            if fact.is_account_scoped() && snapshot.account != account {
                debug!("dropping {:?} read for previous account", fact);
                return false;
            }
            let mut next = snapshot.clone();
            if !next.apply(fact, value) || next == *snapshot {
                return false;
            }
            *snapshot = next;
            true
        })
    }

    pub async fn refresh_many(&self, facts: impl IntoIterator<Item = Fact>) {
        join_all(facts.into_iter().map(|fact| self.refresh(fact))).await;
    }

    /// Query every fact once.
    pub async fn load(&self) {
        self.refresh_many(Fact::ALL).await;
    }

    /// Re-run the watched facts, plus any fact that has not loaded yet.
    pub async fn on_new_block(&self, height: u64) {
        let snapshot = self.snapshot();
        let facts: Vec<Fact> = Fact::ALL
            .into_iter()
            .filter(|fact| fact.is_watched() || !snapshot.is_loaded(*fact))
            .collect();
        debug!("block {}: refreshing {} facts", height, facts.len());
        self.refresh_many(facts).await;
    }

    /// Re-scope the account-dependent facts. Values read for the previous
    /// account are cleared before the new ones are queried.
    pub async fn set_account(&self, account: Option<Address>) {
        if self.rescope(account) && account.is_some() {
            self.refresh_scoped().await;
        }
    }

    /// Switch the scope and drop the previous account's values in one
    /// update. Returns whether the account changed.
    fn rescope(&self, account: Option<Address>) -> bool {
        if self.account() == account {
            return false;
        }
        self.snapshot.send_modify(|snapshot| {
            snapshot.account = account;
            for fact in Fact::ALL.into_iter().filter(|fact| fact.is_account_scoped()) {
                snapshot.clear(fact);
            }
        });
        if let Some(account) = account {
            info!("read-model now scoped to {}", account);
        }
        true
    }

    async fn refresh_scoped(&self) {
        self.refresh_many(Fact::ALL.into_iter().filter(|fact| fact.is_account_scoped()))
            .await;
    }

    /// Keep the snapshot in sync with new blocks and session account changes.
    ///
    /// Account changes are applied before any in-flight refresh makes
    /// progress, and restart the account-scoped reads. Block refreshes run
    /// one at a time; heights that arrive meanwhile coalesce to the latest.
    pub async fn run(
        self: Rc<Self>,
        mut heads: watch::Receiver<u64>,
        mut session: watch::Receiver<SessionState>,
    ) {
        self.rescope(session.borrow_and_update().session.account());
        heads.borrow_and_update();

        let mut blocks: Option<LocalBoxFuture<'_, ()>> = Some(self.load().boxed_local());
        let mut scoped: Option<LocalBoxFuture<'_, ()>> = None;

        loop {
            tokio::select! {
                biased;
                changed = session.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let account = session.borrow_and_update().session.account();
                    if self.rescope(account) {
                        scoped = account.map(|_| self.refresh_scoped().boxed_local());
                    }
                }
                () = finish(&mut scoped) => {}
                () = finish(&mut blocks) => {}
                changed = heads.changed(), if blocks.is_none() => {
                    if changed.is_err() {
                        break;
                    }
                    let height = *heads.borrow_and_update();
                    blocks = Some(self.on_new_block(height).boxed_local());
                }
            }
        }
    }
}

/// Drive `work` to completion and empty the slot; never resolves when empty.
async fn finish(work: &mut Option<LocalBoxFuture<'_, ()>>) {
    match work {
        Some(task) => {
            task.await;
            *work = None;
        }
        None => future::pending().await,
    }
}
