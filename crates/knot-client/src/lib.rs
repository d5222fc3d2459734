//! Wallet and contract interaction layer for the KnotNFT mint page.
//!
//! [`MintClient`] is the explicit context threaded through a front-end: it
//! owns one [`SessionManager`], one [`ReadModel`] and one [`WriteDispatcher`]
//! over a shared [`WalletProvider`] handle, and derives the [`View`] from
//! their current state.

pub mod config;
pub mod contract;
pub mod dispatcher;
pub mod error;
pub mod read_model;
pub mod session;
pub mod spawn;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod view;

pub use config::{ClientConfig, ConfigError};
pub use dispatcher::WriteDispatcher;
pub use error::ClientError;
pub use read_model::ReadModel;
pub use session::{SessionManager, SessionState};
pub use view::{View, ViewState, WhitelistDraft};

use knot_provider::{ProviderEvent, WalletProvider};
use knot_types::{PendingTransaction, Session, Snapshot, TxKind};
use std::rc::Rc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::contract::Contract;

pub struct MintClient {
    config: ClientConfig,
    provider: Rc<dyn WalletProvider>,
    session: Rc<SessionManager>,
    read_model: Rc<ReadModel>,
    dispatcher: Rc<WriteDispatcher>,
    heads: Rc<watch::Sender<u64>>,
}

impl MintClient {
    pub fn new(config: ClientConfig, provider: Rc<dyn WalletProvider>) -> Self {
        let contract = Contract::new(config.contract_address);
        let session = Rc::new(SessionManager::new(
            Rc::clone(&provider),
            config.target_network,
        ));
        let read_model = Rc::new(ReadModel::new(Rc::clone(&provider), contract));
        let dispatcher = Rc::new(WriteDispatcher::new(
            Rc::clone(&provider),
            contract,
            session.subscribe(),
            Rc::clone(&read_model),
        ));
        Self {
            config,
            provider,
            session,
            read_model,
            dispatcher,
            heads: Rc::new(watch::channel(0).0),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Rc<SessionManager> {
        &self.session
    }

    pub fn read_model(&self) -> &Rc<ReadModel> {
        &self.read_model
    }

    pub fn dispatcher(&self) -> &Rc<WriteDispatcher> {
        &self.dispatcher
    }

    /// Spawn the background tasks (provider event pump, network guard,
    /// read-model sync), then try to restore an already-authorized session.
    pub async fn start(&self) -> Option<Session> {
        let mut events = self.provider.subscribe();
        let session = Rc::clone(&self.session);
        let heads = Rc::clone(&self.heads);
        spawn::spawn_local(async move {
            loop {
                match events.recv().await {
                    Ok(ProviderEvent::NewBlock(height)) => {
                        heads.send_if_modified(|current| {
                            let advanced = *current != height;
                            *current = height;
                            advanced
                        });
                    }
                    Ok(event) => session.handle_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("provider event stream lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => {
                        debug!("provider event stream closed");
                        break;
                    }
                }
            }
        });

        spawn::spawn_local(Rc::clone(&self.session).guard_network());
        spawn::spawn_local(
            Rc::clone(&self.read_model).run(self.heads.subscribe(), self.session.subscribe()),
        );

        self.session.restore().await
    }

    pub async fn connect(&self, connector_id: &str) -> Result<Session, ClientError> {
        self.session.connect(connector_id).await
    }

    pub async fn disconnect(&self) {
        self.session.disconnect().await
    }

    pub fn mint(&self) -> Result<(), ClientError> {
        self.dispatcher.mint()
    }

    pub fn add_to_whitelist(&self, candidate: &str) -> Result<(), ClientError> {
        self.dispatcher.add_to_whitelist(candidate)
    }

    /// Receivers for every piece of state the view depends on.
    pub fn subscribe(&self) -> Changes {
        Changes {
            session: self.session.subscribe(),
            snapshot: self.read_model.subscribe(),
            mint: self.dispatcher.subscribe(TxKind::Mint),
            whitelist: self.dispatcher.subscribe(TxKind::AddToWhitelist),
        }
    }

    pub fn view(&self, draft: &WhitelistDraft) -> View {
        let session = self.session.state();
        let connectors = self.session.connectors();
        let snapshot = self.read_model.snapshot();
        let mint = self.dispatcher.status(TxKind::Mint);
        let whitelist = self.dispatcher.status(TxKind::AddToWhitelist);
        ViewState {
            session: &session,
            connectors: &connectors,
            target_network: self.config.target_network,
            snapshot: &snapshot,
            mint: &mint,
            whitelist: &whitelist,
            draft,
        }
        .render()
    }
}

/// Change notifications for the view inputs. Bursts of updates coalesce.
pub struct Changes {
    session: watch::Receiver<SessionState>,
    snapshot: watch::Receiver<Snapshot>,
    mint: watch::Receiver<PendingTransaction>,
    whitelist: watch::Receiver<PendingTransaction>,
}

impl Changes {
    /// Resolves once any input changed. `false` once the client is gone.
    pub async fn changed(&mut self) -> bool {
        let result = tokio::select! {
            result = self.session.changed() => result,
            result = self.snapshot.changed() => result,
            result = self.mint.changed() => result,
            result = self.whitelist.changed() => result,
        };
        self.session.borrow_and_update();
        self.snapshot.borrow_and_update();
        self.mint.borrow_and_update();
        self.whitelist.borrow_and_update();
        result.is_ok()
    }
}
