//! Wallet session management.
//!
//! The session is a small state machine (`Disconnected → Connecting →
//! Connected → Disconnected`) published through a `watch` channel. Connect and
//! disconnect sequences are serialized; network correction runs reactively
//! through [`SessionManager::guard_network`].

use knot_provider::{ProviderEvent, WalletProvider};
use knot_types::{Connector, NetworkId, Session};
use std::rc::Rc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::ClientError;

/// Session plus the persistent messages tied to the connect and network
/// controls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub session: Session,
    pub connect_error: Option<ClientError>,
    pub switch_error: Option<ClientError>,
}

impl SessionState {
    pub fn network_mismatch(&self, target: NetworkId) -> bool {
        self.session.network().is_some_and(|network| network != target)
    }
}

pub struct SessionManager {
    provider: Rc<dyn WalletProvider>,
    target: NetworkId,
    state: watch::Sender<SessionState>,
    sequence: Mutex<()>,
}

impl SessionManager {
    pub fn new(provider: Rc<dyn WalletProvider>, target: NetworkId) -> Self {
        Self {
            provider,
            target,
            state: watch::channel(SessionState::default()).0,
            sequence: Mutex::new(()),
        }
    }

    pub fn target_network(&self) -> NetworkId {
        self.target
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().session.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn connectors(&self) -> Vec<Connector> {
        self.provider.connectors()
    }

    /// Ask the wallet behind `connector_id` for access. A no-op returning the
    /// current session when already connected.
    pub async fn connect(&self, connector_id: &str) -> Result<Session, ClientError> {
        let _sequence = self.sequence.lock().await;

        let current = self.session();
        if current.is_connected() {
            debug!("connect({}) ignored; session already established", connector_id);
            return Ok(current);
        }

        let ready = self
            .provider
            .connectors()
            .iter()
            .any(|connector| connector.id == connector_id && connector.ready);
        if !ready {
            let err = ClientError::ConnectorUnavailable(connector_id.to_owned());
            warn!("{}", err);
            self.state.send_modify(|state| state.connect_error = Some(err.clone()));
            return Err(err);
        }

        self.state.send_modify(|state| {
            state.session = Session::Connecting {
                connector: connector_id.to_owned(),
            };
            state.connect_error = None;
        });

        match self.provider.connect(connector_id).await {
            Ok(connection) => {
                let session = Session::Connected {
                    connector: connector_id.to_owned(),
                    account: connection.account,
                    network: connection.network,
                };
                info!(
                    "connected {} via {} on network {}",
                    connection.account, connector_id, connection.network
                );
                self.state.send_modify(|state| {
                    state.session = session.clone();
                    state.switch_error = None;
                });
                Ok(session)
            }
            Err(err) => {
                let err = ClientError::from_connect(connector_id, err);
                warn!("connect via {} failed: {}", connector_id, err);
                self.state.send_modify(|state| {
                    state.session = Session::Disconnected;
                    state.connect_error = Some(err.clone());
                });
                Err(err)
            }
        }
    }

    /// Re-establish a session the wallet already authorized, without a
    /// prompt. Failures are logged and leave the session disconnected.
    pub async fn restore(&self) -> Option<Session> {
        let _sequence = self.sequence.lock().await;

        let current = self.session();
        if current.is_connected() {
            return Some(current);
        }

        match self.provider.authorized().await {
            Ok(Some(connection)) => {
                let session = Session::Connected {
                    connector: connection.connector,
                    account: connection.account,
                    network: connection.network,
                };
                info!("restored session for {}", connection.account);
                self.state.send_modify(|state| state.session = session.clone());
                Some(session)
            }
            Ok(None) => None,
            Err(err) => {
                debug!("session restore skipped: {}", err);
                None
            }
        }
    }

    /// Tear the session down. Idempotent.
    pub async fn disconnect(&self) {
        let _sequence = self.sequence.lock().await;

        if self.state.borrow().session == Session::Disconnected {
            return;
        }
        if let Err(err) = self.provider.disconnect().await {
            warn!("wallet disconnect failed, dropping session anyway: {}", err);
        }
        self.state.send_replace(SessionState::default());
        info!("session disconnected");
    }

    /// Request a switch to `target` unless the wallet is already on it.
    /// Returns whether a switch was requested and accepted.
    pub async fn ensure_network(&self, target: NetworkId) -> Result<bool, ClientError> {
        let Some(current) = self.session().network() else {
            return Ok(false);
        };
        if current == target {
            return Ok(false);
        }

        info!("requesting network switch from {} to {}", current, target);
        match self.provider.switch_network(target).await {
            Ok(()) => {
                self.state.send_modify(|state| {
                    if let Session::Connected { network, .. } = &mut state.session {
                        *network = target;
                    }
                    state.switch_error = None;
                });
                Ok(true)
            }
            Err(err) => {
                let err = ClientError::from_switch(target, err);
                warn!("{}", err);
                self.state.send_modify(|state| state.switch_error = Some(err.clone()));
                Err(err)
            }
        }
    }

    /// Apply a wallet-side notification to the session.
    pub fn handle_event(&self, event: &ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(Some(next)) => {
                self.state.send_if_modified(|state| match &mut state.session {
                    Session::Connected { account, .. } if account != next => {
                        info!("wallet switched account to {}", next);
                        *account = *next;
                        true
                    }
                    _ => false,
                });
            }
            ProviderEvent::AccountsChanged(None) | ProviderEvent::Disconnected => {
                if self.state.borrow().session.is_connected() {
                    info!("wallet revoked the session");
                    self.state.send_replace(SessionState::default());
                }
            }
            ProviderEvent::ChainChanged(next) => {
                let target = self.target;
                self.state.send_if_modified(|state| match &mut state.session {
                    Session::Connected { network, .. } if network != next => {
                        info!("wallet moved to network {}", next);
                        *network = *next;
                        if *next == target {
                            state.switch_error = None;
                        }
                        true
                    }
                    _ => false,
                });
            }
            ProviderEvent::NewBlock(_) => {}
        }
    }

    /// Call `ensure_network` each time the observed network changes to
    /// something other than the target. A rejected switch is not retried
    /// until the network changes again.
    pub async fn guard_network(self: Rc<Self>) {
        let mut updates = self.subscribe();
        let mut last_seen = None;
        loop {
            let observed = updates.borrow_and_update().session.network();
            if observed != last_seen {
                last_seen = observed;
                if observed.is_some_and(|network| network != self.target) {
                    let _ = self.ensure_network(self.target).await;
                }
            }
            if updates.changed().await.is_err() {
                break;
            }
        }
    }
}
