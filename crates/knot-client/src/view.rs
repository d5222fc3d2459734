//! Pure derivation of the user interface from session, read-model and
//! pending-transaction state. Front-ends turn a [`View`] into DOM nodes or
//! terminal text; nothing here has side effects.

use alloy_primitives::U256;
use alloy_primitives::utils::format_ether;
use knot_types::{Connector, NetworkId, PendingTransaction, Snapshot, TxStatus};
use serde::Serialize;

use crate::session::SessionState;

/// Address typed into the whitelist panel. Owned by the front-end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhitelistDraft(String);

impl WhitelistDraft {
    pub fn set(&mut self, value: impl Into<String>) {
        self.0 = value.into();
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Hand the draft over for submission, clearing it.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ViewState<'a> {
    pub session: &'a SessionState,
    pub connectors: &'a [Connector],
    pub target_network: NetworkId,
    pub snapshot: &'a Snapshot,
    pub mint: &'a PendingTransaction,
    pub whitelist: &'a PendingTransaction,
    pub draft: &'a WhitelistDraft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum View {
    Connect(ConnectView),
    Dashboard(DashboardView),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectView {
    pub connectors: Vec<ConnectorButton>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorButton {
    pub id: String,
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardView {
    /// EIP-55 checksummed.
    pub account: String,
    pub network: NetworkId,
    pub network_notice: Option<String>,
    pub total_supply: String,
    pub account_balance: String,
    pub mintable_count: String,
    pub max_mint_count: String,
    pub price_ether: String,
    pub badge: Badge,
    pub mint: Option<MintPanel>,
    pub whitelist: Option<WhitelistPanel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    Owner,
    Whitelisted,
    NotWhitelisted,
    Checking,
}

impl Badge {
    pub fn label(self) -> &'static str {
        match self {
            Badge::Owner => "owner",
            Badge::Whitelisted => "whitelisted",
            Badge::NotWhitelisted => "not whitelisted",
            Badge::Checking => "checking…",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintPanel {
    /// Whether the mint action may be triggered now.
    pub enabled: bool,
    pub label: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhitelistPanel {
    pub draft: String,
    pub enabled: bool,
    pub status: Option<String>,
}

const UNKNOWN: &str = "…";

impl ViewState<'_> {
    /// Session account equals the contract owner. False while either is
    /// unknown.
    pub fn is_owner(&self) -> bool {
        match (self.session.session.account(), self.snapshot.owner) {
            (Some(account), Some(owner)) => account == owner,
            _ => false,
        }
    }

    /// An unknown whitelist membership counts as not whitelisted.
    pub fn is_mintable(&self) -> bool {
        self.is_owner() || self.account_whitelisted() == Some(true)
    }

    /// Whitelist membership of the session account. Unknown while the
    /// snapshot still holds another account's answer.
    pub fn account_whitelisted(&self) -> Option<bool> {
        self.scoped(self.snapshot.account_whitelisted)
    }

    pub fn account_balance(&self) -> Option<U256> {
        self.scoped(self.snapshot.account_balance)
    }

    fn scoped<T>(&self, value: Option<T>) -> Option<T> {
        value.filter(|_| self.snapshot.is_scoped_to(self.session.session.account()))
    }

    pub fn can_mint(&self) -> bool {
        self.session.session.is_connected()
            && !self.session.network_mismatch(self.target_network)
            && !self.mint.status.is_in_flight()
            && self.is_mintable()
    }

    pub fn render(&self) -> View {
        let (Some(account), Some(network)) = (
            self.session.session.account(),
            self.session.session.network(),
        ) else {
            return View::Connect(self.connect_view());
        };

        let snapshot = self.snapshot;
        let price_ether = snapshot
            .sell_price
            .map(format_price)
            .unwrap_or_else(|| "0".to_owned());

        let mint = self.is_mintable().then(|| MintPanel {
            enabled: self.can_mint(),
            label: format!("Mint for {price_ether} ETH"),
            status: status_line(self.mint),
        });

        let whitelist = self.is_owner().then(|| WhitelistPanel {
            draft: self.draft.as_str().to_owned(),
            enabled: !self.draft.is_empty() && !self.whitelist.status.is_in_flight(),
            status: status_line(self.whitelist),
        });

        View::Dashboard(DashboardView {
            account: account.to_checksum(None),
            network,
            network_notice: self.network_notice(network),
            total_supply: count(snapshot.total_supply),
            account_balance: count(self.account_balance()),
            mintable_count: count(snapshot.mintable_count),
            max_mint_count: count(snapshot.max_mint_count),
            price_ether,
            badge: self.badge(),
            mint,
            whitelist,
        })
    }

    fn connect_view(&self) -> ConnectView {
        let pending = self.session.session.pending_connector();
        let connectors = self
            .connectors
            .iter()
            .map(|connector| {
                let connecting = pending == Some(connector.id.as_str());
                let mut label = connector.name.clone();
                if !connector.ready {
                    label.push_str(" (not supported)");
                }
                if connecting {
                    label.push_str(" (connecting)");
                }
                ConnectorButton {
                    id: connector.id.clone(),
                    label,
                    enabled: connector.ready && pending.is_none(),
                }
            })
            .collect();

        ConnectView {
            connectors,
            error: self.session.connect_error.as_ref().map(ToString::to_string),
        }
    }

    fn network_notice(&self, network: NetworkId) -> Option<String> {
        if network == self.target_network {
            return None;
        }
        let mut notice = format!(
            "Connected to network {network}; this app runs on network {}.",
            self.target_network
        );
        if let Some(err) = &self.session.switch_error {
            notice.push(' ');
            notice.push_str(&err.to_string());
        }
        Some(notice)
    }

    fn badge(&self) -> Badge {
        if self.is_owner() {
            return Badge::Owner;
        }
        match self.account_whitelisted() {
            Some(true) => Badge::Whitelisted,
            Some(false) => Badge::NotWhitelisted,
            None => Badge::Checking,
        }
    }
}

/// Wei amount as ether, without trailing zeros.
pub fn format_price(wei: U256) -> String {
    let ether = format_ether(wei);
    if ether.contains('.') {
        ether.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        ether
    }
}

fn count(value: Option<U256>) -> String {
    value.map_or_else(|| UNKNOWN.to_owned(), |value| value.to_string())
}

fn status_line(tx: &PendingTransaction) -> Option<String> {
    match tx.status {
        TxStatus::Idle => None,
        TxStatus::Submitting => Some("Waiting for wallet confirmation…".to_owned()),
        TxStatus::Pending => Some(match tx.tx_hash {
            Some(hash) => format!("Pending: {hash}"),
            None => "Pending…".to_owned(),
        }),
        TxStatus::Confirmed => Some("Confirmed".to_owned()),
        TxStatus::Failed => Some(format!(
            "Failed: {}",
            tx.error.as_deref().unwrap_or("unknown error")
        )),
    }
}
