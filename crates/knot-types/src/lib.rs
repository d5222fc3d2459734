use alloy_primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NetworkId(pub u64);

impl NetworkId {
    /// Local development chain.
    pub const LOCALHOST: NetworkId = NetworkId(1337);

    /// `0x`-prefixed hex form used by `wallet_switchEthereumChain`.
    pub fn to_hex(self) -> String {
        format!("{:#x}", self.0)
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A wallet adapter the user can connect through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connector {
    pub id: String,
    pub name: String,
    pub ready: bool,
}

/// Wallet session as seen by the interaction layer.
///
/// The account is only reachable through `Connected`, so "account present iff
/// connected" cannot be violated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Session {
    #[default]
    Disconnected,
    Connecting {
        connector: String,
    },
    Connected {
        connector: String,
        account: Address,
        network: NetworkId,
    },
}

impl Session {
    pub fn is_connected(&self) -> bool {
        matches!(self, Session::Connected { .. })
    }

    pub fn account(&self) -> Option<Address> {
        match self {
            Session::Connected { account, .. } => Some(*account),
            _ => None,
        }
    }

    pub fn network(&self) -> Option<NetworkId> {
        match self {
            Session::Connected { network, .. } => Some(*network),
            _ => None,
        }
    }

    pub fn pending_connector(&self) -> Option<&str> {
        match self {
            Session::Connecting { connector } => Some(connector),
            _ => None,
        }
    }
}

/// Named on-chain facts kept in the read-model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Fact {
    TotalSupply,
    AccountBalance,
    MintableCount,
    MaxMintCount,
    SellPrice,
    Owner,
    AccountWhitelisted,
}

impl Fact {
    pub const ALL: [Fact; 7] = [
        Fact::TotalSupply,
        Fact::AccountBalance,
        Fact::MintableCount,
        Fact::MaxMintCount,
        Fact::SellPrice,
        Fact::Owner,
        Fact::AccountWhitelisted,
    ];

    /// Watched facts re-run on every new block; the rest are read once.
    pub fn is_watched(self) -> bool {
        matches!(
            self,
            Fact::TotalSupply | Fact::AccountBalance | Fact::MintableCount | Fact::AccountWhitelisted
        )
    }

    /// Facts whose query takes the session account as argument.
    pub fn is_account_scoped(self) -> bool {
        matches!(self, Fact::AccountBalance | Fact::AccountWhitelisted)
    }
}

/// A decoded contract return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactValue {
    Uint(U256),
    Address(Address),
    Bool(bool),
}

/// Immutable view of the contract state. Entries are refreshed independently
/// and may reflect different block heights.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub total_supply: Option<U256>,
    pub account_balance: Option<U256>,
    pub mintable_count: Option<U256>,
    pub max_mint_count: Option<U256>,
    /// In wei.
    pub sell_price: Option<U256>,
    pub owner: Option<Address>,
    /// `None` means unknown, not "not whitelisted".
    pub account_whitelisted: Option<bool>,
    /// Account the account-scoped entries were read for.
    pub account: Option<Address>,
}

impl Snapshot {
    pub fn is_loaded(&self, fact: Fact) -> bool {
        match fact {
            Fact::TotalSupply => self.total_supply.is_some(),
            Fact::AccountBalance => self.account_balance.is_some(),
            Fact::MintableCount => self.mintable_count.is_some(),
            Fact::MaxMintCount => self.max_mint_count.is_some(),
            Fact::SellPrice => self.sell_price.is_some(),
            Fact::Owner => self.owner.is_some(),
            Fact::AccountWhitelisted => self.account_whitelisted.is_some(),
        }
    }

    /// Store a decoded value. Returns `false` when the value type does not
    /// match the fact, leaving the entry untouched.
    pub fn apply(&mut self, fact: Fact, value: FactValue) -> bool {
        match (fact, value) {
            (Fact::TotalSupply, FactValue::Uint(v)) => self.total_supply = Some(v),
            (Fact::AccountBalance, FactValue::Uint(v)) => self.account_balance = Some(v),
            (Fact::MintableCount, FactValue::Uint(v)) => self.mintable_count = Some(v),
            (Fact::MaxMintCount, FactValue::Uint(v)) => self.max_mint_count = Some(v),
            (Fact::SellPrice, FactValue::Uint(v)) => self.sell_price = Some(v),
            (Fact::Owner, FactValue::Address(a)) => self.owner = Some(a),
            (Fact::AccountWhitelisted, FactValue::Bool(b)) => self.account_whitelisted = Some(b),
            _ => return false,
        }
        true
    }

    /// Account-scoped entries, when they belong to `account`.
    pub fn is_scoped_to(&self, account: Option<Address>) -> bool {
        account.is_some() && self.account == account
    }

    pub fn clear(&mut self, fact: Fact) {
        match fact {
            Fact::TotalSupply => self.total_supply = None,
            Fact::AccountBalance => self.account_balance = None,
            Fact::MintableCount => self.mintable_count = None,
            Fact::MaxMintCount => self.max_mint_count = None,
            Fact::SellPrice => self.sell_price = None,
            Fact::Owner => self.owner = None,
            Fact::AccountWhitelisted => self.account_whitelisted = None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Mint,
    AddToWhitelist,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    #[default]
    Idle,
    Submitting,
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn is_in_flight(self) -> bool {
        matches!(self, TxStatus::Submitting | TxStatus::Pending)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingTransaction {
    pub kind: TxKind,
    pub status: TxStatus,
    pub tx_hash: Option<TxHash>,
    pub error: Option<String>,
}

impl PendingTransaction {
    pub fn idle(kind: TxKind) -> Self {
        Self {
            kind,
            status: TxStatus::Idle,
            tx_hash: None,
            error: None,
        }
    }
}
