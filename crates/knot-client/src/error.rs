use knot_provider::ProviderError;
use knot_types::NetworkId;
use thiserror::Error;

/// Failures surfaced by the interaction layer. None of them is fatal: the
/// user may retry any action.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("wallet connector `{0}` is not available")]
    ConnectorUnavailable(String),
    #[error("wallet access was rejected")]
    UserRejected,
    #[error("could not switch to network {network}: {reason}")]
    SwitchRejected { network: NetworkId, reason: String },
    #[error("`{0}` is not a valid address")]
    InvalidAddress(String),
    #[error("transaction reverted: {0}")]
    TransactionReverted(String),
    #[error("transaction was rejected in the wallet")]
    TransactionRejected,
    #[error("insufficient funds for transaction")]
    InsufficientFunds,
    #[error("provider unreachable: {0}")]
    ProviderUnreachable(String),
    #[error("wallet is not connected")]
    NotConnected,
    #[error("sale price has not been loaded yet")]
    PriceNotLoaded,
    #[error("provider error: {0}")]
    Provider(String),
}

impl ClientError {
    pub(crate) fn from_connect(connector_id: &str, err: ProviderError) -> Self {
        match err {
            ProviderError::ConnectorUnavailable(_) => {
                ClientError::ConnectorUnavailable(connector_id.to_owned())
            }
            ProviderError::UserRejected => ClientError::UserRejected,
            other => Self::from_common(other),
        }
    }

    pub(crate) fn from_switch(network: NetworkId, err: ProviderError) -> Self {
        let reason = match err {
            ProviderError::UserRejected => "rejected by the user".to_owned(),
            ProviderError::UnrecognizedNetwork(_) => "network is not configured in the wallet".to_owned(),
            other => other.to_string(),
        };
        ClientError::SwitchRejected { network, reason }
    }

    pub(crate) fn from_write(err: ProviderError) -> Self {
        match err {
            ProviderError::UserRejected => ClientError::TransactionRejected,
            ProviderError::Reverted(reason) => ClientError::TransactionReverted(reason),
            ProviderError::InsufficientFunds => ClientError::InsufficientFunds,
            other => Self::from_common(other),
        }
    }

    fn from_common(err: ProviderError) -> Self {
        match err {
            ProviderError::Unreachable(reason) => ClientError::ProviderUnreachable(reason),
            other => ClientError::Provider(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_rejection_depends_on_context() {
        assert_eq!(
            ClientError::from_connect("metaMask", ProviderError::UserRejected),
            ClientError::UserRejected
        );
        assert_eq!(
            ClientError::from_write(ProviderError::UserRejected),
            ClientError::TransactionRejected
        );
        assert_eq!(
            ClientError::from_switch(NetworkId(1337), ProviderError::UserRejected),
            ClientError::SwitchRejected {
                network: NetworkId(1337),
                reason: "rejected by the user".to_owned()
            }
        );
    }

    #[test]
    fn write_failures_keep_provider_detail() {
        assert_eq!(
            ClientError::from_write(ProviderError::Reverted("Sold out".to_owned())),
            ClientError::TransactionReverted("Sold out".to_owned())
        );
        assert_eq!(
            ClientError::from_write(ProviderError::InsufficientFunds),
            ClientError::InsufficientFunds
        );
        assert_eq!(
            ClientError::from_write(ProviderError::Unreachable("timeout".to_owned())),
            ClientError::ProviderUnreachable("timeout".to_owned())
        );
    }

    #[test]
    fn unavailable_connector_names_the_requested_id() {
        let err = ClientError::from_connect(
            "metaMask",
            ProviderError::ConnectorUnavailable("metaMask (no extension)".to_owned()),
        );
        assert_eq!(err, ClientError::ConnectorUnavailable("metaMask".to_owned()));
        assert_eq!(err.to_string(), "wallet connector `metaMask` is not available");
    }
}
