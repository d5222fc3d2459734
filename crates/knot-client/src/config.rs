use alloy_primitives::Address;
use knot_types::NetworkId;
use thiserror::Error;

pub const CONTRACT_ADDRESS_VAR: &str = "KNOT_CONTRACT_ADDRESS";
pub const CHAIN_ID_VAR: &str = "KNOT_CHAIN_ID";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("KNOT_CONTRACT_ADDRESS is not set")]
    MissingContractAddress,
    #[error("invalid contract address `{0}`")]
    InvalidContractAddress(String),
    #[error("invalid chain id `{0}`")]
    InvalidChainId(String),
}

/// Fixed external configuration of the interaction layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    pub contract_address: Address,
    pub target_network: NetworkId,
}

impl ClientConfig {
    pub fn new(contract_address: Address, target_network: NetworkId) -> Self {
        Self {
            contract_address,
            target_network,
        }
    }

    /// Reads `KNOT_CONTRACT_ADDRESS` and `KNOT_CHAIN_ID` (default: 1337).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_address = lookup(CONTRACT_ADDRESS_VAR)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingContractAddress)?;
        let contract_address = raw_address
            .trim()
            .parse::<Address>()
            .map_err(|_| ConfigError::InvalidContractAddress(raw_address.clone()))?;

        let target_network = match lookup(CHAIN_ID_VAR).filter(|value| !value.trim().is_empty()) {
            Some(raw) => NetworkId(
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidChainId(raw.clone()))?,
            ),
            None => NetworkId::LOCALHOST,
        };

        Ok(Self::new(contract_address, target_network))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_to_local_network() {
        let config = ClientConfig::from_lookup(lookup(&[(
            CONTRACT_ADDRESS_VAR,
            "0x5FbDB2315678afecb367f032d93F642f64180aa3",
        )]))
        .unwrap();
        assert_eq!(config.target_network, NetworkId(1337));
        assert_eq!(
            config.contract_address.to_string(),
            "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        );
    }

    #[test]
    fn explicit_chain_id() {
        let config = ClientConfig::from_lookup(lookup(&[
            (CONTRACT_ADDRESS_VAR, "0x5fbdb2315678afecb367f032d93f642f64180aa3"),
            (CHAIN_ID_VAR, "31337"),
        ]))
        .unwrap();
        assert_eq!(config.target_network, NetworkId(31337));
    }

    #[test]
    fn rejects_missing_or_malformed_values() {
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[])),
            Err(ConfigError::MissingContractAddress)
        );
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[(CONTRACT_ADDRESS_VAR, "0x1234")])),
            Err(ConfigError::InvalidContractAddress("0x1234".to_owned()))
        );
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[
                (CONTRACT_ADDRESS_VAR, "0x5fbdb2315678afecb367f032d93f642f64180aa3"),
                (CHAIN_ID_VAR, "rinkeby"),
            ])),
            Err(ConfigError::InvalidChainId("rinkeby".to_owned()))
        );
    }
}
