//! Bindings for the KnotNFT contract entry points this client consumes.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, sol};
use knot_provider::{CallRequest, TransactionRequest};
use knot_types::{Fact, FactValue};

use crate::ClientError;

sol! {
    interface KnotNft {
        function totalSupply() external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256);
        function mintableCount() external view returns (uint256);
        function maxMintCount() external view returns (uint256);
        function sellPrice() external view returns (uint256);
        function owner() external view returns (address);
        function isInWhitelist(address account) external view returns (bool);
        function mint() external payable;
        function addToWhitelist(address account) external;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contract {
    address: Address,
}

impl Contract {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Read call for `fact`. `None` for account-scoped facts without an account.
    pub fn read_request(&self, fact: Fact, account: Option<Address>) -> Option<CallRequest> {
        let data = match fact {
            Fact::TotalSupply => KnotNft::totalSupplyCall {}.abi_encode(),
            Fact::AccountBalance => KnotNft::balanceOfCall { owner: account? }.abi_encode(),
            Fact::MintableCount => KnotNft::mintableCountCall {}.abi_encode(),
            Fact::MaxMintCount => KnotNft::maxMintCountCall {}.abi_encode(),
            Fact::SellPrice => KnotNft::sellPriceCall {}.abi_encode(),
            Fact::Owner => KnotNft::ownerCall {}.abi_encode(),
            Fact::AccountWhitelisted => KnotNft::isInWhitelistCall { account: account? }.abi_encode(),
        };
        Some(CallRequest {
            to: self.address,
            data: Bytes::from(data),
        })
    }

    pub fn mint_request(&self, from: Address, value: U256) -> TransactionRequest {
        TransactionRequest {
            from,
            to: self.address,
            value,
            data: Bytes::from(KnotNft::mintCall {}.abi_encode()),
        }
    }

    pub fn add_to_whitelist_request(&self, from: Address, account: Address) -> TransactionRequest {
        TransactionRequest {
            from,
            to: self.address,
            value: U256::ZERO,
            data: Bytes::from(KnotNft::addToWhitelistCall { account }.abi_encode()),
        }
    }
}

pub fn decode(fact: Fact, data: &[u8]) -> Result<FactValue, alloy_sol_types::Error> {
    Ok(match fact {
        Fact::TotalSupply => FactValue::Uint(KnotNft::totalSupplyCall::abi_decode_returns(data, true)?._0),
        Fact::AccountBalance => FactValue::Uint(KnotNft::balanceOfCall::abi_decode_returns(data, true)?._0),
        Fact::MintableCount => {
            FactValue::Uint(KnotNft::mintableCountCall::abi_decode_returns(data, true)?._0)
        }
        Fact::MaxMintCount => FactValue::Uint(KnotNft::maxMintCountCall::abi_decode_returns(data, true)?._0),
        Fact::SellPrice => FactValue::Uint(KnotNft::sellPriceCall::abi_decode_returns(data, true)?._0),
        Fact::Owner => FactValue::Address(KnotNft::ownerCall::abi_decode_returns(data, true)?._0),
        Fact::AccountWhitelisted => {
            FactValue::Bool(KnotNft::isInWhitelistCall::abi_decode_returns(data, true)?._0)
        }
    })
}

/// Parse a user-supplied address. Requires the `0x` prefix and 40 hex digits;
/// mixed-case input must carry a valid EIP-55 checksum.
pub fn parse_address(candidate: &str) -> Result<Address, ClientError> {
    let invalid = || ClientError::InvalidAddress(candidate.to_owned());
    let trimmed = candidate.trim();
    let digits = trimmed.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower {
        Address::parse_checksummed(trimmed, None).map_err(|_| invalid())
    } else {
        trimmed.parse::<Address>().map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, hex};
    use alloy_sol_types::SolValue;

    const CONTRACT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
    const ALICE: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

    #[test]
    fn read_requests_use_contract_selectors() {
        let contract = Contract::new(CONTRACT);

        let supply = contract.read_request(Fact::TotalSupply, None).unwrap();
        assert_eq!(supply.to, CONTRACT);
        assert_eq!(hex::encode(&supply.data), "18160ddd");

        let owner = contract.read_request(Fact::Owner, None).unwrap();
        assert_eq!(hex::encode(&owner.data), "8da5cb5b");

        let balance = contract.read_request(Fact::AccountBalance, Some(ALICE)).unwrap();
        assert_eq!(&balance.data[..4], &hex!("70a08231"));
        assert_eq!(&balance.data[16..], ALICE.as_slice());
    }

    #[test]
    fn account_scoped_reads_need_an_account() {
        let contract = Contract::new(CONTRACT);
        assert!(contract.read_request(Fact::AccountBalance, None).is_none());
        assert!(contract.read_request(Fact::AccountWhitelisted, None).is_none());
    }

    #[test]
    fn mint_request_carries_value_and_no_arguments() {
        let contract = Contract::new(CONTRACT);
        let request = contract.mint_request(ALICE, U256::from(5));
        assert_eq!(request.from, ALICE);
        assert_eq!(request.value, U256::from(5));
        assert_eq!(hex::encode(&request.data), "1249c58b");
    }

    #[test]
    fn whitelist_request_carries_argument_and_no_value() {
        let contract = Contract::new(CONTRACT);
        let request = contract.add_to_whitelist_request(CONTRACT, ALICE);
        assert_eq!(request.value, U256::ZERO);
        assert_eq!(request.data.len(), 4 + 32);
        assert_eq!(&request.data[16..], ALICE.as_slice());
    }

    #[test]
    fn decodes_return_values() {
        let supply = U256::from(3).abi_encode();
        assert_eq!(
            decode(Fact::TotalSupply, &supply).unwrap(),
            FactValue::Uint(U256::from(3))
        );
        assert_eq!(
            decode(Fact::Owner, &ALICE.abi_encode()).unwrap(),
            FactValue::Address(ALICE)
        );
        assert_eq!(
            decode(Fact::AccountWhitelisted, &true.abi_encode()).unwrap(),
            FactValue::Bool(true)
        );
        assert!(decode(Fact::SellPrice, &[0u8; 3]).is_err());
    }

    #[test]
    fn address_parsing() {
        assert_eq!(
            parse_address("0x70997970c51812dc3a010c7d01b50e0d17dc79c8").unwrap(),
            ALICE
        );
        assert_eq!(
            parse_address(" 0x70997970C51812dc3A010C7d01b50e0d17dc79C8 ").unwrap(),
            ALICE
        );

        for bad in [
            "not-an-address",
            "",
            "70997970c51812dc3a010c7d01b50e0d17dc79c8",
            "0x70997970c51812dc3a010c7d01b50e0d17dc79",
            "0x70997970C51812DC3a010C7d01b50e0d17dc79C8",
            "0xg0997970c51812dc3a010c7d01b50e0d17dc79c8",
        ] {
            assert_eq!(
                parse_address(bad),
                Err(ClientError::InvalidAddress(bad.to_owned())),
                "{bad:?} should be rejected"
            );
        }
    }
}
