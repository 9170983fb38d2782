use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::models::model::Chain;

/// External endpoints for one chain: the Safe Transaction Service instance
/// indexing that chain, and the block explorer used for display links.
#[derive(Debug, Clone, Copy)]
pub struct ChainEndpoints {
    pub tx_service_url: &'static str,
    pub explorer_url: &'static str,
}

lazy_static! {
    static ref CHAIN_REGISTRY: HashMap<Chain, ChainEndpoints> = {
        let mut registry = HashMap::new();
        registry.insert(
            Chain::ETH,
            ChainEndpoints {
                tx_service_url: "https://safe-transaction-mainnet.safe.global",
                explorer_url: "https://etherscan.io",
            },
        );
        registry.insert(
            Chain::ARB,
            ChainEndpoints {
                tx_service_url: "https://safe-transaction-arbitrum.safe.global",
                explorer_url: "https://arbiscan.io",
            },
        );
        registry.insert(
            Chain::UNI,
            ChainEndpoints {
                tx_service_url: "https://safe-transaction-unichain.safe.global",
                explorer_url: "https://uniscan.xyz",
            },
        );
        registry
    };
}

/// Panics on an unregistered chain: every `Chain` variant must be added
/// here when the enum grows.
pub fn endpoints(chain: Chain) -> ChainEndpoints {
    *CHAIN_REGISTRY
        .get(&chain)
        .unwrap_or_else(|| panic!("chain {} has no registered endpoints", chain.as_str()))
}

pub fn tx_service_base_url(chain: Chain) -> &'static str {
    endpoints(chain).tx_service_url
}

pub fn block_explorer_url(chain: Chain) -> &'static str {
    endpoints(chain).explorer_url
}

pub fn address_url(chain: Chain, address: &str) -> String {
    format!("{}/address/{}", block_explorer_url(chain), address)
}

pub fn transaction_url(chain: Chain, tx_hash: &str) -> String {
    format!("{}/tx/{}", block_explorer_url(chain), tx_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_chain_is_registered() {
        for chain in Chain::all() {
            let endpoints = endpoints(chain);
            assert!(endpoints.tx_service_url.starts_with("https://"));
            assert!(endpoints.explorer_url.starts_with("https://"));
        }
    }

    #[test]
    fn address_url_points_at_the_explorer() {
        let url = address_url(Chain::ETH, "0x1f9090aaE28b8a3dCeaDf281B0F12828e676c326");
        assert_eq!(
            url,
            "https://etherscan.io/address/0x1f9090aaE28b8a3dCeaDf281B0F12828e676c326"
        );
    }

    #[test]
    fn transaction_url_points_at_the_explorer() {
        let url = transaction_url(Chain::ARB, "0xabc123");
        assert_eq!(url, "https://arbiscan.io/tx/0xabc123");
    }
}
