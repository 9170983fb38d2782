use anyhow::{Context, Result};

use crate::models::model::{Chain, SelectedSafe};

const SEPARATOR: char = '_';

/// Builds the chain-scoped identity for an address. The same address string
/// can be a tracked safe on one chain and an unrelated counterparty on
/// another, so membership checks always go through this key.
pub fn create_safe_chain_unique_id(address: &str, chain: Chain) -> String {
    format!(
        "{}{}{}",
        address.to_lowercase(),
        SEPARATOR,
        chain.as_str().to_lowercase()
    )
}

/// Inverse of `create_safe_chain_unique_id`. The round trip is exact only up
/// to case-folding: the address comes back lowercased, never re-checksummed.
pub fn parse_safe_chain_unique_id(unique_id: &str) -> Result<SelectedSafe> {
    let (address, chain) = unique_id
        .split_once(SEPARATOR)
        .with_context(|| format!("malformed safe-chain id: {}", unique_id))?;

    Ok(SelectedSafe {
        address: address.to_string(),
        chain: Chain::from_str(chain)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_lowercases_the_address() {
        for chain in Chain::all() {
            let address = "0xDef1C0ded9bec7F1a1670819833240f027b25EfF";
            let parsed = parse_safe_chain_unique_id(&create_safe_chain_unique_id(address, chain))
                .unwrap();

            assert_eq!(parsed.address, address.to_lowercase());
            assert_eq!(parsed.chain, chain);
        }
    }

    #[test]
    fn id_is_fully_lowercase() {
        let id = create_safe_chain_unique_id("0xABCDEF0123456789abcdef0123456789ABCDEF01", Chain::ARB);
        assert_eq!(id, "0xabcdef0123456789abcdef0123456789abcdef01_arb");
    }

    #[test]
    fn parse_rejects_ids_without_separator() {
        assert!(parse_safe_chain_unique_id("0xabcdef").is_err());
    }

    #[test]
    fn parse_rejects_unknown_chains() {
        assert!(parse_safe_chain_unique_id("0xabcdef_dogechain").is_err());
    }
}
