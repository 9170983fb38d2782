use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use ethers::types::Address;
use ethers::utils::to_checksum;
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::chains::registry;
use crate::models::{
    model::{Chain, SafeApiConfig, SafeBalance, SafeTransfer, TokenInfo, TransferPage, TransferType},
    traits::TransferSource,
};

/// Per-chain transfer history as indexed by the Safe Transaction Service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSafeTransfer {
    #[serde(rename = "type")]
    transfer_type: TransferType,
    execution_date: DateTime<Utc>,
    block_number: i64,
    transaction_hash: String,
    transfer_id: String,
    to: String,
    from: String,
    value: Option<String>,
    #[serde(default)]
    token_address: Option<String>,
    #[serde(default)]
    token_info: Option<TokenInfo>,
}

impl RawSafeTransfer {
    /// The service does not echo the queried safe back, so every row gets
    /// stamped with the (safe, chain) pair it was fetched for. The address
    /// keeps its caller-provided casing.
    fn tagged(self, safe_address: &str, chain: Chain) -> SafeTransfer {
        SafeTransfer {
            safe_address: safe_address.to_string(),
            chain,
            transfer_type: self.transfer_type,
            execution_date: self.execution_date,
            block_number: self.block_number,
            transaction_hash: self.transaction_hash,
            transfer_id: self.transfer_id,
            to: self.to,
            from: self.from,
            value: self.value,
            token_address: self.token_address,
            token_info: self.token_info,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTransferPage {
    results: Vec<RawSafeTransfer>,
}

pub struct SafeTransferClient {
    http: Client,
    bearer_token: Option<String>,
}

impl SafeTransferClient {
    pub fn new(config: &SafeApiConfig) -> Self {
        Self {
            http: Client::new(),
            bearer_token: config.bearer_token.clone(),
        }
    }

    /// Validates the address syntactically and returns its EIP-55
    /// checksummed form for embedding in request URLs.
    fn checksum_address(address: &str) -> Result<String> {
        if !address.starts_with("0x") || address.len() != 42 || hex::decode(&address[2..]).is_err()
        {
            return Err(anyhow!("invalid safe address: {}", address));
        }

        let parsed: Address = address
            .parse()
            .map_err(|_| anyhow!("invalid safe address: {}", address))?;

        Ok(to_checksum(&parsed, None))
    }

    pub(crate) fn transfers_url(
        chain: Chain,
        checksummed_address: &str,
        limit: u32,
        token_address: Option<&str>,
    ) -> String {
        let mut url = format!(
            "{}/api/v1/safes/{}/transfers/?limit={}",
            registry::tx_service_base_url(chain),
            checksummed_address,
            limit
        );

        if let Some(token) = token_address {
            url.push_str("&token_address=");
            url.push_str(token);
        }

        url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut request = self.http.get(url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP {}", response.status()));
        }

        Ok(response.json::<T>().await?)
    }

    /// Current holdings of a safe. Display-only data, never persisted.
    pub async fn fetch_balances(
        &self,
        safe_address: &str,
        chain: Chain,
    ) -> Result<Vec<SafeBalance>> {
        let checksummed = Self::checksum_address(safe_address)?;
        let url = format!(
            "{}/api/v1/safes/{}/balances/",
            registry::tx_service_base_url(chain),
            checksummed
        );

        self.get_json(&url).await.map_err(|e| {
            warn!(
                "Balance fetch failed for safe {} on {}: {}",
                safe_address,
                chain.as_str(),
                e
            );
            anyhow!(
                "failed to fetch balances for safe {} on {}: {}",
                safe_address,
                chain.as_str(),
                e
            )
        })
    }
}

impl TransferSource for SafeTransferClient {
    async fn fetch_transfers(
        &self,
        safe_address: &str,
        chain: Chain,
        limit: u32,
        token_address: Option<&str>,
    ) -> Result<TransferPage> {
        let checksummed = Self::checksum_address(safe_address)?;
        let url = Self::transfers_url(chain, &checksummed, limit, token_address);

        let page: RawTransferPage = self.get_json(&url).await.map_err(|e| {
            anyhow!(
                "failed to fetch transfers for safe {} on {}: {}",
                safe_address,
                chain.as_str(),
                e
            )
        })?;

        let results: Vec<SafeTransfer> = page
            .results
            .into_iter()
            .map(|raw| raw.tagged(safe_address, chain))
            .collect();

        info!(
            "Fetched {} transfers for safe {} on {}",
            results.len(),
            safe_address,
            chain.as_str()
        );

        Ok(TransferPage {
            count: results.len(),
            results,
        })
    }
}

/// Drops transfers whose token metadata is flagged untrusted by the service.
/// Native transfers carry no token metadata and always pass. Pure and
/// order-preserving.
pub fn filter_trusted_transfers(transfers: Vec<SafeTransfer>) -> Vec<SafeTransfer> {
    transfers
        .into_iter()
        .filter(|transfer| match &transfer.token_info {
            Some(info) => info.trusted,
            None => true,
        })
        .collect()
}
