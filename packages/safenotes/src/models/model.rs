use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub safe_api: SafeApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeApiConfig {
    pub bearer_token: Option<String>,
    pub write_delay_ms: u64,
    pub transfer_limit: u32,
}

// ==================== Chains ====================

/// Closed set of chains a safe can be tracked on. Extending this enum
/// requires registering endpoints in `chains::registry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    ETH,
    ARB,
    UNI,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ETH => "ETH",
            Self::ARB => "ARB",
            Self::UNI => "UNI",
        }
    }

    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_uppercase().as_str() {
            "ETH" => Ok(Self::ETH),
            "ARB" => Ok(Self::ARB),
            "UNI" => Ok(Self::UNI),
            _ => Err(anyhow::anyhow!("unsupported chain: {}", s)),
        }
    }

    pub fn all() -> [Chain; 3] {
        [Self::ETH, Self::ARB, Self::UNI]
    }
}

// ==================== Transfers ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferType {
    EtherTransfer,
    Erc20Transfer,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EtherTransfer => "ETHER_TRANSFER",
            Self::Erc20Transfer => "ERC20_TRANSFER",
        }
    }

    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "ETHER_TRANSFER" => Ok(Self::EtherTransfer),
            "ERC20_TRANSFER" => Ok(Self::Erc20Transfer),
            _ => Err(anyhow::anyhow!("unsupported transfer type: {}", s)),
        }
    }
}

/// Token metadata attached to ERC-20 transfers by the transaction service.
/// `trusted` is the service's spam flag; native transfers carry no token info.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    #[serde(default)]
    pub address: Option<String>,
    pub name: String,
    pub symbol: String,
    pub decimals: i32,
    #[serde(default)]
    pub logo_uri: Option<String>,
    pub trusted: bool,
}

/// A transfer as returned by the transaction service, stamped with the
/// queried safe and chain. The service does not echo back which safe a row
/// was fetched for, so the client tags every record before returning it;
/// this tagged shape is the canonical fetched representation downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeTransfer {
    pub safe_address: String,
    pub chain: Chain,
    #[serde(rename = "type")]
    pub transfer_type: TransferType,
    pub execution_date: DateTime<Utc>,
    pub block_number: i64,
    pub transaction_hash: String,
    pub transfer_id: String,
    pub to: String,
    pub from: String,
    pub value: Option<String>,
    pub token_address: Option<String>,
    pub token_info: Option<TokenInfo>,
}

impl SafeTransfer {
    /// Flattens the fetched shape into the stored ledger row.
    pub fn to_stored(&self) -> Transfer {
        Transfer {
            transfer_id: self.transfer_id.clone(),
            safe_address: self.safe_address.clone(),
            safe_chain: self.chain,
            transfer_type: self.transfer_type,
            execution_date: self.execution_date,
            block_number: self.block_number,
            transaction_hash: self.transaction_hash.clone(),
            from_address: self.from.clone(),
            to_address: self.to.clone(),
            value: self.value.clone(),
            token_address: self.token_address.clone(),
            token_name: self.token_info.as_ref().map(|t| t.name.clone()),
            token_symbol: self.token_info.as_ref().map(|t| t.symbol.clone()),
            token_decimals: self.token_info.as_ref().map(|t| t.decimals),
            token_logo_uri: self.token_info.as_ref().and_then(|t| t.logo_uri.clone()),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferPage {
    pub count: usize,
    pub results: Vec<SafeTransfer>,
}

/// An immutable ledger row. `transfer_id` is assigned by the transaction
/// service and stable across refetches; rows are only ever inserted-if-absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub transfer_id: String,
    pub safe_address: String,
    pub safe_chain: Chain,
    pub transfer_type: TransferType,
    pub execution_date: DateTime<Utc>,
    pub block_number: i64,
    pub transaction_hash: String,
    pub from_address: String,
    pub to_address: String,
    pub value: Option<String>,
    pub token_address: Option<String>,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub token_decimals: Option<i32>,
    pub token_logo_uri: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ==================== Safes / annotations ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Safe {
    pub address: String,
    pub chain: Chain,
    pub organization_id: Uuid,
    pub removed: bool,
    pub removed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCategory {
    pub id: Uuid,
    pub transfer_id: String,
    pub category_id: Uuid,
    pub description: Option<String>,
}

/// The perspective a table view is generated for: one specific safe+chain,
/// or (when absent) every safe of the organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedSafe {
    pub address: String,
    pub chain: Chain,
}

// ==================== Sync progress ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Pending,
    Syncing,
    Completed,
    Error,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub current: usize,
    pub total: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeSyncStatus {
    pub safe: SelectedSafe,
    pub state: SyncState,
    pub message: Option<String>,
    pub progress: SyncProgress,
}

/// One progress update, keyed by the safe's chain-scoped identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub safe_id: String,
    pub status: SafeSyncStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub statuses: HashMap<String, SafeSyncStatus>,
    pub written: usize,
    pub skipped: usize,
}

// ==================== Table view ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    In,
    Out,
}

impl ViewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// A direction-tagged display row. A single transfer can yield zero, one or
/// two rows depending on how many tracked identities it touches.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTableItem {
    #[serde(flatten)]
    pub transfer: Transfer,
    pub view_type: ViewType,
}

// ==================== Balances ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceTokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: i32,
    #[serde(default)]
    pub logo_uri: Option<String>,
}

/// Current holdings of a safe as reported by the transaction service.
/// Display-only; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeBalance {
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default)]
    pub token: Option<BalanceTokenInfo>,
    pub balance: String,
}
