use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::model::{Chain, SafeSyncStatus};

// ============================================================================
// SYNC MODELS
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub transfer_limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub statuses: HashMap<String, SafeSyncStatus>,
    pub written: usize,
    pub skipped: usize,
    pub error: Option<String>,
}

// ============================================================================
// TRANSFER MODELS
// ============================================================================

/// Narrows the table/export perspective to one safe+chain when both fields
/// are present.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableQuery {
    pub safe_address: Option<String>,
    pub chain: Option<Chain>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransfersQuery {
    pub safe_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransferCategoryRequest {
    pub category_id: Option<Uuid>,
    pub description: Option<String>,
}

// ============================================================================
// SAFE / CATEGORY MODELS
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSafeRequest {
    pub address: String,
    #[serde(default = "default_chain")]
    pub chain: Chain,
    pub organization_id: Uuid,
}

fn default_chain() -> Chain {
    Chain::ETH
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeActionRequest {
    pub address: String,
    pub chain: Chain,
    pub organization_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationQuery {
    pub organization_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    pub name: String,
    pub organization_id: Uuid,
}

// ============================================================================
// SHARED RESPONSES
// ============================================================================

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}
