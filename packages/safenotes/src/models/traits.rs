use std::collections::HashSet;

use anyhow::Result;
use uuid::Uuid;

use crate::models::model::{Chain, Safe, Transfer, TransferPage};

/// Store operations the sync pipeline depends on. The concrete
/// implementation is `database::Database`; tests substitute an in-memory
/// fake. `insert_transfer_if_absent` must be idempotent keyed by
/// `transfer_id` independent of any prior `existing_transfer_ids` snapshot.
pub trait LedgerStore: Send + Sync {
    fn safes_for_organization(&self, organization_id: Uuid) -> Result<Vec<Safe>>;
    fn existing_transfer_ids(&self, safe_address: &str, chain: Chain) -> Result<HashSet<String>>;
    /// Returns true when the row was written, false when the id already
    /// existed (a silent no-op, never an error).
    fn insert_transfer_if_absent(&self, transfer: &Transfer) -> Result<bool>;
}

/// Fetch side of the sync pipeline, implemented by the transaction-service
/// client.
pub trait TransferSource: Send + Sync {
    fn fetch_transfers(
        &self,
        safe_address: &str,
        chain: Chain,
        limit: u32,
        token_address: Option<&str>,
    ) -> impl std::future::Future<Output = Result<TransferPage>> + Send;
}
