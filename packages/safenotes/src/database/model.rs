use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::models::{
    model::{Category, Chain, Safe, Transfer, TransferCategory, TransferType},
    schema::{categories, safes, transfer_categories, transfers},
};

// ==================== Transfers ====================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = transfers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbTransfer {
    pub transfer_id: String,
    pub safe_address: String,
    pub safe_chain: String,
    pub transfer_type: String,
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

#[derive(Debug, Insertable)]
#[diesel(table_name = transfers)]
pub struct NewTransfer<'a> {
    pub transfer_id: &'a str,
    pub safe_address: &'a str,
    pub safe_chain: &'a str,
    pub transfer_type: &'a str,
    pub execution_date: DateTime<Utc>,
    pub block_number: i64,
    pub transaction_hash: &'a str,
    pub from_address: &'a str,
    pub to_address: &'a str,
    pub value: Option<&'a str>,
    pub token_address: Option<&'a str>,
    pub token_name: Option<&'a str>,
    pub token_symbol: Option<&'a str>,
    pub token_decimals: Option<i32>,
    pub token_logo_uri: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbTransfer> for Transfer {
    type Error = anyhow::Error;

    fn try_from(db: DbTransfer) -> Result<Self> {
        Ok(Self {
            transfer_id: db.transfer_id,
            safe_address: db.safe_address,
            safe_chain: Chain::from_str(&db.safe_chain)?,
            transfer_type: TransferType::from_str(&db.transfer_type)?,
            execution_date: db.execution_date,
            block_number: db.block_number,
            transaction_hash: db.transaction_hash,
            from_address: db.from_address,
            to_address: db.to_address,
            value: db.value,
            token_address: db.token_address,
            token_name: db.token_name,
            token_symbol: db.token_symbol,
            token_decimals: db.token_decimals,
            token_logo_uri: db.token_logo_uri,
            created_at: db.created_at,
        })
    }
}

impl<'a> From<&'a Transfer> for NewTransfer<'a> {
    fn from(transfer: &'a Transfer) -> Self {
        Self {
            transfer_id: &transfer.transfer_id,
            safe_address: &transfer.safe_address,
            safe_chain: transfer.safe_chain.as_str(),
            transfer_type: transfer.transfer_type.as_str(),
            execution_date: transfer.execution_date,
            block_number: transfer.block_number,
            transaction_hash: &transfer.transaction_hash,
            from_address: &transfer.from_address,
            to_address: &transfer.to_address,
            value: transfer.value.as_deref(),
            token_address: transfer.token_address.as_deref(),
            token_name: transfer.token_name.as_deref(),
            token_symbol: transfer.token_symbol.as_deref(),
            token_decimals: transfer.token_decimals,
            token_logo_uri: transfer.token_logo_uri.as_deref(),
            created_at: transfer.created_at,
        }
    }
}

// ==================== Safes ====================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = safes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbSafe {
    pub address: String,
    pub chain: String,
    pub organization_id: Uuid,
    pub removed: bool,
    pub removed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = safes)]
pub struct NewSafe<'a> {
    pub address: &'a str,
    pub chain: &'a str,
    pub organization_id: Uuid,
    pub removed: bool,
    pub removed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbSafe> for Safe {
    type Error = anyhow::Error;

    fn try_from(db: DbSafe) -> Result<Self> {
        Ok(Self {
            address: db.address,
            chain: Chain::from_str(&db.chain)?,
            organization_id: db.organization_id,
            removed: db.removed,
            removed_at: db.removed_at,
            created_at: db.created_at,
        })
    }
}

// ==================== Categories ====================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbCategory {
    pub id: Uuid,
    pub name: String,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = categories)]
pub struct NewCategory<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbCategory> for Category {
    fn from(db: DbCategory) -> Self {
        Self {
            id: db.id,
            name: db.name,
            organization_id: db.organization_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

// ==================== Transfer categories ====================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = transfer_categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbTransferCategory {
    pub id: Uuid,
    pub transfer_id: String,
    pub category_id: Uuid,
    pub description: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = transfer_categories)]
pub struct NewTransferCategory<'a> {
    pub id: Uuid,
    pub transfer_id: &'a str,
    pub category_id: Uuid,
    pub description: Option<&'a str>,
}

impl From<DbTransferCategory> for TransferCategory {
    fn from(db: DbTransferCategory) -> Self {
        Self {
            id: db.id,
            transfer_id: db.transfer_id,
            category_id: db.category_id,
            description: db.description,
        }
    }
}
