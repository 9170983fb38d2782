use std::collections::HashSet;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use dotenv::dotenv;
use tracing::info;
use uuid::Uuid;

use crate::database::model::{
    DbCategory, DbSafe, DbTransfer, DbTransferCategory, NewCategory, NewSafe, NewTransfer,
    NewTransferCategory,
};
use crate::models::{
    model::{Category, Chain, Safe, Transfer, TransferCategory},
    schema::{categories, safes, transfer_categories, transfers},
    traits::LedgerStore,
};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

diesel::define_sql_function! {
    fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text;
}

#[derive(Debug)]
pub enum DatabaseSetupError {
    DbConnectionError(::r2d2::Error),
    DieselError(diesel::result::Error),
    DatabaseUrlNotSet,
    ErrorRunningMigrations,
}

impl std::fmt::Display for DatabaseSetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseSetupError::DbConnectionError(e) => {
                write!(f, "Database connection error: {}", e)
            }
            DatabaseSetupError::DieselError(e) => write!(f, "Diesel error: {}", e),
            DatabaseSetupError::DatabaseUrlNotSet => write!(f, "DATABASE_URL not set"),
            DatabaseSetupError::ErrorRunningMigrations => write!(f, "Error running migrations"),
        }
    }
}

impl std::error::Error for DatabaseSetupError {}

/// Raised when an admin operation collides with existing state (duplicate
/// safe or category, category still referenced). Callers downcast to map it
/// to a 409.
#[derive(Debug)]
pub struct ConflictError(pub String);

impl std::fmt::Display for ConflictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConflictError {}

#[derive(Clone)]
pub struct Database {
    pub pool: DbPool,
}

impl Database {
    pub fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(max_connections)
            .build(manager)
            .context("Failed to create database pool")?;

        Ok(Database { pool })
    }

    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL environment variable not set")?;

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Self::new(&database_url, max_connections)
    }

    pub fn run_migrations(pool: &DbPool) -> Result<(), DatabaseSetupError> {
        info!("Running database migrations");
        let mut conn = pool.get().map_err(DatabaseSetupError::DbConnectionError)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|_| DatabaseSetupError::ErrorRunningMigrations)?;
        info!("Migrations completed");
        Ok(())
    }

    pub fn health_check(&self) -> Result<()> {
        let mut conn = self
            .get_connection()
            .context("Database connection failed")?;

        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .context("Database query failed")?;

        Ok(())
    }

    pub fn get_connection(
        &self,
    ) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>> {
        self.pool.get().context("Failed to get database connection")
    }

    // ==================== Safes ====================

    /// Active safes of an organization, in creation order. Sync runs and
    /// table views both enumerate safes through this.
    pub fn safes_for_organization(&self, organization_id: Uuid) -> Result<Vec<Safe>> {
        let mut conn = self.get_connection()?;

        let rows = safes::table
            .filter(safes::organization_id.eq(organization_id))
            .filter(safes::removed.eq(false))
            .order(safes::created_at.asc())
            .select(DbSafe::as_select())
            .load::<DbSafe>(&mut conn)
            .context("Failed to load safes for organization")?;

        rows.into_iter().map(Safe::try_from).collect()
    }

    fn find_safe(
        conn: &mut PgConnection,
        address: &str,
        chain: Chain,
        organization_id: Uuid,
    ) -> Result<Option<DbSafe>> {
        safes::table
            .filter(lower(safes::address).eq(address.to_lowercase()))
            .filter(safes::chain.eq(chain.as_str()))
            .filter(safes::organization_id.eq(organization_id))
            .select(DbSafe::as_select())
            .first::<DbSafe>(conn)
            .optional()
            .context("Failed to look up safe")
    }

    /// Tracks a safe for an organization. A soft-deleted row for the same
    /// (address, chain, organization) is re-activated instead of duplicated;
    /// an active duplicate is a conflict.
    pub fn create_safe(&self, address: &str, chain: Chain, organization_id: Uuid) -> Result<Safe> {
        let mut conn = self.get_connection()?;

        if let Some(existing) = Self::find_safe(&mut conn, address, chain, organization_id)? {
            if !existing.removed {
                return Err(anyhow!(ConflictError(format!(
                    "Safe '{}' already exists for this organization on {}",
                    address,
                    chain.as_str()
                ))));
            }

            drop(conn);
            self.restore_safe(address, chain, organization_id)?;

            let mut conn = self.get_connection()?;
            let restored = Self::find_safe(&mut conn, address, chain, organization_id)?
                .ok_or_else(|| anyhow!("Failed to restore safe {}", address))?;
            return Safe::try_from(restored);
        }

        let new_safe = NewSafe {
            address,
            chain: chain.as_str(),
            organization_id,
            removed: false,
            removed_at: None,
            created_at: Utc::now(),
        };

        let inserted = diesel::insert_into(safes::table)
            .values(&new_safe)
            .returning(DbSafe::as_select())
            .get_result::<DbSafe>(&mut conn)
            .context("Failed to create safe")?;

        Safe::try_from(inserted)
    }

    /// Soft delete: `removed = true, removed_at = now`. Errors when the safe
    /// is not currently active.
    pub fn remove_safe(&self, address: &str, chain: Chain, organization_id: Uuid) -> Result<()> {
        let mut conn = self.get_connection()?;

        let updated = diesel::update(
            safes::table
                .filter(lower(safes::address).eq(address.to_lowercase()))
                .filter(safes::chain.eq(chain.as_str()))
                .filter(safes::organization_id.eq(organization_id))
                .filter(safes::removed.eq(false)),
        )
        .set((
            safes::removed.eq(true),
            safes::removed_at.eq(Some(Utc::now())),
        ))
        .execute(&mut conn)
        .context("Failed to remove safe")?;

        if updated == 0 {
            return Err(anyhow!(
                "safe {} on {} is not an active safe of this organization",
                address,
                chain.as_str()
            ));
        }

        Ok(())
    }

    /// Inverse transition of `remove_safe`.
    pub fn restore_safe(&self, address: &str, chain: Chain, organization_id: Uuid) -> Result<()> {
        let mut conn = self.get_connection()?;

        let updated = diesel::update(
            safes::table
                .filter(lower(safes::address).eq(address.to_lowercase()))
                .filter(safes::chain.eq(chain.as_str()))
                .filter(safes::organization_id.eq(organization_id))
                .filter(safes::removed.eq(true)),
        )
        .set((
            safes::removed.eq(false),
            safes::removed_at.eq(None::<chrono::DateTime<Utc>>),
        ))
        .execute(&mut conn)
        .context("Failed to restore safe")?;

        if updated == 0 {
            return Err(anyhow!(
                "safe {} on {} is not a removed safe of this organization",
                address,
                chain.as_str()
            ));
        }

        Ok(())
    }

    /// Hard delete, admin-only surface.
    pub fn delete_safe(&self, address: &str, chain: Chain, organization_id: Uuid) -> Result<()> {
        let mut conn = self.get_connection()?;

        diesel::delete(
            safes::table
                .filter(lower(safes::address).eq(address.to_lowercase()))
                .filter(safes::chain.eq(chain.as_str()))
                .filter(safes::organization_id.eq(organization_id)),
        )
        .execute(&mut conn)
        .context("Failed to delete safe")?;

        Ok(())
    }

    // ==================== Transfers ====================

    pub fn existing_transfer_ids(
        &self,
        safe_address: &str,
        chain: Chain,
    ) -> Result<HashSet<String>> {
        let mut conn = self.get_connection()?;

        let ids = transfers::table
            .filter(transfers::safe_address.eq(safe_address))
            .filter(transfers::safe_chain.eq(chain.as_str()))
            .select(transfers::transfer_id)
            .load::<String>(&mut conn)
            .context("Failed to load existing transfer ids")?;

        Ok(ids.into_iter().collect())
    }

    /// Idempotent insert keyed by `transfer_id`. Returns true when the row
    /// was written, false when it already existed; a duplicate is never an
    /// error, which also guards against concurrent sync runs racing on a
    /// stale existing-ids snapshot.
    pub fn insert_transfer_if_absent(&self, transfer: &Transfer) -> Result<bool> {
        let mut conn = self.get_connection()?;

        let new_transfer = NewTransfer::from(transfer);
        let inserted = diesel::insert_into(transfers::table)
            .values(&new_transfer)
            .on_conflict(transfers::transfer_id)
            .do_nothing()
            .execute(&mut conn)
            .context("Failed to insert transfer")?;

        Ok(inserted > 0)
    }

    pub fn transfers_for_safe(&self, safe_address: &str) -> Result<Vec<Transfer>> {
        let mut conn = self.get_connection()?;

        let rows = transfers::table
            .filter(transfers::safe_address.eq(safe_address))
            .order(transfers::execution_date.desc())
            .select(DbTransfer::as_select())
            .load::<DbTransfer>(&mut conn)
            .context("Failed to load transfers for safe")?;

        rows.into_iter().map(Transfer::try_from).collect()
    }

    /// All stored transfers, newest first, optionally narrowed to rows where
    /// the given address appears on either side (case-insensitive).
    pub fn list_transfers(&self, address: Option<&str>) -> Result<Vec<Transfer>> {
        let mut conn = self.get_connection()?;

        let mut query = transfers::table.into_boxed();

        if let Some(address) = address {
            let lowered = address.to_lowercase();
            query = query.filter(
                lower(transfers::from_address)
                    .eq(lowered.clone())
                    .or(lower(transfers::to_address).eq(lowered)),
            );
        }

        let rows = query
            .order(transfers::execution_date.desc())
            .select(DbTransfer::as_select())
            .load::<DbTransfer>(&mut conn)
            .context("Failed to list transfers")?;

        rows.into_iter().map(Transfer::try_from).collect()
    }

    // ==================== Categories ====================

    pub fn categories_for_organization(&self, organization_id: Uuid) -> Result<Vec<Category>> {
        let mut conn = self.get_connection()?;

        let rows = categories::table
            .filter(categories::organization_id.eq(organization_id))
            .order(categories::name.asc())
            .select(DbCategory::as_select())
            .load::<DbCategory>(&mut conn)
            .context("Failed to load categories")?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Category names are unique per organization, case-insensitively.
    pub fn create_category(&self, name: &str, organization_id: Uuid) -> Result<Category> {
        let mut conn = self.get_connection()?;

        let existing: Option<DbCategory> = categories::table
            .filter(lower(categories::name).eq(name.to_lowercase()))
            .filter(categories::organization_id.eq(organization_id))
            .select(DbCategory::as_select())
            .first::<DbCategory>(&mut conn)
            .optional()
            .context("Failed to look up category")?;

        if existing.is_some() {
            return Err(anyhow!(ConflictError(format!(
                "Category '{}' already exists for this organization",
                name
            ))));
        }

        let now = Utc::now();
        let new_category = NewCategory {
            id: Uuid::new_v4(),
            name,
            organization_id,
            created_at: now,
            updated_at: now,
        };

        let inserted = diesel::insert_into(categories::table)
            .values(&new_category)
            .returning(DbCategory::as_select())
            .get_result::<DbCategory>(&mut conn)
            .context("Failed to create category")?;

        Ok(Category::from(inserted))
    }

    /// Refused while any transfer still references the category.
    pub fn delete_category(&self, category_id: Uuid) -> Result<()> {
        let mut conn = self.get_connection()?;

        let references: i64 = transfer_categories::table
            .filter(transfer_categories::category_id.eq(category_id))
            .count()
            .get_result(&mut conn)
            .context("Failed to count category references")?;

        if references > 0 {
            return Err(anyhow!(ConflictError(format!(
                "Category is still assigned to {} transfer(s)",
                references
            ))));
        }

        let deleted = diesel::delete(categories::table.filter(categories::id.eq(category_id)))
            .execute(&mut conn)
            .context("Failed to delete category")?;

        if deleted == 0 {
            return Err(anyhow!("category {} not found", category_id));
        }

        Ok(())
    }

    // ==================== Transfer annotations ====================

    /// Replaces the annotation of a transfer. Delete-then-insert inside one
    /// transaction keeps at most one mapping row per transfer; a null
    /// category clears the annotation.
    pub fn set_transfer_category(
        &self,
        transfer_id: &str,
        category_id: Option<Uuid>,
        description: Option<&str>,
    ) -> Result<()> {
        let mut conn = self.get_connection()?;

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            diesel::delete(
                transfer_categories::table
                    .filter(transfer_categories::transfer_id.eq(transfer_id)),
            )
            .execute(conn)
            .context("Failed to clear transfer category")?;

            if let Some(category_id) = category_id {
                let mapping = NewTransferCategory {
                    id: Uuid::new_v4(),
                    transfer_id,
                    category_id,
                    description,
                };

                diesel::insert_into(transfer_categories::table)
                    .values(&mapping)
                    .execute(conn)
                    .context("Failed to set transfer category")?;
            }

            Ok(())
        })?;

        Ok(())
    }

    pub fn transfer_categories_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<TransferCategory>> {
        let mut conn = self.get_connection()?;

        let rows = transfer_categories::table
            .inner_join(categories::table)
            .filter(categories::organization_id.eq(organization_id))
            .select(DbTransferCategory::as_select())
            .load::<DbTransferCategory>(&mut conn)
            .context("Failed to load transfer categories")?;

        Ok(rows.into_iter().map(TransferCategory::from).collect())
    }
}

impl LedgerStore for Database {
    fn safes_for_organization(&self, organization_id: Uuid) -> Result<Vec<Safe>> {
        Database::safes_for_organization(self, organization_id)
    }

    fn existing_transfer_ids(&self, safe_address: &str, chain: Chain) -> Result<HashSet<String>> {
        Database::existing_transfer_ids(self, safe_address, chain)
    }

    fn insert_transfer_if_absent(&self, transfer: &Transfer) -> Result<bool> {
        Database::insert_transfer_if_absent(self, transfer)
    }
}
