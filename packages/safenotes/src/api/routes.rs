use std::collections::HashMap;

use actix_web::{HttpResponse, Responder, delete, get, post, put, web};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::error;
use uuid::Uuid;

use crate::{
    AppState,
    api::model::{
        CreateCategoryRequest, CreateSafeRequest, MessageResponse, OrganizationQuery,
        SafeActionRequest, SyncRequest, SyncResponse, TableQuery, TransfersQuery,
        UpdateTransferCategoryRequest,
    },
    database::database::ConflictError,
    models::model::{Chain, SelectedSafe},
    sync::orchestrator::{SyncCancellation, SyncError},
    view::{csv::transfers_to_csv, table::transfers_to_table_rows},
};

fn is_hex_address(address: &str) -> bool {
    address.starts_with("0x") && address.len() == 42 && hex::decode(&address[2..]).is_ok()
}

/// Maps store failures onto responses; admin-state collisions become 409s.
fn store_error(context: &str, e: anyhow::Error) -> HttpResponse {
    if let Some(conflict) = e.downcast_ref::<ConflictError>() {
        return HttpResponse::Conflict().json(MessageResponse {
            success: false,
            message: conflict.to_string(),
            error: None,
        });
    }

    error!("{}: {}", context, e);
    HttpResponse::InternalServerError().json(MessageResponse {
        success: false,
        message: context.to_string(),
        error: Some(e.to_string()),
    })
}

// ============================================================================
// SYNC
// ============================================================================

#[post("/organizations/{organization_id}/sync")]
pub async fn sync_organization(
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: Option<web::Json<SyncRequest>>,
) -> impl Responder {
    let organization_id = path.into_inner();
    let transfer_limit = body
        .and_then(|b| b.transfer_limit)
        .unwrap_or(app_state.config.safe_api.transfer_limit);

    let (events, mut receiver) = mpsc::unbounded_channel();
    let cancel = SyncCancellation::new();

    let result = app_state
        .sync_service
        .sync_organization(organization_id, transfer_limit, &events, &cancel)
        .await;
    drop(events);

    // The channel is unbounded, so the full event history is still buffered;
    // the last event per safe is its terminal (or stuck-pending) status.
    let mut statuses = HashMap::new();
    while let Ok(event) = receiver.try_recv() {
        statuses.insert(event.safe_id, event.status);
    }

    match result {
        Ok(report) => HttpResponse::Ok().json(SyncResponse {
            success: true,
            statuses: report.statuses,
            written: report.written,
            skipped: report.skipped,
            error: None,
        }),
        Err(e @ SyncError::Validation(_)) => HttpResponse::BadRequest().json(SyncResponse {
            success: false,
            statuses,
            written: 0,
            skipped: 0,
            error: Some(e.to_string()),
        }),
        Err(e) => {
            error!("Sync failed for organization {}: {}", organization_id, e);
            HttpResponse::InternalServerError().json(SyncResponse {
                success: false,
                statuses,
                written: 0,
                skipped: 0,
                error: Some(e.to_string()),
            })
        }
    }
}

// ============================================================================
// TRANSFERS
// ============================================================================

#[get("/organizations/{organization_id}/transfers")]
pub async fn list_org_transfers(
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<TableQuery>,
) -> impl Responder {
    let organization_id = path.into_inner();

    let selected_safe = match (&query.safe_address, query.chain) {
        (Some(address), Some(chain)) => Some(SelectedSafe {
            address: address.clone(),
            chain,
        }),
        _ => None,
    };

    let transfers = match app_state
        .database
        .list_transfers(query.safe_address.as_deref())
    {
        Ok(transfers) => transfers,
        Err(e) => return store_error("Failed to load transfers", e),
    };

    let safes = match app_state.database.safes_for_organization(organization_id) {
        Ok(safes) => safes,
        Err(e) => return store_error("Failed to load safes", e),
    };

    let rows = transfers_to_table_rows(&transfers, selected_safe.as_ref(), &safes);
    HttpResponse::Ok().json(rows)
}

#[get("/organizations/{organization_id}/transfers/export")]
pub async fn export_transfers_csv(
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<TableQuery>,
) -> impl Responder {
    let organization_id = path.into_inner();

    let selected_safe = match (&query.safe_address, query.chain) {
        (Some(address), Some(chain)) => Some(SelectedSafe {
            address: address.clone(),
            chain,
        }),
        _ => None,
    };

    let transfers = match app_state
        .database
        .list_transfers(query.safe_address.as_deref())
    {
        Ok(transfers) => transfers,
        Err(e) => return store_error("Failed to load transfers", e),
    };

    let safes = match app_state.database.safes_for_organization(organization_id) {
        Ok(safes) => safes,
        Err(e) => return store_error("Failed to load safes", e),
    };

    let categories = match app_state
        .database
        .categories_for_organization(organization_id)
    {
        Ok(categories) => categories,
        Err(e) => return store_error("Failed to load categories", e),
    };

    let mappings = match app_state
        .database
        .transfer_categories_for_organization(organization_id)
    {
        Ok(mappings) => mappings,
        Err(e) => return store_error("Failed to load transfer categories", e),
    };

    let rows = transfers_to_table_rows(&transfers, selected_safe.as_ref(), &safes);

    match transfers_to_csv(&rows, &mappings, &categories) {
        Ok(csv) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .body(csv),
        Err(e) => store_error("Failed to render CSV", e),
    }
}

#[get("/transfers")]
pub async fn list_transfers(
    app_state: web::Data<AppState>,
    query: web::Query<TransfersQuery>,
) -> impl Responder {
    match app_state
        .database
        .list_transfers(query.safe_address.as_deref())
    {
        Ok(transfers) => HttpResponse::Ok().json(transfers),
        Err(e) => store_error("Failed to load transfers", e),
    }
}

#[get("/safes/{chain}/{address}/transfers")]
pub async fn list_safe_transfers(
    app_state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (chain, address) = path.into_inner();
    if let Err(e) = Chain::from_str(&chain) {
        return HttpResponse::BadRequest().json(MessageResponse {
            success: false,
            message: "Invalid chain".to_string(),
            error: Some(e.to_string()),
        });
    }

    match app_state.database.transfers_for_safe(&address) {
        Ok(transfers) => HttpResponse::Ok().json(transfers),
        Err(e) => store_error("Failed to load transfers", e),
    }
}

#[put("/transfers/{transfer_id}/category")]
pub async fn update_transfer_category(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateTransferCategoryRequest>,
) -> impl Responder {
    let transfer_id = path.into_inner();

    match app_state.database.set_transfer_category(
        &transfer_id,
        body.category_id,
        body.description.as_deref(),
    ) {
        Ok(()) => HttpResponse::Ok().json(MessageResponse {
            success: true,
            message: "Transfer category updated".to_string(),
            error: None,
        }),
        Err(e) => store_error("Failed to update transfer category", e),
    }
}

// ============================================================================
// SAFES
// ============================================================================

#[get("/organizations/{organization_id}/safes")]
pub async fn list_safes(
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    match app_state
        .database
        .safes_for_organization(path.into_inner())
    {
        Ok(safes) => HttpResponse::Ok().json(safes),
        Err(e) => store_error("Failed to load safes", e),
    }
}

#[post("/safes")]
pub async fn create_safe(
    app_state: web::Data<AppState>,
    body: web::Json<CreateSafeRequest>,
) -> impl Responder {
    if !is_hex_address(&body.address) {
        return HttpResponse::BadRequest().json(MessageResponse {
            success: false,
            message: "Invalid safe address".to_string(),
            error: Some("address must be a 20-byte hex string (0x...)".to_string()),
        });
    }

    match app_state
        .database
        .create_safe(&body.address, body.chain, body.organization_id)
    {
        Ok(safe) => HttpResponse::Ok().json(safe),
        Err(e) => store_error("Failed to create safe", e),
    }
}

#[post("/safes/remove")]
pub async fn remove_safe(
    app_state: web::Data<AppState>,
    body: web::Json<SafeActionRequest>,
) -> impl Responder {
    match app_state
        .database
        .remove_safe(&body.address, body.chain, body.organization_id)
    {
        Ok(()) => HttpResponse::Ok().json(MessageResponse {
            success: true,
            message: "Safe removed successfully".to_string(),
            error: None,
        }),
        Err(e) => store_error("Failed to remove safe", e),
    }
}

#[post("/safes/restore")]
pub async fn restore_safe(
    app_state: web::Data<AppState>,
    body: web::Json<SafeActionRequest>,
) -> impl Responder {
    match app_state
        .database
        .restore_safe(&body.address, body.chain, body.organization_id)
    {
        Ok(()) => HttpResponse::Ok().json(MessageResponse {
            success: true,
            message: "Safe restored successfully".to_string(),
            error: None,
        }),
        Err(e) => store_error("Failed to restore safe", e),
    }
}

/// Hard delete, admin-only surface.
#[delete("/safes/{chain}/{address}")]
pub async fn delete_safe(
    app_state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    query: web::Query<OrganizationQuery>,
) -> impl Responder {
    let (chain, address) = path.into_inner();
    let chain = match Chain::from_str(&chain) {
        Ok(chain) => chain,
        Err(e) => {
            return HttpResponse::BadRequest().json(MessageResponse {
                success: false,
                message: "Invalid chain".to_string(),
                error: Some(e.to_string()),
            });
        }
    };

    match app_state
        .database
        .delete_safe(&address, chain, query.organization_id)
    {
        Ok(()) => HttpResponse::Ok().json(MessageResponse {
            success: true,
            message: "Safe deleted".to_string(),
            error: None,
        }),
        Err(e) => store_error("Failed to delete safe", e),
    }
}

#[get("/safes/{chain}/{address}/balances")]
pub async fn get_safe_balances(
    app_state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (chain, address) = path.into_inner();
    let chain = match Chain::from_str(&chain) {
        Ok(chain) => chain,
        Err(e) => {
            return HttpResponse::BadRequest().json(MessageResponse {
                success: false,
                message: "Invalid chain".to_string(),
                error: Some(e.to_string()),
            });
        }
    };

    match app_state
        .transfer_client
        .fetch_balances(&address, chain)
        .await
    {
        Ok(balances) => HttpResponse::Ok().json(balances),
        Err(e) => {
            error!("Balance fetch failed: {}", e);
            HttpResponse::BadGateway().json(MessageResponse {
                success: false,
                message: "Failed to fetch balances".to_string(),
                error: Some(e.to_string()),
            })
        }
    }
}

// ============================================================================
// CATEGORIES
// ============================================================================

#[get("/organizations/{organization_id}/categories")]
pub async fn list_categories(
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    match app_state
        .database
        .categories_for_organization(path.into_inner())
    {
        Ok(categories) => HttpResponse::Ok().json(categories),
        Err(e) => store_error("Failed to load categories", e),
    }
}

#[post("/categories")]
pub async fn create_category(
    app_state: web::Data<AppState>,
    body: web::Json<CreateCategoryRequest>,
) -> impl Responder {
    if body.name.trim().is_empty() {
        return HttpResponse::BadRequest().json(MessageResponse {
            success: false,
            message: "Category name must not be empty".to_string(),
            error: None,
        });
    }

    match app_state
        .database
        .create_category(body.name.trim(), body.organization_id)
    {
        Ok(category) => HttpResponse::Ok().json(category),
        Err(e) => store_error("Failed to create category", e),
    }
}

#[delete("/categories/{id}")]
pub async fn delete_category(
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    match app_state.database.delete_category(path.into_inner()) {
        Ok(()) => HttpResponse::Ok().json(MessageResponse {
            success: true,
            message: "Category deleted".to_string(),
            error: None,
        }),
        Err(e) => store_error("Failed to delete category", e),
    }
}

// ============================================================================
// SERVICE
// ============================================================================

#[get("/health")]
pub async fn health_check(app_state: web::Data<AppState>) -> impl Responder {
    match app_state.database.health_check() {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": "safenotes",
        })),
        Err(e) => {
            error!("Health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }))
        }
    }
}

#[get("/")]
pub async fn root() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "service": "safenotes",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
