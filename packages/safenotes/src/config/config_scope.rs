use actix_web::web;

use crate::api::routes::{
    create_category, create_safe, delete_category, delete_safe, export_transfers_csv,
    get_safe_balances, health_check, list_categories, list_org_transfers, list_safe_transfers,
    list_safes, list_transfers, remove_safe, restore_safe, root, sync_organization,
    update_transfer_category,
};

pub fn configure(conf: &mut web::ServiceConfig) {
    let scope = web::scope("/api/v1")
        .service(sync_organization)
        .service(list_org_transfers)
        .service(export_transfers_csv)
        .service(list_transfers)
        .service(list_safe_transfers)
        .service(update_transfer_category)
        .service(list_safes)
        .service(create_safe)
        .service(remove_safe)
        .service(restore_safe)
        .service(delete_safe)
        .service(get_safe_balances)
        .service(list_categories)
        .service(create_category)
        .service(delete_category)
        .service(health_check)
        .service(root);

    conf.service(scope);
}
