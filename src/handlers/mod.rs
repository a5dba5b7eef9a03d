pub mod billing;
pub mod bills;
pub mod brands;
pub mod categories;
pub mod employees;
pub mod inventory;
pub mod price_types;
pub mod products;
pub mod purchase_orders;
pub mod shops;
pub mod suppliers;
pub mod uploads;

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
