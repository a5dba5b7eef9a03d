mod billing;
mod config;
mod database;
mod error;
mod filters;
mod handlers;
mod middleware;
mod models;
mod receipt;
mod state;
mod utils;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use config::Config;
use database::create_database_pool;
use handlers::uploads::UPLOAD_URL_PREFIX;
use state::AppState;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run().await {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let db = create_database_pool(&config.database_url, config.database_max_connections).await?;

    let addr = format!("0.0.0.0:{}", config.port);
    let app = create_router(AppState {
        db,
        config: Arc::new(config),
    });

    log::info!("Kanaku360 listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn shop_routes() -> Router<AppState> {
    use handlers::{
        bills, brands, categories, employees, inventory, price_types, products, purchase_orders,
        shops, suppliers,
    };

    Router::new()
        .route("/", get(shops::get_shop).put(shops::update_shop))
        .route("/logo", post(shops::upload_logo))
        .route("/dashboard", get(shops::shop_dashboard))
        // Employees
        .route(
            "/employees",
            get(employees::list_employees).post(employees::invite_employee),
        )
        .route(
            "/employees/:employee_id",
            put(employees::update_employee_role).delete(employees::remove_employee),
        )
        // Catalog
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:category_id",
            put(categories::update_category).delete(categories::delete_category),
        )
        .route("/brands", get(brands::list_brands).post(brands::create_brand))
        .route(
            "/brands/:brand_id",
            put(brands::update_brand).delete(brands::delete_brand),
        )
        .route(
            "/price-types",
            get(price_types::list_price_types).post(price_types::create_price_type),
        )
        .route(
            "/price-types/:type_id",
            put(price_types::update_price_type).delete(price_types::delete_price_type),
        )
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/:product_id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/products/:product_id/toggle-active", post(products::toggle_product_active))
        .route("/products/:product_id/image", post(products::upload_product_image))
        // Billing
        .route("/billing/quote", post(handlers::billing::quote))
        .route("/billing/checkout", post(handlers::billing::checkout))
        .route("/bills", get(bills::list_bills))
        .route("/bills/:bill_id", get(bills::get_bill))
        .route("/bills/:bill_id/receipt", get(bills::receipt_text))
        .route("/bills/:bill_id/receipt.escpos", get(bills::receipt_escpos))
        // Inventory
        .route("/inventory", get(inventory::inventory_overview))
        .route("/inventory/adjustments", post(inventory::adjust_stock))
        .route("/inventory/movements", get(inventory::list_movements))
        // Purchasing
        .route(
            "/suppliers",
            get(suppliers::list_suppliers).post(suppliers::create_supplier),
        )
        .route(
            "/suppliers/:supplier_id",
            get(suppliers::get_supplier)
                .put(suppliers::update_supplier)
                .delete(suppliers::delete_supplier),
        )
        .route(
            "/purchase-orders",
            get(purchase_orders::list_purchase_orders).post(purchase_orders::create_purchase_order),
        )
        .route(
            "/purchase-orders/:order_id",
            get(purchase_orders::get_purchase_order).delete(purchase_orders::delete_purchase_order),
        )
        .route(
            "/purchase-orders/:order_id/status",
            put(purchase_orders::update_purchase_order_status),
        )
        .route(
            "/purchase-orders/:order_id/receive",
            post(purchase_orders::receive_purchase_order),
        )
}

fn create_router(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/me", get(handlers::shops::user_dashboard))
        .route("/shops", get(handlers::shops::list_shops).post(handlers::shops::create_shop))
        .nest("/shops/:shop_id", shop_routes())
        // Uploaded images
        .nest_service(UPLOAD_URL_PREFIX, uploads)
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(10 * 1024 * 1024)), // 10MB
        )
        .with_state(state)
}
