use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    config::Config,
    database::{next_document_number, Database, DocumentKind},
    error::{ApiResponse, ApiResult, AppError},
    handlers::inventory::{apply_stock_movement, StockEntry},
    middleware::{shop_admin, CurrentUser},
    models::{
        purchase::{check_order_line, plan_receipt, status_after_receipt, OrderableProduct},
        PurchaseOrder, PurchaseOrderDetail, PurchaseOrderInput, PurchaseOrderItem,
        PurchaseOrderItemDisplay, PurchaseOrderStatus, PurchaseOrderSummary, ReceiveRequest,
        StatusUpdate, StockMovementType, StockReferenceType, Supplier,
    },
};

#[derive(Debug, Deserialize)]
pub struct PurchaseOrderQuery {
    pub status: Option<PurchaseOrderStatus>,
    pub search: Option<String>,
}

fn status_name(status: PurchaseOrderStatus) -> String {
    format!("{:?}", status).to_lowercase()
}

pub async fn list_purchase_orders(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Query(query): Query<PurchaseOrderQuery>,
) -> ApiResult<Vec<PurchaseOrderSummary>> {
    shop_admin(&db, shop_id, &user).await?;

    let pattern = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s));

    let orders = sqlx::query_as::<_, PurchaseOrderSummary>(
        r#"
        SELECT po.*, s.name AS supplier_name,
               (SELECT COUNT(*) FROM purchase_order_items i WHERE i.purchase_order_id = po.id) AS item_count
        FROM purchase_orders po
        JOIN suppliers s ON s.id = po.supplier_id
        WHERE po.shop_id = $1
          AND ($2::purchase_order_status IS NULL OR po.status = $2)
          AND ($3::text IS NULL OR po.po_number ILIKE $3 OR s.name ILIKE $3)
        ORDER BY po.created_at DESC
        "#,
    )
    .bind(shop_id)
    .bind(query.status)
    .bind(pattern)
    .fetch_all(&db)
    .await?;

    Ok(ApiResponse::ok(orders))
}

async fn load_detail(conn: &mut PgConnection, shop_id: Uuid, order_id: Uuid) -> Result<PurchaseOrderDetail, AppError> {
    let order = sqlx::query_as::<_, PurchaseOrder>(
        "SELECT * FROM purchase_orders WHERE id = $1 AND shop_id = $2",
    )
    .bind(order_id)
    .bind(shop_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Purchase order"))?;

    let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = $1")
        .bind(order.supplier_id)
        .fetch_one(&mut *conn)
        .await?;

    let items = sqlx::query_as::<_, PurchaseOrderItemDisplay>(
        r#"
        SELECT i.*, p.name AS product_name, p.unit
        FROM purchase_order_items i
        JOIN products p ON p.id = i.product_id
        WHERE i.purchase_order_id = $1
        ORDER BY i.created_at, p.name
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(PurchaseOrderDetail { order, supplier, items })
}

pub async fn get_purchase_order(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, order_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<PurchaseOrderDetail> {
    shop_admin(&db, shop_id, &user).await?;
    let mut conn = db.acquire().await?;
    Ok(ApiResponse::ok(load_detail(&mut conn, shop_id, order_id).await?))
}

pub async fn create_purchase_order(
    user: CurrentUser,
    State(db): State<Database>,
    State(config): State<Arc<Config>>,
    Path(shop_id): Path<Uuid>,
    Json(input): Json<PurchaseOrderInput>,
) -> ApiResult<PurchaseOrderDetail> {
    shop_admin(&db, shop_id, &user).await?;

    if input.items.is_empty() {
        return Err(AppError::validation("Add at least one item"));
    }

    let supplier_known = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM suppliers WHERE id = $1 AND shop_id = $2)",
    )
    .bind(input.supplier_id)
    .bind(shop_id)
    .fetch_one(&db)
    .await?;
    if !supplier_known {
        return Err(AppError::validation("Supplier does not belong to this shop"));
    }

    let ids: Vec<Uuid> = input.items.iter().map(|line| line.product_id).collect();
    let products = sqlx::query_as::<_, OrderableProduct>(
        "SELECT id, name, unit, track_inventory, cost_price FROM products WHERE shop_id = $1 AND id = ANY($2)",
    )
    .bind(shop_id)
    .bind(&ids)
    .fetch_all(&db)
    .await?;

    let mut lines = Vec::with_capacity(input.items.len());
    for line in &input.items {
        let product = products
            .iter()
            .find(|p| p.id == line.product_id)
            .ok_or_else(|| AppError::not_found("Product"))?;
        let unit_cost = line.unit_cost.unwrap_or(product.cost_price);
        check_order_line(product, line.quantity, unit_cost).map_err(AppError::Validation)?;
        lines.push((line.product_id, line.quantity, unit_cost, line.quantity * unit_cost));
    }
    let subtotal: Decimal = lines.iter().map(|(_, _, _, total)| *total).sum();
    let order_date = input
        .order_date
        .unwrap_or_else(|| Utc::now().with_timezone(&config.shop_offset()).date_naive());

    let mut tx = db.begin().await?;
    let po_number = next_document_number(&mut tx, shop_id, DocumentKind::PurchaseOrder).await?;

    let order_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO purchase_orders
            (shop_id, supplier_id, po_number, status, order_date, expected_date,
             subtotal, tax_amount, total_amount, notes, created_by)
        VALUES ($1, $2, $3, 'draft', $4, $5, $6, 0, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(shop_id)
    .bind(input.supplier_id)
    .bind(&po_number)
    .bind(order_date)
    .bind(input.expected_date)
    .bind(subtotal)
    .bind(&input.notes)
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;

    for (product_id, quantity, unit_cost, total) in &lines {
        sqlx::query(
            r#"
            INSERT INTO purchase_order_items (purchase_order_id, product_id, quantity_ordered, unit_cost, total)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order_id)
        .bind(product_id)
        .bind(quantity)
        .bind(unit_cost)
        .bind(total)
        .execute(&mut *tx)
        .await?;
    }

    let detail = load_detail(&mut tx, shop_id, order_id).await?;
    tx.commit().await?;

    log::info!("purchase order {} created in shop {}", po_number, shop_id);
    Ok(ApiResponse::ok(detail))
}

async fn lock_order(conn: &mut PgConnection, shop_id: Uuid, order_id: Uuid) -> Result<PurchaseOrder, AppError> {
    sqlx::query_as::<_, PurchaseOrder>(
        "SELECT * FROM purchase_orders WHERE id = $1 AND shop_id = $2 FOR UPDATE",
    )
    .bind(order_id)
    .bind(shop_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::not_found("Purchase order"))
}

pub async fn update_purchase_order_status(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, order_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<StatusUpdate>,
) -> ApiResult<PurchaseOrder> {
    shop_admin(&db, shop_id, &user).await?;

    let mut tx = db.begin().await?;
    let order = lock_order(&mut tx, shop_id, order_id).await?;
    if !order.status.can_transition_to(input.status) {
        return Err(AppError::conflict(format!(
            "A {} order cannot be marked {}",
            status_name(order.status),
            status_name(input.status)
        )));
    }

    let order = sqlx::query_as::<_, PurchaseOrder>(
        "UPDATE purchase_orders SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(input.status)
    .bind(order_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    log::info!("purchase order {} is now {}", order.po_number, status_name(order.status));
    Ok(ApiResponse::ok(order))
}

/// Books goods in against an order, fully or in part.
pub async fn receive_purchase_order(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, order_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<ReceiveRequest>,
) -> ApiResult<PurchaseOrderDetail> {
    shop_admin(&db, shop_id, &user).await?;

    let mut tx = db.begin().await?;
    let order = lock_order(&mut tx, shop_id, order_id).await?;
    if !order.status.can_receive() {
        return Err(AppError::conflict(format!(
            "A {} order cannot be received",
            status_name(order.status)
        )));
    }

    let items = sqlx::query_as::<_, PurchaseOrderItem>(
        "SELECT * FROM purchase_order_items WHERE purchase_order_id = $1 FOR UPDATE",
    )
    .bind(order_id)
    .fetch_all(&mut *tx)
    .await?;

    let receipt = plan_receipt(&items, &input.quantities).map_err(AppError::Validation)?;
    let notes = input
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| format!("{}: {}", order.po_number, n))
        .unwrap_or_else(|| order.po_number.clone());

    for line in &receipt {
        sqlx::query(
            "UPDATE purchase_order_items SET quantity_received = quantity_received + $1 WHERE id = $2",
        )
        .bind(line.quantity)
        .bind(line.item_id)
        .execute(&mut *tx)
        .await?;

        let entry = StockEntry {
            product_id: line.product_id,
            movement_type: StockMovementType::Purchase,
            quantity: line.quantity,
            reference_type: StockReferenceType::PurchaseOrder,
            reference_id: Some(order_id),
            notes: Some(notes.clone()),
        };
        // Untracked products book no stock; refuse rather than mark them received.
        if apply_stock_movement(&mut tx, shop_id, user.id, entry).await?.is_none() {
            return Err(AppError::validation(
                "A product on this order no longer tracks inventory and cannot be received",
            ));
        }
    }

    let status = status_after_receipt(&items, &receipt);
    sqlx::query(
        r#"
        UPDATE purchase_orders
        SET status = $1,
            received_date = CASE WHEN $1 = 'received'::purchase_order_status THEN NOW() ELSE received_date END,
            updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(status)
    .bind(order_id)
    .execute(&mut *tx)
    .await?;

    let detail = load_detail(&mut tx, shop_id, order_id).await?;
    tx.commit().await?;

    log::info!(
        "received {} line(s) on {}; order is {}",
        receipt.len(),
        order.po_number,
        status_name(status)
    );
    Ok(ApiResponse::ok(detail))
}

pub async fn delete_purchase_order(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, order_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Uuid> {
    shop_admin(&db, shop_id, &user).await?;

    let mut tx = db.begin().await?;
    let order = lock_order(&mut tx, shop_id, order_id).await?;
    if !order.status.can_delete() {
        return Err(AppError::conflict(format!(
            "A {} order cannot be deleted",
            status_name(order.status)
        )));
    }

    sqlx::query("DELETE FROM purchase_orders WHERE id = $1")
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(ApiResponse::ok(order_id))
}
