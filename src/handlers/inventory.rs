use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::{
    database::Database,
    error::{ApiResponse, ApiResult, AppError},
    middleware::{shop_admin, CurrentUser},
    models::{
        stock::{check_movement_quantity, MAX_STOCK},
        AdjustmentRequest, InventoryOverview, InventorySummary, StockChange, StockFilter,
        StockLimit, StockMovement, StockMovementDisplay, StockMovementType, StockReferenceType,
        StockRow, StockStatus,
    },
    utils::format_quantity,
};

/// A signed change to one product's stock and the ledger entry explaining it.
#[derive(Debug, Clone)]
pub(crate) struct StockEntry {
    pub product_id: Uuid,
    pub movement_type: StockMovementType,
    pub quantity: Decimal,
    pub reference_type: StockReferenceType,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(FromRow)]
struct LockedStock {
    name: String,
    unit: String,
    track_inventory: bool,
    stock_quantity: Decimal,
}

/// Applies `entry` to a product under a row lock and records the movement.
///
/// Returns `None` for products that do not track inventory; their stock is
/// left at zero. Fails with a conflict when stock would go negative, and with
/// a validation error for fractional count units or out-of-range stock.
pub(crate) async fn apply_stock_movement(
    conn: &mut PgConnection,
    shop_id: Uuid,
    user_id: Uuid,
    entry: StockEntry,
) -> Result<Option<StockMovement>, AppError> {
    let locked = sqlx::query_as::<_, LockedStock>(
        r#"
        SELECT name, unit, track_inventory, stock_quantity
        FROM products
        WHERE id = $1 AND shop_id = $2
        FOR UPDATE
        "#,
    )
    .bind(entry.product_id)
    .bind(shop_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Product"))?;

    if !locked.track_inventory {
        return Ok(None);
    }

    check_movement_quantity(&locked.name, &locked.unit, entry.quantity).map_err(AppError::Validation)?;
    let change = match StockChange::checked_apply(locked.stock_quantity, entry.quantity) {
        Ok(change) => change,
        Err(StockLimit::BelowZero) => {
            return Err(AppError::conflict(format!(
                "Insufficient stock for {}: {} {} available",
                locked.name,
                format_quantity(locked.stock_quantity),
                locked.unit
            )))
        }
        Err(StockLimit::AboveMax) => {
            return Err(AppError::validation(format!(
                "Stock of {} cannot exceed {} {}",
                locked.name, MAX_STOCK, locked.unit
            )))
        }
    };

    sqlx::query("UPDATE products SET stock_quantity = $1, updated_at = NOW() WHERE id = $2")
        .bind(change.after)
        .bind(entry.product_id)
        .execute(&mut *conn)
        .await?;

    let movement = sqlx::query_as::<_, StockMovement>(
        r#"
        INSERT INTO stock_movements
            (shop_id, product_id, type, quantity, quantity_before, quantity_after,
             reference_type, reference_id, notes, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(shop_id)
    .bind(entry.product_id)
    .bind(entry.movement_type)
    .bind(change.quantity)
    .bind(change.before)
    .bind(change.after)
    .bind(entry.reference_type)
    .bind(entry.reference_id)
    .bind(&entry.notes)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Some(movement))
}

#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    #[serde(default)]
    pub filter: StockFilter,
    pub search: Option<String>,
}

#[derive(FromRow)]
struct TrackedProduct {
    id: Uuid,
    name: String,
    sku: Option<String>,
    unit: String,
    stock_quantity: Decimal,
    low_stock_threshold: Decimal,
    cost_price: Decimal,
}

impl From<TrackedProduct> for StockRow {
    fn from(p: TrackedProduct) -> Self {
        StockRow {
            product_id: p.id,
            status: StockStatus::classify(p.stock_quantity, p.low_stock_threshold),
            stock_value: p.stock_quantity.max(Decimal::ZERO) * p.cost_price,
            name: p.name,
            sku: p.sku,
            unit: p.unit,
            stock_quantity: p.stock_quantity,
            low_stock_threshold: p.low_stock_threshold,
            cost_price: p.cost_price,
        }
    }
}

/// Stock levels of active, tracked products. The summary always covers the
/// whole shop; `filter` and `search` only narrow the product list.
pub async fn inventory_overview(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Query(query): Query<InventoryQuery>,
) -> ApiResult<InventoryOverview> {
    shop_admin(&db, shop_id, &user).await?;

    let rows: Vec<StockRow> = sqlx::query_as::<_, TrackedProduct>(
        r#"
        SELECT id, name, sku, unit, stock_quantity, low_stock_threshold, cost_price
        FROM products
        WHERE shop_id = $1 AND track_inventory AND is_active
        ORDER BY name
        "#,
    )
    .bind(shop_id)
    .fetch_all(&db)
    .await?
    .into_iter()
    .map(StockRow::from)
    .collect();

    let summary = InventorySummary::from_rows(&rows);

    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let products = rows
        .into_iter()
        .filter(|row| query.filter.matches(row.status))
        .filter(|row| match &needle {
            Some(needle) => {
                row.name.to_lowercase().contains(needle)
                    || row.sku.as_deref().is_some_and(|s| s.to_lowercase().contains(needle))
            }
            None => true,
        })
        .collect();

    Ok(ApiResponse::ok(InventoryOverview { summary, products }))
}

pub async fn adjust_stock(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Json(input): Json<AdjustmentRequest>,
) -> ApiResult<StockMovement> {
    shop_admin(&db, shop_id, &user).await?;

    if !matches!(input.movement_type, StockMovementType::Adjustment | StockMovementType::Return) {
        return Err(AppError::validation("Manual changes must be adjustments or returns"));
    }
    if input.quantity.is_zero() {
        return Err(AppError::validation("Quantity cannot be zero"));
    }

    let mut tx = db.begin().await?;
    let entry = StockEntry {
        product_id: input.product_id,
        movement_type: input.movement_type,
        quantity: input.quantity,
        reference_type: StockReferenceType::Adjustment,
        reference_id: None,
        notes: input.notes.filter(|n| !n.trim().is_empty()),
    };
    let movement = apply_stock_movement(&mut tx, shop_id, user.id, entry)
        .await?
        .ok_or_else(|| AppError::validation("Inventory tracking is off for this product"))?;
    tx.commit().await?;

    log::info!(
        "stock of {} in shop {} changed by {}",
        movement.product_id,
        shop_id,
        movement.quantity
    );
    Ok(ApiResponse::ok(movement))
}

#[derive(Debug, Deserialize)]
pub struct MovementQuery {
    pub product_id: Option<Uuid>,
    pub limit: Option<i64>,
}

pub async fn list_movements(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Query(query): Query<MovementQuery>,
) -> ApiResult<Vec<StockMovementDisplay>> {
    shop_admin(&db, shop_id, &user).await?;

    let movements = sqlx::query_as::<_, StockMovementDisplay>(
        r#"
        SELECT m.*, p.name AS product_name, p.unit, pr.full_name AS created_by_name
        FROM stock_movements m
        JOIN products p ON p.id = m.product_id
        LEFT JOIN profiles pr ON pr.id = m.created_by
        WHERE m.shop_id = $1 AND ($2::uuid IS NULL OR m.product_id = $2)
        ORDER BY m.created_at DESC
        LIMIT $3
        "#,
    )
    .bind(shop_id)
    .bind(query.product_id)
    .bind(query.limit.unwrap_or(100).clamp(1, 500))
    .fetch_all(&db)
    .await?;

    Ok(ApiResponse::ok(movements))
}
