use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    database::Database,
    error::{ApiResponse, ApiResult, AppError},
    middleware::{shop_admin, CurrentUser},
    models::{Supplier, SupplierInput},
};

#[derive(Debug, Deserialize)]
pub struct SupplierQuery {
    pub search: Option<String>,
}

pub async fn list_suppliers(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Query(query): Query<SupplierQuery>,
) -> ApiResult<Vec<Supplier>> {
    shop_admin(&db, shop_id, &user).await?;

    let pattern = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s));

    let suppliers = sqlx::query_as::<_, Supplier>(
        r#"
        SELECT * FROM suppliers
        WHERE shop_id = $1
          AND ($2::text IS NULL OR name ILIKE $2 OR contact_person ILIKE $2 OR phone ILIKE $2)
        ORDER BY name
        "#,
    )
    .bind(shop_id)
    .bind(pattern)
    .fetch_all(&db)
    .await?;

    Ok(ApiResponse::ok(suppliers))
}

pub async fn get_supplier(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, supplier_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Supplier> {
    shop_admin(&db, shop_id, &user).await?;

    let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = $1 AND shop_id = $2")
        .bind(supplier_id)
        .bind(shop_id)
        .fetch_optional(&db)
        .await?
        .ok_or_else(|| AppError::not_found("Supplier"))?;

    Ok(ApiResponse::ok(supplier))
}

pub async fn create_supplier(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Json(input): Json<SupplierInput>,
) -> ApiResult<Supplier> {
    shop_admin(&db, shop_id, &user).await?;
    if input.name.trim().is_empty() {
        return Err(AppError::validation("Supplier name is required"));
    }

    let supplier = sqlx::query_as::<_, Supplier>(
        r#"
        INSERT INTO suppliers (shop_id, name, contact_person, phone, email, address, gstin, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(shop_id)
    .bind(input.name.trim())
    .bind(&input.contact_person)
    .bind(&input.phone)
    .bind(&input.email)
    .bind(&input.address)
    .bind(&input.gstin)
    .bind(&input.notes)
    .fetch_one(&db)
    .await?;

    Ok(ApiResponse::ok(supplier))
}

pub async fn update_supplier(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, supplier_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<SupplierInput>,
) -> ApiResult<Supplier> {
    shop_admin(&db, shop_id, &user).await?;
    if input.name.trim().is_empty() {
        return Err(AppError::validation("Supplier name is required"));
    }

    let supplier = sqlx::query_as::<_, Supplier>(
        r#"
        UPDATE suppliers
        SET name = $1, contact_person = $2, phone = $3, email = $4, address = $5, gstin = $6,
            notes = $7, updated_at = NOW()
        WHERE id = $8 AND shop_id = $9
        RETURNING *
        "#,
    )
    .bind(input.name.trim())
    .bind(&input.contact_person)
    .bind(&input.phone)
    .bind(&input.email)
    .bind(&input.address)
    .bind(&input.gstin)
    .bind(&input.notes)
    .bind(supplier_id)
    .bind(shop_id)
    .fetch_optional(&db)
    .await?
    .ok_or_else(|| AppError::not_found("Supplier"))?;

    Ok(ApiResponse::ok(supplier))
}

pub async fn delete_supplier(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, supplier_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Uuid> {
    shop_admin(&db, shop_id, &user).await?;

    let has_orders = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM purchase_orders WHERE supplier_id = $1)",
    )
    .bind(supplier_id)
    .fetch_one(&db)
    .await?;
    if has_orders {
        return Err(AppError::conflict(
            "This supplier has purchase orders and cannot be deleted",
        ));
    }

    let removed = sqlx::query("DELETE FROM suppliers WHERE id = $1 AND shop_id = $2")
        .bind(supplier_id)
        .bind(shop_id)
        .execute(&db)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::not_found("Supplier"));
    }

    Ok(ApiResponse::ok(supplier_id))
}
