use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    database::Database,
    error::{ApiResponse, ApiResult, AppError},
    middleware::{shop_access, shop_admin, CurrentUser},
    models::{Brand, BrandInput},
};

pub async fn list_brands(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
) -> ApiResult<Vec<Brand>> {
    shop_access(&db, shop_id, &user).await?;

    let brands = sqlx::query_as::<_, Brand>("SELECT * FROM brands WHERE shop_id = $1 ORDER BY name")
        .bind(shop_id)
        .fetch_all(&db)
        .await?;

    Ok(ApiResponse::ok(brands))
}

pub async fn create_brand(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Json(input): Json<BrandInput>,
) -> ApiResult<Brand> {
    shop_admin(&db, shop_id, &user).await?;
    if input.name.trim().is_empty() {
        return Err(AppError::validation("Brand name is required"));
    }

    let brand = sqlx::query_as::<_, Brand>(
        "INSERT INTO brands (shop_id, name, name_tamil) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(shop_id)
    .bind(input.name.trim())
    .bind(&input.name_tamil)
    .fetch_one(&db)
    .await?;

    Ok(ApiResponse::ok(brand))
}

pub async fn update_brand(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, brand_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<BrandInput>,
) -> ApiResult<Brand> {
    shop_admin(&db, shop_id, &user).await?;
    if input.name.trim().is_empty() {
        return Err(AppError::validation("Brand name is required"));
    }

    let brand = sqlx::query_as::<_, Brand>(
        r#"
        UPDATE brands SET name = $1, name_tamil = $2, updated_at = NOW()
        WHERE id = $3 AND shop_id = $4
        RETURNING *
        "#,
    )
    .bind(input.name.trim())
    .bind(&input.name_tamil)
    .bind(brand_id)
    .bind(shop_id)
    .fetch_optional(&db)
    .await?
    .ok_or_else(|| AppError::not_found("Brand"))?;

    Ok(ApiResponse::ok(brand))
}

pub async fn delete_brand(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, brand_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Uuid> {
    shop_admin(&db, shop_id, &user).await?;

    let removed = sqlx::query("DELETE FROM brands WHERE id = $1 AND shop_id = $2")
        .bind(brand_id)
        .bind(shop_id)
        .execute(&db)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::not_found("Brand"));
    }

    Ok(ApiResponse::ok(brand_id))
}
