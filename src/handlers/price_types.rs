use axum::{
    extract::{Path, State},
    Json,
};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    database::Database,
    error::{ApiResponse, ApiResult, AppError},
    middleware::{shop_access, shop_admin, CurrentUser},
    models::{PriceType, PriceTypeInput},
};

/// Clears the default flag on every other price type of the shop.
async fn unset_other_defaults(conn: &mut PgConnection, shop_id: Uuid, keep: Uuid) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE price_types SET is_default = FALSE, updated_at = NOW() WHERE shop_id = $1 AND id <> $2 AND is_default",
    )
    .bind(shop_id)
    .bind(keep)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_price_types(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
) -> ApiResult<Vec<PriceType>> {
    shop_access(&db, shop_id, &user).await?;

    let types = sqlx::query_as::<_, PriceType>(
        "SELECT * FROM price_types WHERE shop_id = $1 ORDER BY is_default DESC, name",
    )
    .bind(shop_id)
    .fetch_all(&db)
    .await?;

    Ok(ApiResponse::ok(types))
}

pub async fn create_price_type(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Json(input): Json<PriceTypeInput>,
) -> ApiResult<PriceType> {
    shop_admin(&db, shop_id, &user).await?;
    if input.name.trim().is_empty() {
        return Err(AppError::validation("Price type name is required"));
    }

    let mut tx = db.begin().await?;
    let price_type = sqlx::query_as::<_, PriceType>(
        r#"
        INSERT INTO price_types (shop_id, name, description, is_default)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(shop_id)
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.is_default)
    .fetch_one(&mut *tx)
    .await?;

    if price_type.is_default {
        unset_other_defaults(&mut tx, shop_id, price_type.id).await?;
    }
    tx.commit().await?;

    Ok(ApiResponse::ok(price_type))
}

/// Saving with `is_default` moves the default here. The flag cannot be
/// cleared directly, so a shop never loses its default type.
pub async fn update_price_type(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, type_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<PriceTypeInput>,
) -> ApiResult<PriceType> {
    shop_admin(&db, shop_id, &user).await?;
    if input.name.trim().is_empty() {
        return Err(AppError::validation("Price type name is required"));
    }

    let mut tx = db.begin().await?;
    let price_type = sqlx::query_as::<_, PriceType>(
        r#"
        UPDATE price_types
        SET name = $1, description = $2, is_default = is_default OR $3, updated_at = NOW()
        WHERE id = $4 AND shop_id = $5
        RETURNING *
        "#,
    )
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.is_default)
    .bind(type_id)
    .bind(shop_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Price type"))?;

    if input.is_default {
        unset_other_defaults(&mut tx, shop_id, price_type.id).await?;
    }
    tx.commit().await?;

    Ok(ApiResponse::ok(price_type))
}

pub async fn delete_price_type(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, type_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Uuid> {
    shop_admin(&db, shop_id, &user).await?;

    let is_default = sqlx::query_scalar::<_, bool>(
        "SELECT is_default FROM price_types WHERE id = $1 AND shop_id = $2",
    )
    .bind(type_id)
    .bind(shop_id)
    .fetch_optional(&db)
    .await?
    .ok_or_else(|| AppError::not_found("Price type"))?;
    if is_default {
        return Err(AppError::conflict("The default price type cannot be deleted"));
    }

    sqlx::query("DELETE FROM price_types WHERE id = $1 AND shop_id = $2")
        .bind(type_id)
        .bind(shop_id)
        .execute(&db)
        .await?;

    Ok(ApiResponse::ok(type_id))
}
