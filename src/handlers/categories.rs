use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    database::Database,
    error::{ApiResponse, ApiResult, AppError},
    middleware::{shop_access, shop_admin, CurrentUser},
    models::{
        catalog::{build_category_tree, creates_cycle},
        Category, CategoryInput, CategoryNode,
    },
};

async fn shop_categories(db: &Database, shop_id: Uuid) -> Result<Vec<Category>, AppError> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT * FROM categories WHERE shop_id = $1 ORDER BY sort_order, name",
    )
    .bind(shop_id)
    .fetch_all(db)
    .await?;
    Ok(categories)
}

fn check_parent(categories: &[Category], parent_id: Option<Uuid>) -> Result<(), AppError> {
    match parent_id {
        Some(parent) if !categories.iter().any(|c| c.id == parent) => {
            Err(AppError::validation("Parent category does not belong to this shop"))
        }
        _ => Ok(()),
    }
}

pub async fn list_categories(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
) -> ApiResult<Vec<CategoryNode>> {
    shop_access(&db, shop_id, &user).await?;
    let categories = shop_categories(&db, shop_id).await?;
    Ok(ApiResponse::ok(build_category_tree(categories)))
}

pub async fn create_category(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Json(input): Json<CategoryInput>,
) -> ApiResult<Category> {
    shop_admin(&db, shop_id, &user).await?;
    if input.name.trim().is_empty() {
        return Err(AppError::validation("Category name is required"));
    }
    check_parent(&shop_categories(&db, shop_id).await?, input.parent_id)?;

    let category = sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (shop_id, parent_id, name, name_tamil, sort_order)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(shop_id)
    .bind(input.parent_id)
    .bind(input.name.trim())
    .bind(&input.name_tamil)
    .bind(input.sort_order.unwrap_or(0))
    .fetch_one(&db)
    .await?;

    Ok(ApiResponse::ok(category))
}

pub async fn update_category(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, category_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<CategoryInput>,
) -> ApiResult<Category> {
    shop_admin(&db, shop_id, &user).await?;
    if input.name.trim().is_empty() {
        return Err(AppError::validation("Category name is required"));
    }

    let categories = shop_categories(&db, shop_id).await?;
    if !categories.iter().any(|c| c.id == category_id) {
        return Err(AppError::not_found("Category"));
    }
    check_parent(&categories, input.parent_id)?;
    if creates_cycle(&categories, category_id, input.parent_id) {
        return Err(AppError::validation(
            "A category cannot be moved under itself or one of its subcategories",
        ));
    }

    let category = sqlx::query_as::<_, Category>(
        r#"
        UPDATE categories
        SET parent_id = $1, name = $2, name_tamil = $3, sort_order = COALESCE($4, sort_order), updated_at = NOW()
        WHERE id = $5 AND shop_id = $6
        RETURNING *
        "#,
    )
    .bind(input.parent_id)
    .bind(input.name.trim())
    .bind(&input.name_tamil)
    .bind(input.sort_order)
    .bind(category_id)
    .bind(shop_id)
    .fetch_one(&db)
    .await?;

    Ok(ApiResponse::ok(category))
}

/// Subcategories and products of a deleted category are detached, not removed.
pub async fn delete_category(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, category_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Uuid> {
    shop_admin(&db, shop_id, &user).await?;

    let removed = sqlx::query("DELETE FROM categories WHERE id = $1 AND shop_id = $2")
        .bind(category_id)
        .bind(shop_id)
        .execute(&db)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::not_found("Category"));
    }

    Ok(ApiResponse::ok(category_id))
}
