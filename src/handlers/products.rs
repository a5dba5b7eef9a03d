use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::Multipart;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    config::Config,
    database::Database,
    error::{ApiResponse, ApiResult, AppError},
    handlers::{
        inventory::{apply_stock_movement, StockEntry},
        uploads::{read_image, save_image},
    },
    middleware::{shop_access, shop_admin, CurrentUser},
    models::{
        dashboard::page_window, Paginated, Product, ProductInput, ProductPrice, ProductWithPrices,
        StockMovementType, StockReferenceType,
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub active: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

fn push_product_filters(builder: &mut QueryBuilder<'_, Postgres>, shop_id: Uuid, query: &ProductQuery) {
    builder.push(" WHERE shop_id = ").push_bind(shop_id);

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR name_tamil ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR sku ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR barcode ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category_id) = query.category_id {
        builder.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(brand_id) = query.brand_id {
        builder.push(" AND brand_id = ").push_bind(brand_id);
    }
    if let Some(active) = query.active {
        builder.push(" AND is_active = ").push_bind(active);
    }
}

async fn prices_for(db: &Database, product_ids: &[Uuid]) -> Result<Vec<ProductPrice>, AppError> {
    let prices = sqlx::query_as::<_, ProductPrice>(
        "SELECT * FROM product_prices WHERE product_id = ANY($1)",
    )
    .bind(product_ids)
    .fetch_all(db)
    .await?;
    Ok(prices)
}

fn attach_prices(products: Vec<Product>, prices: Vec<ProductPrice>) -> Vec<ProductWithPrices> {
    products
        .into_iter()
        .map(|product| {
            let prices = prices
                .iter()
                .filter(|p| p.product_id == product.id)
                .cloned()
                .collect();
            ProductWithPrices { product, prices }
        })
        .collect()
}

pub async fn list_products(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Paginated<ProductWithPrices>> {
    shop_access(&db, shop_id, &user).await?;
    let (page, page_size, offset) = page_window(query.page, query.page_size);

    let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM products");
    push_product_filters(&mut count_query, shop_id, &query);
    let count = count_query.build_query_scalar::<i64>().fetch_one(&db).await?;

    let mut list_query = QueryBuilder::new("SELECT * FROM products");
    push_product_filters(&mut list_query, shop_id, &query);
    list_query
        .push(" ORDER BY name LIMIT ")
        .push_bind(page_size)
        .push(" OFFSET ")
        .push_bind(offset);
    let products = list_query.build_query_as::<Product>().fetch_all(&db).await?;

    let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
    let prices = prices_for(&db, &ids).await?;

    Ok(ApiResponse::ok(Paginated::new(
        attach_prices(products, prices),
        count,
        page,
        page_size,
    )))
}

async fn load_product(db: &Database, shop_id: Uuid, product_id: Uuid) -> Result<ProductWithPrices, AppError> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND shop_id = $2")
        .bind(product_id)
        .bind(shop_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    let prices = prices_for(db, &[product.id]).await?;
    Ok(ProductWithPrices { product, prices })
}

pub async fn get_product(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, product_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<ProductWithPrices> {
    shop_access(&db, shop_id, &user).await?;
    Ok(ApiResponse::ok(load_product(&db, shop_id, product_id).await?))
}

/// Category, brand and price types referenced by `input` must all belong to the shop.
async fn check_references(db: &Database, shop_id: Uuid, input: &ProductInput) -> Result<(), AppError> {
    if let Some(category_id) = input.category_id {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1 AND shop_id = $2)",
        )
        .bind(category_id)
        .bind(shop_id)
        .fetch_one(db)
        .await?;
        if !found {
            return Err(AppError::validation("Category does not belong to this shop"));
        }
    }
    if let Some(brand_id) = input.brand_id {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM brands WHERE id = $1 AND shop_id = $2)",
        )
        .bind(brand_id)
        .bind(shop_id)
        .fetch_one(db)
        .await?;
        if !found {
            return Err(AppError::validation("Brand does not belong to this shop"));
        }
    }

    let type_ids: HashSet<Uuid> = input.prices.iter().map(|p| p.price_type_id).collect();
    if type_ids.len() != input.prices.len() {
        return Err(AppError::validation("Each price type can only have one price"));
    }
    if !type_ids.is_empty() {
        let ids: Vec<Uuid> = type_ids.iter().copied().collect();
        let known = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM price_types WHERE shop_id = $1 AND id = ANY($2)",
        )
        .bind(shop_id)
        .bind(&ids)
        .fetch_one(db)
        .await?;
        if known != ids.len() as i64 {
            return Err(AppError::validation("Price type does not belong to this shop"));
        }
    }
    Ok(())
}

/// Replaces every per-price-type price of a product.
async fn replace_prices(conn: &mut PgConnection, product_id: Uuid, input: &ProductInput) -> Result<(), AppError> {
    sqlx::query("DELETE FROM product_prices WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    for price in &input.prices {
        sqlx::query(
            "INSERT INTO product_prices (product_id, price_type_id, selling_price) VALUES ($1, $2, $3)",
        )
        .bind(product_id)
        .bind(price.price_type_id)
        .bind(price.selling_price)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub async fn create_product(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Json(input): Json<ProductInput>,
) -> ApiResult<ProductWithPrices> {
    shop_admin(&db, shop_id, &user).await?;
    let (opening_stock, threshold) = input.validated_stock().map_err(AppError::Validation)?;
    check_references(&db, shop_id, &input).await?;

    let mut tx = db.begin().await?;

    let product_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO products
            (shop_id, category_id, brand_id, sku, barcode, name, name_tamil, description,
             mrp, cost_price, default_selling_price, gst_percent, hsn_code, unit,
             track_inventory, stock_quantity, low_stock_threshold, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 0, $16, $17)
        RETURNING id
        "#,
    )
    .bind(shop_id)
    .bind(input.category_id)
    .bind(input.brand_id)
    .bind(trimmed(&input.sku))
    .bind(trimmed(&input.barcode))
    .bind(input.name.trim())
    .bind(trimmed(&input.name_tamil))
    .bind(trimmed(&input.description))
    .bind(input.mrp)
    .bind(input.cost_price)
    .bind(input.default_selling_price)
    .bind(input.gst_percent)
    .bind(trimmed(&input.hsn_code))
    .bind(input.unit_or_default())
    .bind(input.track_inventory)
    .bind(threshold)
    .bind(input.is_active.unwrap_or(true))
    .fetch_one(&mut *tx)
    .await?;

    replace_prices(&mut tx, product_id, &input).await?;

    if opening_stock > Decimal::ZERO {
        let entry = StockEntry {
            product_id,
            movement_type: StockMovementType::Adjustment,
            quantity: opening_stock,
            reference_type: StockReferenceType::Adjustment,
            reference_id: None,
            notes: Some("Opening stock".to_string()),
        };
        apply_stock_movement(&mut tx, shop_id, user.id, entry).await?;
    }

    tx.commit().await?;

    log::info!("product {} created in shop {}", product_id, shop_id);
    Ok(ApiResponse::ok(load_product(&db, shop_id, product_id).await?))
}

/// Saves a product. A changed stock level on a tracked product is booked as
/// an adjustment; turning tracking off zeroes the stock.
pub async fn update_product(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, product_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<ProductInput>,
) -> ApiResult<ProductWithPrices> {
    shop_admin(&db, shop_id, &user).await?;
    let (stock, threshold) = input.validated_stock().map_err(AppError::Validation)?;
    check_references(&db, shop_id, &input).await?;

    let mut tx = db.begin().await?;

    let current_stock = sqlx::query_scalar::<_, Decimal>(
        "SELECT stock_quantity FROM products WHERE id = $1 AND shop_id = $2 FOR UPDATE",
    )
    .bind(product_id)
    .bind(shop_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Product"))?;

    sqlx::query(
        r#"
        UPDATE products
        SET category_id = $1, brand_id = $2, sku = $3, barcode = $4, name = $5, name_tamil = $6,
            description = $7, mrp = $8, cost_price = $9, default_selling_price = $10,
            gst_percent = $11, hsn_code = $12, unit = $13, track_inventory = $14,
            low_stock_threshold = $15, is_active = COALESCE($16, is_active),
            stock_quantity = CASE WHEN $14 THEN stock_quantity ELSE 0 END,
            updated_at = NOW()
        WHERE id = $17
        "#,
    )
    .bind(input.category_id)
    .bind(input.brand_id)
    .bind(trimmed(&input.sku))
    .bind(trimmed(&input.barcode))
    .bind(input.name.trim())
    .bind(trimmed(&input.name_tamil))
    .bind(trimmed(&input.description))
    .bind(input.mrp)
    .bind(input.cost_price)
    .bind(input.default_selling_price)
    .bind(input.gst_percent)
    .bind(trimmed(&input.hsn_code))
    .bind(input.unit_or_default())
    .bind(input.track_inventory)
    .bind(threshold)
    .bind(input.is_active)
    .bind(product_id)
    .execute(&mut *tx)
    .await?;

    replace_prices(&mut tx, product_id, &input).await?;

    let before = if input.track_inventory { current_stock } else { Decimal::ZERO };
    if input.track_inventory && stock != before {
        let entry = StockEntry {
            product_id,
            movement_type: StockMovementType::Adjustment,
            quantity: stock - before,
            reference_type: StockReferenceType::Adjustment,
            reference_id: None,
            notes: Some("Stock corrected on product edit".to_string()),
        };
        apply_stock_movement(&mut tx, shop_id, user.id, entry).await?;
    }

    tx.commit().await?;

    Ok(ApiResponse::ok(load_product(&db, shop_id, product_id).await?))
}

pub async fn toggle_product_active(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, product_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Product> {
    shop_admin(&db, shop_id, &user).await?;

    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products SET is_active = NOT is_active, updated_at = NOW()
        WHERE id = $1 AND shop_id = $2
        RETURNING *
        "#,
    )
    .bind(product_id)
    .bind(shop_id)
    .fetch_optional(&db)
    .await?
    .ok_or_else(|| AppError::not_found("Product"))?;

    Ok(ApiResponse::ok(product))
}

pub async fn delete_product(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, product_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Uuid> {
    shop_admin(&db, shop_id, &user).await?;

    let removed = sqlx::query("DELETE FROM products WHERE id = $1 AND shop_id = $2")
        .bind(product_id)
        .bind(shop_id)
        .execute(&db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::conflict(
                "This product is on purchase orders; deactivate it instead",
            ),
            other => other,
        })?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::not_found("Product"));
    }

    log::info!("product {} deleted from shop {}", product_id, shop_id);
    Ok(ApiResponse::ok(product_id))
}

pub async fn upload_product_image(
    user: CurrentUser,
    State(db): State<Database>,
    State(config): State<Arc<Config>>,
    Path((shop_id, product_id)): Path<(Uuid, Uuid)>,
    multipart: Multipart,
) -> ApiResult<Product> {
    shop_admin(&db, shop_id, &user).await?;

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND shop_id = $2)",
    )
    .bind(product_id)
    .bind(shop_id)
    .fetch_one(&db)
    .await?;
    if !exists {
        return Err(AppError::not_found("Product"));
    }

    let upload = read_image(multipart, "image").await?;
    let url = save_image(&config.upload_dir, "products", upload).await?;

    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET image_url = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(&url)
    .bind(product_id)
    .fetch_one(&db)
    .await?;

    Ok(ApiResponse::ok(product))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::fixtures::product;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn prices_attach_to_their_products() {
        let tea = product("Tea", dec!(100), dec!(5));
        let salt = product("Salt", dec!(20), dec!(0));
        let now = Utc::now();
        let price = ProductPrice {
            id: Uuid::new_v4(),
            product_id: tea.id,
            price_type_id: Uuid::new_v4(),
            selling_price: dec!(95),
            created_at: now,
            updated_at: now,
        };

        let listed = attach_prices(vec![tea, salt], vec![price]);
        assert_eq!(listed[0].prices.len(), 1);
        assert!(listed[1].prices.is_empty());
    }

    #[test]
    fn filters_bind_search_and_ids() {
        let query = ProductQuery {
            search: Some(" tea ".to_string()),
            category_id: Some(Uuid::new_v4()),
            active: Some(true),
            ..ProductQuery::default()
        };
        let mut builder = QueryBuilder::new("SELECT * FROM products");
        push_product_filters(&mut builder, Uuid::new_v4(), &query);

        assert_eq!(
            builder.sql(),
            "SELECT * FROM products WHERE shop_id = $1 AND (name ILIKE $2 OR name_tamil ILIKE $3 \
             OR sku ILIKE $4 OR barcode ILIKE $5) AND category_id = $6 AND is_active = $7"
        );
    }
}
