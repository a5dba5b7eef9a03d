use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::Multipart;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    config::Config,
    database::Database,
    error::{ApiResponse, ApiResult, AppError},
    handlers::uploads::{read_image, save_image},
    middleware::{shop_access, shop_admin, CurrentUser},
    models::{
        bill::{start_of_local_day, start_of_local_month},
        AccessibleShop, Bill, DashboardStats, LowStockProduct, Profile, Shop, ShopDashboard, ShopInput,
        UserDashboard, UserRole,
    },
};

/// Makes sure the caller has a `profiles` row; bills, orders and shops point at it.
pub(crate) async fn ensure_profile(db: &Database, user: &CurrentUser) -> Result<(), AppError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM profiles WHERE id = $1)")
        .bind(user.id)
        .fetch_one(db)
        .await?;
    if exists {
        return Ok(());
    }

    let email = user
        .email
        .as_deref()
        .ok_or_else(|| AppError::validation("Your account has no email address"))?;
    sqlx::query("INSERT INTO profiles (id, email) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
        .bind(user.id)
        .bind(email)
        .execute(db)
        .await?;
    log::info!("created profile for {}", user.id);
    Ok(())
}

/// Activates invitations sent to the caller's email.
async fn claim_invitations(db: &Database, user: &CurrentUser) -> Result<u64, AppError> {
    let Some(email) = user.email.as_deref() else {
        return Ok(0);
    };

    let claimed = sqlx::query(
        r#"
        UPDATE shop_employees
        SET user_id = $1, status = 'active', updated_at = NOW()
        WHERE invited_email = $2 AND status = 'pending'
        "#,
    )
    .bind(user.id)
    .bind(email)
    .execute(db)
    .await?
    .rows_affected();

    if claimed > 0 {
        log::info!("user {} joined {} shop(s) from invitations", user.id, claimed);
    }
    Ok(claimed)
}

#[derive(FromRow)]
struct EmployeeShopRow {
    #[sqlx(flatten)]
    shop: Shop,
    role: UserRole,
}

/// Owned shops and shops the caller works at, in that order.
async fn accessible_shops(
    db: &Database,
    user: &CurrentUser,
) -> Result<(Vec<AccessibleShop>, Vec<AccessibleShop>), AppError> {
    ensure_profile(db, user).await?;
    claim_invitations(db, user).await?;

    let owned = sqlx::query_as::<_, Shop>("SELECT * FROM shops WHERE owner_id = $1 ORDER BY name")
        .bind(user.id)
        .fetch_all(db)
        .await?
        .into_iter()
        .map(|shop| AccessibleShop {
            shop,
            role: UserRole::Admin,
            is_owner: true,
        })
        .collect();

    let employed = sqlx::query_as::<_, EmployeeShopRow>(
        r#"
        SELECT s.*, e.role
        FROM shops s
        JOIN shop_employees e ON e.shop_id = s.id
        WHERE e.user_id = $1 AND e.status = 'active' AND s.owner_id <> $1
        ORDER BY s.name
        "#,
    )
    .bind(user.id)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(|row| AccessibleShop {
        shop: row.shop,
        role: row.role,
        is_owner: false,
    })
    .collect();

    Ok((owned, employed))
}

pub async fn user_dashboard(user: CurrentUser, State(db): State<Database>) -> ApiResult<UserDashboard> {
    let (owned_shops, employee_shops) = accessible_shops(&db, &user).await?;
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(user.id)
        .fetch_one(&db)
        .await?;

    Ok(ApiResponse::ok(UserDashboard {
        email: profile.email,
        owned_shops,
        employee_shops,
    }))
}

pub async fn list_shops(user: CurrentUser, State(db): State<Database>) -> ApiResult<Vec<AccessibleShop>> {
    let (mut shops, employed) = accessible_shops(&db, &user).await?;
    shops.extend(employed);
    Ok(ApiResponse::ok(shops))
}

fn validate_shop(input: &ShopInput) -> Result<(), AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::validation("Shop name is required"));
    }
    Ok(())
}

pub async fn create_shop(
    user: CurrentUser,
    State(db): State<Database>,
    Json(input): Json<ShopInput>,
) -> ApiResult<Shop> {
    validate_shop(&input)?;
    ensure_profile(&db, &user).await?;

    let mut tx = db.begin().await?;

    let shop = sqlx::query_as::<_, Shop>(
        r#"
        INSERT INTO shops (owner_id, name, name_tamil, address, phone, email, gstin)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(input.name.trim())
    .bind(&input.name_tamil)
    .bind(&input.address)
    .bind(&input.phone)
    .bind(&input.email)
    .bind(&input.gstin)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO price_types (shop_id, name, description, is_default) VALUES ($1, 'Retail', 'Default retail price', TRUE)",
    )
    .bind(shop.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    log::info!("shop {} created by {}", shop.id, user.id);
    Ok(ApiResponse::ok(shop))
}

pub async fn get_shop(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
) -> ApiResult<AccessibleShop> {
    let access = shop_access(&db, shop_id, &user).await?;
    let shop = sqlx::query_as::<_, Shop>("SELECT * FROM shops WHERE id = $1")
        .bind(shop_id)
        .fetch_one(&db)
        .await?;

    Ok(ApiResponse::ok(AccessibleShop {
        shop,
        role: access.role,
        is_owner: access.is_owner,
    }))
}

pub async fn update_shop(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Json(input): Json<ShopInput>,
) -> ApiResult<Shop> {
    shop_admin(&db, shop_id, &user).await?;
    validate_shop(&input)?;

    let shop = sqlx::query_as::<_, Shop>(
        r#"
        UPDATE shops
        SET name = $1, name_tamil = $2, address = $3, phone = $4, email = $5, gstin = $6, updated_at = NOW()
        WHERE id = $7
        RETURNING *
        "#,
    )
    .bind(input.name.trim())
    .bind(&input.name_tamil)
    .bind(&input.address)
    .bind(&input.phone)
    .bind(&input.email)
    .bind(&input.gstin)
    .bind(shop_id)
    .fetch_one(&db)
    .await?;

    Ok(ApiResponse::ok(shop))
}

pub async fn upload_logo(
    user: CurrentUser,
    State(db): State<Database>,
    State(config): State<Arc<Config>>,
    Path(shop_id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Shop> {
    shop_admin(&db, shop_id, &user).await?;

    let upload = read_image(multipart, "logo").await?;
    let url = save_image(&config.upload_dir, "logos", upload).await?;

    let shop = sqlx::query_as::<_, Shop>(
        "UPDATE shops SET logo_url = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(&url)
    .bind(shop_id)
    .fetch_one(&db)
    .await?;

    Ok(ApiResponse::ok(shop))
}

/// Sales total and bill count from `since` onwards.
async fn sales_since(db: &Database, shop_id: Uuid, since: DateTime<Utc>) -> Result<(Decimal, i64), AppError> {
    let row = sqlx::query_as::<_, (Decimal, i64)>(
        "SELECT COALESCE(SUM(total), 0), COUNT(*) FROM bills WHERE shop_id = $1 AND created_at >= $2",
    )
    .bind(shop_id)
    .bind(since)
    .fetch_one(db)
    .await?;
    Ok(row)
}

pub async fn shop_dashboard(
    user: CurrentUser,
    State(db): State<Database>,
    State(config): State<Arc<Config>>,
    Path(shop_id): Path<Uuid>,
) -> ApiResult<ShopDashboard> {
    shop_access(&db, shop_id, &user).await?;

    let now = Utc::now();
    let offset = config.shop_offset();
    let (today_sales, today_bill_count) = sales_since(&db, shop_id, start_of_local_day(now, offset)).await?;
    let (month_sales, month_bill_count) = sales_since(&db, shop_id, start_of_local_month(now, offset)).await?;

    let low_stock_count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM products
        WHERE shop_id = $1 AND is_active AND track_inventory AND stock_quantity <= low_stock_threshold
        "#,
    )
    .bind(shop_id)
    .fetch_one(&db)
    .await?;

    let total_products = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE shop_id = $1")
        .bind(shop_id)
        .fetch_one(&db)
        .await?;

    let low_stock_products = sqlx::query_as::<_, LowStockProduct>(
        r#"
        SELECT id, name, unit, stock_quantity, low_stock_threshold
        FROM products
        WHERE shop_id = $1 AND is_active AND track_inventory AND stock_quantity <= low_stock_threshold
        ORDER BY stock_quantity ASC, name
        LIMIT 5
        "#,
    )
    .bind(shop_id)
    .fetch_all(&db)
    .await?;

    let recent_bills = sqlx::query_as::<_, Bill>(
        "SELECT * FROM bills WHERE shop_id = $1 ORDER BY created_at DESC LIMIT 5",
    )
    .bind(shop_id)
    .fetch_all(&db)
    .await?;

    Ok(ApiResponse::ok(ShopDashboard {
        stats: DashboardStats {
            today_sales,
            today_bill_count,
            month_sales,
            month_bill_count,
            low_stock_count,
            total_products,
        },
        low_stock_products,
        recent_bills,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str) -> ShopInput {
        ShopInput {
            name: name.to_string(),
            name_tamil: None,
            address: None,
            phone: None,
            email: None,
            gstin: None,
        }
    }

    #[test]
    fn shop_needs_a_name() {
        assert!(validate_shop(&input("Anbu Traders")).is_ok());
        assert!(matches!(validate_shop(&input("   ")), Err(AppError::Validation(_))));
    }
}
