use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    billing::{BillLine, BillTotals, Cart, CartError},
    database::{next_document_number, Database, DocumentKind},
    error::{ApiResponse, ApiResult, AppError},
    handlers::inventory::{apply_stock_movement, StockEntry},
    middleware::{shop_access, CurrentUser},
    models::{
        catalog::resolve_unit_price, Bill, BillItem, BillWithItems, CheckoutRequest, PaymentStatus,
        Product, ProductPrice, StockMovementType, StockReferenceType,
    },
};

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Prices the requested lines against the catalogue and fills a cart.
async fn load_cart(conn: &mut PgConnection, shop_id: Uuid, request: &CheckoutRequest) -> Result<Cart, AppError> {
    if request.items.is_empty() {
        return Err(CartError::Empty.into());
    }

    if let Some(price_type_id) = request.price_type_id {
        let known = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM price_types WHERE id = $1 AND shop_id = $2)",
        )
        .bind(price_type_id)
        .bind(shop_id)
        .fetch_one(&mut *conn)
        .await?;
        if !known {
            return Err(AppError::validation("Price type does not belong to this shop"));
        }
    }
    let default_type = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM price_types WHERE shop_id = $1 AND is_default LIMIT 1",
    )
    .bind(shop_id)
    .fetch_optional(&mut *conn)
    .await?;

    let ids: Vec<Uuid> = request.items.iter().map(|line| line.product_id).collect();
    let products = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE shop_id = $1 AND id = ANY($2)")
        .bind(shop_id)
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;
    let prices = sqlx::query_as::<_, ProductPrice>("SELECT * FROM product_prices WHERE product_id = ANY($1)")
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

    let mut cart = Cart {
        price_type_id: request.price_type_id,
        customer_name: non_empty(&request.customer_name),
        customer_phone: non_empty(&request.customer_phone),
        customer_address: non_empty(&request.customer_address),
        payment_method: request.payment_method,
        notes: non_empty(&request.notes),
        ..Cart::default()
    };
    cart.set_discount_percent(request.discount_percent);

    for line in &request.items {
        let product = products
            .iter()
            .find(|p| p.id == line.product_id)
            .ok_or_else(|| AppError::not_found("Product"))?;
        if !product.is_active {
            return Err(AppError::validation(format!("{} is no longer sold", product.name)));
        }
        let unit_price = line
            .unit_price
            .unwrap_or_else(|| resolve_unit_price(product, &prices, request.price_type_id, default_type));
        cart.add_item(product.clone(), line.quantity, unit_price)?;
    }

    Ok(cart)
}

#[derive(Debug, Serialize)]
pub struct CheckoutQuote {
    pub totals: BillTotals,
    pub lines: Vec<BillLine>,
}

/// Totals for a prospective bill; nothing is written.
pub async fn quote(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<CheckoutQuote> {
    shop_access(&db, shop_id, &user).await?;

    let mut conn = db.acquire().await?;
    let cart = load_cart(&mut conn, shop_id, &request).await?;

    Ok(ApiResponse::ok(CheckoutQuote {
        totals: cart.totals(),
        lines: cart.bill_lines()?,
    }))
}

/// Turns a cart into a paid bill.
///
/// Numbering, the bill, its lines and the stock decrements of tracked
/// products commit together; running short on any tracked product aborts the
/// whole sale.
pub async fn checkout(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<BillWithItems> {
    shop_access(&db, shop_id, &user).await?;

    let mut tx = db.begin().await?;

    let cart = load_cart(&mut tx, shop_id, &request).await?;
    let lines = cart.bill_lines()?;
    let totals = cart.totals();
    let bill_number = next_document_number(&mut tx, shop_id, DocumentKind::Bill).await?;

    let bill = sqlx::query_as::<_, Bill>(
        r#"
        INSERT INTO bills
            (shop_id, bill_number, customer_name, customer_phone, customer_address, price_type_id,
             subtotal, discount_amount, discount_percent, taxable_amount, gst_amount, total,
             payment_method, payment_status, notes, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING *
        "#,
    )
    .bind(shop_id)
    .bind(&bill_number)
    .bind(&cart.customer_name)
    .bind(&cart.customer_phone)
    .bind(&cart.customer_address)
    .bind(cart.price_type_id)
    .bind(totals.subtotal)
    .bind(totals.discount_amount)
    .bind(totals.discount_percent)
    .bind(totals.taxable_amount)
    .bind(totals.gst_amount)
    .bind(totals.total)
    .bind(cart.payment_method)
    .bind(PaymentStatus::Paid)
    .bind(&cart.notes)
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for (position, line) in lines.iter().enumerate() {
        let item = sqlx::query_as::<_, BillItem>(
            r#"
            INSERT INTO bill_items
                (bill_id, product_id, product_name, product_name_tamil, sku, hsn_code, quantity, unit,
                 unit_price, discount_amount, taxable_amount, gst_percent, gst_amount, total, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(bill.id)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(&line.product_name_tamil)
        .bind(&line.sku)
        .bind(&line.hsn_code)
        .bind(line.quantity)
        .bind(&line.unit)
        .bind(line.unit_price)
        .bind(line.discount_amount)
        .bind(line.taxable_amount)
        .bind(line.gst_percent)
        .bind(line.gst_amount)
        .bind(line.total)
        .bind(position as i32)
        .fetch_one(&mut *tx)
        .await?;
        items.push(item);

        if line.track_inventory {
            let entry = StockEntry {
                product_id: line.product_id,
                movement_type: StockMovementType::Sale,
                quantity: -line.quantity,
                reference_type: StockReferenceType::Bill,
                reference_id: Some(bill.id),
                notes: Some(bill_number.clone()),
            };
            apply_stock_movement(&mut tx, shop_id, user.id, entry).await?;
        }
    }

    tx.commit().await?;

    log::info!(
        "bill {} for {} issued in shop {} by {}",
        bill.bill_number,
        bill.total,
        shop_id,
        user.id
    );
    Ok(ApiResponse::ok(BillWithItems { bill, items }))
}
