use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    config::Config,
    database::Database,
    error::{ApiResponse, ApiResult, AppError},
    middleware::{shop_access, CurrentUser},
    models::{dashboard::page_window, Bill, BillItem, BillPeriod, BillWithItems, Paginated, PaymentMethod, Shop},
    receipt::{ReceiptDocument, ReceiptOptions},
};

#[derive(Debug, Default, Deserialize)]
pub struct BillQuery {
    #[serde(default)]
    pub period: BillPeriod,
    pub search: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

fn push_bill_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    shop_id: Uuid,
    query: &BillQuery,
    since: Option<chrono::DateTime<Utc>>,
) {
    builder.push(" WHERE shop_id = ").push_bind(shop_id);

    if let Some(since) = since {
        builder.push(" AND created_at >= ").push_bind(since);
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        builder
            .push(" AND (bill_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR customer_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR customer_phone ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(method) = query.payment_method {
        builder.push(" AND payment_method = ").push_bind(method);
    }
}

pub async fn list_bills(
    user: CurrentUser,
    State(db): State<Database>,
    State(config): State<Arc<Config>>,
    Path(shop_id): Path<Uuid>,
    Query(query): Query<BillQuery>,
) -> ApiResult<Paginated<Bill>> {
    shop_access(&db, shop_id, &user).await?;

    let (page, page_size, offset) = page_window(query.page, query.page_size);
    let since = query.period.since(Utc::now(), config.shop_offset());

    let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM bills");
    push_bill_filters(&mut count_query, shop_id, &query, since);
    let count = count_query.build_query_scalar::<i64>().fetch_one(&db).await?;

    let mut list_query = QueryBuilder::new("SELECT * FROM bills");
    push_bill_filters(&mut list_query, shop_id, &query, since);
    list_query
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(page_size)
        .push(" OFFSET ")
        .push_bind(offset);
    let bills = list_query.build_query_as::<Bill>().fetch_all(&db).await?;

    Ok(ApiResponse::ok(Paginated::new(bills, count, page, page_size)))
}

async fn load_bill(db: &Database, shop_id: Uuid, bill_id: Uuid) -> Result<BillWithItems, AppError> {
    let bill = sqlx::query_as::<_, Bill>("SELECT * FROM bills WHERE id = $1 AND shop_id = $2")
        .bind(bill_id)
        .bind(shop_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Bill"))?;

    let items = sqlx::query_as::<_, BillItem>(
        "SELECT * FROM bill_items WHERE bill_id = $1 ORDER BY position, created_at",
    )
    .bind(bill_id)
    .fetch_all(db)
    .await?;

    Ok(BillWithItems { bill, items })
}

pub async fn get_bill(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, bill_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<BillWithItems> {
    shop_access(&db, shop_id, &user).await?;
    Ok(ApiResponse::ok(load_bill(&db, shop_id, bill_id).await?))
}

async fn receipt_document(
    db: &Database,
    config: &Config,
    shop_id: Uuid,
    bill_id: Uuid,
    tamil: bool,
) -> Result<ReceiptDocument, AppError> {
    let bill = load_bill(db, shop_id, bill_id).await?;
    let shop = sqlx::query_as::<_, Shop>("SELECT * FROM shops WHERE id = $1")
        .bind(shop_id)
        .fetch_one(db)
        .await?;

    let options = ReceiptOptions {
        width: config.receipt_width,
        offset: config.shop_offset(),
        tamil,
    };
    Ok(ReceiptDocument::build(&shop, &bill, options))
}

/// Plain-text receipt, one line per printed row.
pub async fn receipt_text(
    user: CurrentUser,
    State(db): State<Database>,
    State(config): State<Arc<Config>>,
    Path((shop_id, bill_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    shop_access(&db, shop_id, &user).await?;

    let text = receipt_document(&db, &config, shop_id, bill_id, true)
        .await?
        .render_text()?;

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text))
}

/// Raw ESC/POS job for a thermal printer.
pub async fn receipt_escpos(
    user: CurrentUser,
    State(db): State<Database>,
    State(config): State<Arc<Config>>,
    Path((shop_id, bill_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    shop_access(&db, shop_id, &user).await?;

    let bytes = receipt_document(&db, &config, shop_id, bill_id, false)
        .await?
        .render_escpos();

    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn filters_follow_query() {
        let query = BillQuery {
            search: Some("INV-00".to_string()),
            payment_method: Some(PaymentMethod::Upi),
            ..BillQuery::default()
        };
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).single();
        let mut builder = QueryBuilder::new("SELECT * FROM bills");
        push_bill_filters(&mut builder, Uuid::new_v4(), &query, since);

        assert_eq!(
            builder.sql(),
            "SELECT * FROM bills WHERE shop_id = $1 AND created_at >= $2 AND (bill_number ILIKE $3 \
             OR customer_name ILIKE $4 OR customer_phone ILIKE $5) AND payment_method = $6"
        );
    }

    #[test]
    fn all_time_without_search_only_scopes_shop() {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM bills");
        push_bill_filters(&mut builder, Uuid::new_v4(), &BillQuery::default(), None);
        assert_eq!(builder.sql(), "SELECT COUNT(*) FROM bills WHERE shop_id = $1");
    }
}
