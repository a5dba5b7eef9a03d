use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;
use rust_decimal::Decimal;

use super::{AccessibleShop, Bill};

#[derive(Debug, Serialize, FromRow)]
pub struct LowStockProduct {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
    pub stock_quantity: Decimal,
    pub low_stock_threshold: Decimal,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub today_sales: Decimal,
    pub today_bill_count: i64,
    pub month_sales: Decimal,
    pub month_bill_count: i64,
    pub low_stock_count: i64,
    pub total_products: i64,
}

#[derive(Debug, Serialize)]
pub struct ShopDashboard {
    pub stats: DashboardStats,
    pub low_stock_products: Vec<LowStockProduct>,
    pub recent_bills: Vec<Bill>,
}

#[derive(Debug, Serialize)]
pub struct UserDashboard {
    pub email: String,
    pub owned_shops: Vec<AccessibleShop>,
    pub employee_shops: Vec<AccessibleShop>,
}

/// Page of results plus the numbers needed to render pagination.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, count: i64, page: i64, page_size: i64) -> Self {
        let total_pages = if page_size > 0 {
            (count + page_size - 1) / page_size
        } else {
            0
        };
        Self {
            data,
            count,
            page,
            page_size,
            total_pages,
        }
    }
}

/// Clamps raw paging query values to (page, page_size, offset).
pub fn page_window(page: Option<i64>, page_size: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size.unwrap_or(50).clamp(1, 200);
    (page, page_size, (page - 1) * page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let page: Paginated<u8> = Paginated::new(Vec::new(), 101, 1, 50);
        assert_eq!(page.total_pages, 3);
        let empty: Paginated<u8> = Paginated::new(Vec::new(), 0, 1, 50);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn page_window_clamps_input() {
        assert_eq!(page_window(None, None), (1, 50, 0));
        assert_eq!(page_window(Some(0), Some(1000)), (1, 200, 0));
        assert_eq!(page_window(Some(3), Some(20)), (3, 20, 40));
    }
}
