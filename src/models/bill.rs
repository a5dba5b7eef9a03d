use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Upi,
    Credit,
}

impl PaymentMethod {
    pub fn label(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::Upi => "UPI",
            PaymentMethod::Credit => "Credit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bill {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub bill_number: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub price_type_id: Option<Uuid>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub discount_percent: Decimal,
    pub taxable_amount: Decimal,
    pub gst_amount: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BillItem {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_name_tamil: Option<String>,
    pub sku: Option<String>,
    pub hsn_code: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub discount_amount: Decimal,
    pub taxable_amount: Decimal,
    pub gst_percent: Decimal,
    pub gst_amount: Decimal,
    pub total: Decimal,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BillWithItems {
    #[serde(flatten)]
    pub bill: Bill,
    pub items: Vec<BillItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutLine {
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// Overrides the price-type price when present.
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutLine>,
    pub price_type_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub discount_percent: Decimal,
    pub notes: Option<String>,
}

/// Date range used by the bill history screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillPeriod {
    #[default]
    Today,
    Week,
    Month,
    All,
}

impl BillPeriod {
    /// Earliest `created_at` included, or `None` for no lower bound.
    ///
    /// `Today` starts at shop-local midnight; `Week` and `Month` are rolling
    /// windows of 7 days and one calendar month back from `now`.
    pub fn since(self, now: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
        match self {
            BillPeriod::Today => Some(start_of_local_day(now, offset)),
            BillPeriod::Week => Some(now - Duration::days(7)),
            BillPeriod::Month => Some(
                now.checked_sub_months(chrono::Months::new(1))
                    .unwrap_or(now - Duration::days(30)),
            ),
            BillPeriod::All => None,
        }
    }
}

/// UTC instant of the most recent shop-local midnight.
pub fn start_of_local_day(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local = now.with_timezone(&offset);
    let midnight = local.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default();
    offset
        .from_local_datetime(&midnight)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

/// UTC instant of the first shop-local midnight of the current month.
pub fn start_of_local_month(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local = now.with_timezone(&offset);
    let first = local
        .date_naive()
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    offset
        .from_local_datetime(&first)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    #[test]
    fn local_day_starts_at_shop_midnight() {
        // 2024-03-10 20:00 UTC is 2024-03-11 01:30 IST.
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        let start = start_of_local_day(now, ist());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 10, 18, 30, 0).unwrap());
    }

    #[test]
    fn local_month_starts_on_the_first() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        let start = start_of_local_month(now, ist());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 29, 18, 30, 0).unwrap());
    }

    #[test]
    fn periods_resolve_lower_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(BillPeriod::All.since(now, ist()), None);
        assert_eq!(
            BillPeriod::Week.since(now, ist()),
            Some(Utc.with_ymd_and_hms(2024, 3, 24, 12, 0, 0).unwrap())
        );
        assert_eq!(
            BillPeriod::Month.since(now, ist()),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn bill_history_opens_on_today() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        assert_eq!(BillPeriod::default(), BillPeriod::Today);
        assert_eq!(
            BillPeriod::default().since(now, ist()),
            Some(start_of_local_day(now, ist()))
        );
    }

    #[test]
    fn payment_method_defaults_to_cash() {
        assert_eq!(PaymentMethod::default(), PaymentMethod::Cash);
        assert_eq!(PaymentMethod::Upi.label(), "UPI");
    }
}
