use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::utils::{fits_unit, MAX_QUANTITY};

/// Ceiling for a product's stock level.
pub const MAX_STOCK: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "stock_movement_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StockMovementType {
    Purchase,
    Sale,
    Adjustment,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "stock_reference_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StockReferenceType {
    Bill,
    PurchaseOrder,
    Adjustment,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub product_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub movement_type: StockMovementType,
    pub quantity: Decimal,
    pub quantity_before: Decimal,
    pub quantity_after: Decimal,
    pub reference_type: Option<StockReferenceType>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct StockMovementDisplay {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub movement: StockMovement,
    pub product_name: String,
    pub unit: String,
    pub created_by_name: Option<String>,
}

/// One ledger step: `after = before + quantity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub before: Decimal,
    pub quantity: Decimal,
    pub after: Decimal,
}

/// Why a ledger step was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLimit {
    BelowZero,
    AboveMax,
}

impl StockChange {
    pub fn checked_apply(before: Decimal, quantity: Decimal) -> Result<Self, StockLimit> {
        let after = before.checked_add(quantity).ok_or(StockLimit::AboveMax)?;
        if after < Decimal::ZERO {
            return Err(StockLimit::BelowZero);
        }
        if after > MAX_STOCK {
            return Err(StockLimit::AboveMax);
        }
        Ok(Self {
            before,
            quantity,
            after,
        })
    }
}

/// Checks one signed movement quantity for a product sold in `unit`.
pub fn check_movement_quantity(name: &str, unit: &str, quantity: Decimal) -> Result<(), String> {
    if quantity.abs() > MAX_QUANTITY {
        return Err(format!("A single stock change cannot exceed {} {}", MAX_QUANTITY, unit));
    }
    if !fits_unit(unit, quantity) {
        return Err(format!("Quantity for {} must be a whole number of {}", name, unit));
    }
    Ok(())
}

/// Shelf status of a tracked product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    Out,
    Low,
    In,
}

impl StockStatus {
    pub fn classify(stock: Decimal, threshold: Decimal) -> Self {
        if stock <= Decimal::ZERO {
            StockStatus::Out
        } else if stock <= threshold {
            StockStatus::Low
        } else {
            StockStatus::In
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockFilter {
    #[default]
    All,
    Low,
    Out,
    In,
}

impl StockFilter {
    pub fn matches(self, status: StockStatus) -> bool {
        match self {
            StockFilter::All => true,
            StockFilter::Low => status == StockStatus::Low,
            StockFilter::Out => status == StockStatus::Out,
            StockFilter::In => status == StockStatus::In,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockRow {
    pub product_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub unit: String,
    pub stock_quantity: Decimal,
    pub low_stock_threshold: Decimal,
    pub cost_price: Decimal,
    pub stock_value: Decimal,
    pub status: StockStatus,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct InventorySummary {
    pub tracked_products: usize,
    pub low_stock_count: usize,
    pub out_of_stock_count: usize,
    pub stock_value: Decimal,
}

impl InventorySummary {
    pub fn from_rows(rows: &[StockRow]) -> Self {
        rows.iter().fold(Self::default(), |mut summary, row| {
            summary.tracked_products += 1;
            match row.status {
                StockStatus::Low => summary.low_stock_count += 1,
                StockStatus::Out => summary.out_of_stock_count += 1,
                StockStatus::In => {}
            }
            summary.stock_value += row.stock_value;
            summary
        })
    }
}

#[derive(Debug, Serialize)]
pub struct InventoryOverview {
    pub summary: InventorySummary,
    pub products: Vec<StockRow>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    pub product_id: Uuid,
    #[serde(rename = "type")]
    pub movement_type: StockMovementType,
    pub quantity: Decimal,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn ledger_step_adds_signed_quantity() {
        let sale = StockChange::checked_apply(dec!(10), dec!(-3)).unwrap();
        assert_eq!(sale.after, dec!(7));
        assert_eq!(sale.quantity, dec!(-3));

        assert_eq!(StockChange::checked_apply(dec!(1.5), dec!(-2)), Err(StockLimit::BelowZero));
    }

    #[test]
    fn ledger_step_refuses_out_of_range_stock() {
        assert_eq!(StockChange::checked_apply(MAX_STOCK, dec!(1)), Err(StockLimit::AboveMax));
        assert_eq!(StockChange::checked_apply(Decimal::MAX, Decimal::MAX), Err(StockLimit::AboveMax));
        assert!(StockChange::checked_apply(MAX_STOCK - dec!(1), dec!(1)).is_ok());
    }

    #[test]
    fn movement_quantities_follow_the_unit() {
        assert!(check_movement_quantity("Soap", "pcs", dec!(-4)).is_ok());
        assert!(check_movement_quantity("Rice", "kg", dec!(2.5)).is_ok());
        assert_eq!(
            check_movement_quantity("Soap", "pcs", dec!(1.5)),
            Err("Quantity for Soap must be a whole number of pcs".to_string())
        );
        assert!(check_movement_quantity("Rice", "kg", dec!(1000001)).is_err());
        assert!(check_movement_quantity("Rice", "kg", dec!(-1000001)).is_err());
    }

    #[test]
    fn classifies_stock_levels() {
        assert_eq!(StockStatus::classify(dec!(0), dec!(5)), StockStatus::Out);
        assert_eq!(StockStatus::classify(dec!(-1), dec!(5)), StockStatus::Out);
        assert_eq!(StockStatus::classify(dec!(5), dec!(5)), StockStatus::Low);
        assert_eq!(StockStatus::classify(dec!(6), dec!(5)), StockStatus::In);
        assert!(StockFilter::All.matches(StockStatus::Out));
        assert!(!StockFilter::Low.matches(StockStatus::Out));
    }

    #[test]
    fn summary_counts_and_values_stock() {
        let row = |stock: Decimal, threshold: Decimal, cost: Decimal| StockRow {
            product_id: Uuid::new_v4(),
            name: "Item".to_string(),
            sku: None,
            unit: "pcs".to_string(),
            stock_quantity: stock,
            low_stock_threshold: threshold,
            cost_price: cost,
            stock_value: stock * cost,
            status: StockStatus::classify(stock, threshold),
        };
        let rows = vec![
            row(dec!(20), dec!(5), dec!(10)),
            row(dec!(3), dec!(5), dec!(4)),
            row(dec!(0), dec!(5), dec!(99)),
        ];

        let summary = InventorySummary::from_rows(&rows);
        assert_eq!(
            summary,
            InventorySummary {
                tracked_products: 3,
                low_stock_count: 1,
                out_of_stock_count: 1,
                stock_value: dec!(212),
            }
        );
    }
}
