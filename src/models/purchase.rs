use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::utils::{fits_unit, MAX_PRICE, MAX_QUANTITY};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Supplier {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub gstin: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SupplierInput {
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub gstin: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "purchase_order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Draft,
    Ordered,
    Partial,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    /// Manual transitions; receiving moves orders to `Partial`/`Received`.
    pub fn can_transition_to(self, next: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Draft, Ordered) | (Draft, Cancelled) | (Ordered, Cancelled)
        )
    }

    pub fn can_receive(self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Draft | PurchaseOrderStatus::Ordered | PurchaseOrderStatus::Partial
        )
    }

    pub fn can_delete(self) -> bool {
        matches!(self, PurchaseOrderStatus::Draft | PurchaseOrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub supplier_id: Uuid,
    pub po_number: String,
    pub status: PurchaseOrderStatus,
    pub order_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    pub received_date: Option<DateTime<Utc>>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrderItem {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub product_id: Uuid,
    pub quantity_ordered: Decimal,
    pub quantity_received: Decimal,
    pub unit_cost: Decimal,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl PurchaseOrderItem {
    pub fn outstanding(&self) -> Decimal {
        (self.quantity_ordered - self.quantity_received).max(Decimal::ZERO)
    }
}

#[derive(Debug, Serialize, FromRow)]
pub struct PurchaseOrderItemDisplay {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: PurchaseOrderItem,
    pub product_name: String,
    pub unit: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct PurchaseOrderSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub supplier_name: String,
    pub item_count: i64,
}

#[derive(Debug, Serialize)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub supplier: Supplier,
    pub items: Vec<PurchaseOrderItemDisplay>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseOrderLineInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// Defaults to the product's cost price.
    pub unit_cost: Option<Decimal>,
}

/// Catalogue facts needed to put a product on an order.
#[derive(Debug, Clone, FromRow)]
pub struct OrderableProduct {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
    pub track_inventory: bool,
    pub cost_price: Decimal,
}

/// Validates one order line. Only products that track inventory can be
/// ordered, since receiving books the goods into stock.
pub fn check_order_line(product: &OrderableProduct, quantity: Decimal, unit_cost: Decimal) -> Result<(), String> {
    if !product.track_inventory {
        return Err(format!(
            "{} does not track inventory; turn tracking on before ordering it",
            product.name
        ));
    }
    if quantity <= Decimal::ZERO {
        return Err("Quantities must be greater than zero".to_string());
    }
    if quantity > MAX_QUANTITY {
        return Err(format!("Quantity cannot exceed {}", MAX_QUANTITY));
    }
    if !fits_unit(&product.unit, quantity) {
        return Err(format!(
            "Quantity for {} must be a whole number of {}",
            product.name, product.unit
        ));
    }
    if unit_cost < Decimal::ZERO {
        return Err("Unit cost cannot be negative".to_string());
    }
    if unit_cost > MAX_PRICE {
        return Err(format!("Unit cost cannot exceed {}", MAX_PRICE));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct PurchaseOrderInput {
    pub supplier_id: Uuid,
    pub items: Vec<PurchaseOrderLineInput>,
    pub order_date: Option<NaiveDate>,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: PurchaseOrderStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReceiveRequest {
    /// Quantities per purchase-order item id; omitted items receive everything outstanding.
    #[serde(default)]
    pub quantities: HashMap<Uuid, Decimal>,
    pub notes: Option<String>,
}

/// Quantity to book in for one purchase-order item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLine {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
}

/// Works out what a receiving action books in, per item.
///
/// Items with nothing outstanding are skipped, as are zero quantities.
pub fn plan_receipt(
    items: &[PurchaseOrderItem],
    requested: &HashMap<Uuid, Decimal>,
) -> Result<Vec<ReceiptLine>, String> {
    if let Some(unknown) = requested.keys().find(|id| !items.iter().any(|i| i.id == **id)) {
        return Err(format!("Item {} is not part of this purchase order", unknown));
    }

    let mut lines = Vec::new();
    for item in items {
        let outstanding = item.outstanding();
        let quantity = requested.get(&item.id).copied().unwrap_or(outstanding);

        if quantity < Decimal::ZERO {
            return Err("Received quantity cannot be negative".to_string());
        }
        if quantity > outstanding {
            return Err(format!(
                "Cannot receive {} for an item with {} outstanding",
                quantity.normalize(),
                outstanding.normalize()
            ));
        }
        if quantity.is_zero() {
            continue;
        }

        lines.push(ReceiptLine {
            item_id: item.id,
            product_id: item.product_id,
            quantity,
        });
    }

    if lines.is_empty() {
        return Err("Nothing to receive".to_string());
    }
    Ok(lines)
}

/// Status after `lines` have been booked against `items`.
pub fn status_after_receipt(items: &[PurchaseOrderItem], lines: &[ReceiptLine]) -> PurchaseOrderStatus {
    let fully_received = items.iter().all(|item| {
        let booked: Decimal = lines
            .iter()
            .filter(|l| l.item_id == item.id)
            .map(|l| l.quantity)
            .sum();
        item.quantity_received + booked >= item.quantity_ordered
    });

    if fully_received {
        PurchaseOrderStatus::Received
    } else {
        PurchaseOrderStatus::Partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(ordered: Decimal, received: Decimal) -> PurchaseOrderItem {
        PurchaseOrderItem {
            id: Uuid::new_v4(),
            purchase_order_id: Uuid::nil(),
            product_id: Uuid::new_v4(),
            quantity_ordered: ordered,
            quantity_received: received,
            unit_cost: dec!(10),
            total: ordered * dec!(10),
            created_at: Utc::now(),
        }
    }

    fn orderable(unit: &str, track_inventory: bool) -> OrderableProduct {
        OrderableProduct {
            id: Uuid::new_v4(),
            name: "Toor Dal".to_string(),
            unit: unit.to_string(),
            track_inventory,
            cost_price: dec!(120),
        }
    }

    #[test]
    fn only_tracked_products_can_be_ordered() {
        let untracked = orderable("kg", false);
        let err = check_order_line(&untracked, dec!(10), dec!(120)).unwrap_err();
        assert!(err.starts_with("Toor Dal does not track inventory"));

        assert!(check_order_line(&orderable("kg", true), dec!(10), dec!(120)).is_ok());
    }

    #[test]
    fn order_lines_respect_units_and_limits() {
        let dal = orderable("kg", true);
        let soap = orderable("pcs", true);

        assert!(check_order_line(&dal, dec!(2.5), dec!(120)).is_ok());
        assert!(check_order_line(&soap, dec!(2.5), dec!(30)).is_err());
        assert!(check_order_line(&soap, dec!(0), dec!(30)).is_err());
        assert!(check_order_line(&soap, dec!(1), dec!(-1)).is_err());
        assert!(check_order_line(&soap, Decimal::MAX, dec!(2)).is_err());
        assert!(check_order_line(&soap, dec!(1), Decimal::MAX).is_err());
        assert!(check_order_line(&soap, MAX_QUANTITY, MAX_PRICE).is_ok());
    }

    #[test]
    fn manual_transitions() {
        use PurchaseOrderStatus::*;
        assert!(Draft.can_transition_to(Ordered));
        assert!(Draft.can_transition_to(Cancelled));
        assert!(Ordered.can_transition_to(Cancelled));
        assert!(!Ordered.can_transition_to(Draft));
        assert!(!Received.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Ordered));
        assert!(!Partial.can_transition_to(Cancelled));
    }

    #[test]
    fn receiving_and_deleting_rules() {
        use PurchaseOrderStatus::*;
        assert!(Partial.can_receive());
        assert!(!Received.can_receive());
        assert!(!Cancelled.can_receive());
        assert!(Cancelled.can_delete());
        assert!(!Partial.can_delete());
    }

    #[test]
    fn receives_everything_outstanding_by_default() {
        let items = vec![item(dec!(10), dec!(0)), item(dec!(5), dec!(2))];
        let lines = plan_receipt(&items, &HashMap::new()).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].quantity, dec!(10));
        assert_eq!(lines[1].quantity, dec!(3));
        assert_eq!(status_after_receipt(&items, &lines), PurchaseOrderStatus::Received);
    }

    #[test]
    fn partial_quantities_leave_order_partial() {
        let items = vec![item(dec!(10), dec!(0)), item(dec!(4), dec!(0))];
        let requested = HashMap::from([(items[0].id, dec!(6)), (items[1].id, dec!(0))]);
        let lines = plan_receipt(&items, &requested).unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, dec!(6));
        assert_eq!(status_after_receipt(&items, &lines), PurchaseOrderStatus::Partial);
    }

    #[test]
    fn rejects_over_receiving_and_unknown_items() {
        let items = vec![item(dec!(3), dec!(1))];
        let too_many = HashMap::from([(items[0].id, dec!(3))]);
        assert!(plan_receipt(&items, &too_many).is_err());

        let unknown = HashMap::from([(Uuid::new_v4(), dec!(1))]);
        assert!(plan_receipt(&items, &unknown).is_err());
    }

    #[test]
    fn fully_received_order_has_nothing_to_receive() {
        let items = vec![item(dec!(3), dec!(3))];
        assert_eq!(plan_receipt(&items, &HashMap::new()), Err("Nothing to receive".to_string()));
    }
}
