use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{PaymentMethod, Product};
use crate::utils::{fits_unit, MAX_PRICE, MAX_QUANTITY};

use super::totals::{clamp_discount, BillTotals, LineAmounts};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Cart is empty")]
    Empty,

    #[error("Quantity must be greater than zero")]
    NonPositiveQuantity,

    #[error("Unit price cannot be negative")]
    NegativePrice,

    #[error("Quantity cannot exceed {}", MAX_QUANTITY)]
    QuantityTooLarge,

    #[error("Unit price cannot exceed {}", MAX_PRICE)]
    PriceTooLarge,

    #[error("Quantity for unit '{unit}' must be a whole number")]
    FractionalQuantity { unit: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub product: Product,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl CartItem {
    fn amounts(&self) -> LineAmounts {
        LineAmounts {
            quantity: self.quantity,
            unit_price: self.unit_price,
            gst_percent: self.product.gst_percent,
        }
    }
}

/// Snapshot of one cart line as it is stored on a bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_name_tamil: Option<String>,
    pub sku: Option<String>,
    pub hsn_code: Option<String>,
    pub unit: String,
    pub track_inventory: bool,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_amount: Decimal,
    pub taxable_amount: Decimal,
    pub gst_percent: Decimal,
    pub gst_amount: Decimal,
    pub total: Decimal,
}

/// In-progress sale at the point of sale.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub price_type_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub payment_method: PaymentMethod,
    pub discount_percent: Decimal,
    pub notes: Option<String>,
}

fn check_price(unit_price: Decimal) -> Result<(), CartError> {
    if unit_price < Decimal::ZERO {
        return Err(CartError::NegativePrice);
    }
    if unit_price > MAX_PRICE {
        return Err(CartError::PriceTooLarge);
    }
    Ok(())
}

fn check_line(product: &Product, quantity: Decimal, unit_price: Decimal) -> Result<(), CartError> {
    if quantity <= Decimal::ZERO {
        return Err(CartError::NonPositiveQuantity);
    }
    if quantity > MAX_QUANTITY {
        return Err(CartError::QuantityTooLarge);
    }
    check_price(unit_price)?;
    if !fits_unit(&product.unit, quantity) {
        return Err(CartError::FractionalQuantity {
            unit: product.unit.clone(),
        });
    }
    Ok(())
}

impl Cart {
    /// Adds `quantity` of `product`. A product already in the cart keeps its
    /// position, gains the quantity and takes the new unit price.
    pub fn add_item(&mut self, product: Product, quantity: Decimal, unit_price: Decimal) -> Result<(), CartError> {
        match self.items.iter_mut().find(|item| item.product.id == product.id) {
            Some(existing) => {
                check_line(&product, quantity, unit_price)?;
                let merged = existing.quantity + quantity;
                check_line(&product, merged, unit_price)?;
                existing.quantity = merged;
                existing.unit_price = unit_price;
            }
            None => {
                check_line(&product, quantity, unit_price)?;
                self.items.push(CartItem {
                    product,
                    quantity,
                    unit_price,
                });
            }
        }
        Ok(())
    }

    pub fn set_discount_percent(&mut self, percent: Decimal) {
        self.discount_percent = clamp_discount(percent);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn totals(&self) -> BillTotals {
        BillTotals::compute(self.items.iter().map(CartItem::amounts), self.discount_percent)
    }

    /// Per-line amounts with the bill discount spread proportionally.
    pub fn bill_lines(&self) -> Result<Vec<BillLine>, CartError> {
        if self.is_empty() {
            return Err(CartError::Empty);
        }

        let discount = clamp_discount(self.discount_percent);
        let multiplier = Decimal::ONE - discount / Decimal::ONE_HUNDRED;

        let lines = self
            .items
            .iter()
            .map(|item| {
                let amounts = item.amounts();
                let gross = amounts.gross();
                let taxable_amount = gross * multiplier;
                let gst_amount = amounts.gross_gst() * multiplier;
                BillLine {
                    product_id: item.product.id,
                    product_name: item.product.name.clone(),
                    product_name_tamil: item.product.name_tamil.clone(),
                    sku: item.product.sku.clone(),
                    hsn_code: item.product.hsn_code.clone(),
                    unit: item.product.unit.clone(),
                    track_inventory: item.product.track_inventory,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    discount_amount: gross * discount / Decimal::ONE_HUNDRED,
                    taxable_amount,
                    gst_percent: amounts.gst_percent,
                    gst_amount,
                    total: taxable_amount + gst_amount,
                }
            })
            .collect();

        Ok(lines)
    }
}

// Counter-side editing of an open cart. HTTP checkout builds its cart in
// one pass, so only tests drive these in the server binary.
#[cfg_attr(not(test), allow(dead_code))]
impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove_item(&mut self, product_id: Uuid) {
        self.items.retain(|item| item.product.id != product_id);
    }

    /// Sets a line's quantity; zero or less removes the line.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: Decimal) -> Result<(), CartError> {
        if quantity <= Decimal::ZERO {
            self.remove_item(product_id);
            return Ok(());
        }
        if let Some(item) = self.items.iter_mut().find(|item| item.product.id == product_id) {
            check_line(&item.product, quantity, item.unit_price)?;
            item.quantity = quantity;
        }
        Ok(())
    }

    pub fn update_item_price(&mut self, product_id: Uuid, unit_price: Decimal) -> Result<(), CartError> {
        check_price(unit_price)?;
        if let Some(item) = self.items.iter_mut().find(|item| item.product.id == product_id) {
            item.unit_price = unit_price;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{bill::CheckoutLine, catalog::fixtures::product};
    use rust_decimal_macros::dec;

    #[test]
    fn adding_same_product_merges_and_reprices() {
        let tea = product("Tea", dec!(100), dec!(5));
        let sugar = product("Sugar", dec!(45), dec!(0));
        let mut cart = Cart::new();

        cart.add_item(tea.clone(), dec!(1), dec!(100)).unwrap();
        cart.add_item(sugar.clone(), dec!(2), dec!(45)).unwrap();
        cart.add_item(tea.clone(), dec!(2), dec!(95)).unwrap();

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.items[0].product.id, tea.id);
        assert_eq!(cart.items[0].quantity, dec!(3));
        assert_eq!(cart.items[0].unit_price, dec!(95));
        assert_eq!(cart.items[1].product.id, sugar.id);
    }

    #[test]
    fn rejects_invalid_lines() {
        let soap = product("Soap", dec!(40), dec!(18));
        let mut rice = product("Rice", dec!(60), dec!(5));
        rice.unit = "kg".to_string();
        let mut cart = Cart::new();

        assert_eq!(cart.add_item(soap.clone(), dec!(0), dec!(40)), Err(CartError::NonPositiveQuantity));
        assert_eq!(cart.add_item(soap.clone(), dec!(1), dec!(-1)), Err(CartError::NegativePrice));
        assert_eq!(
            cart.add_item(soap, dec!(1.5), dec!(40)),
            Err(CartError::FractionalQuantity { unit: "pcs".to_string() })
        );
        assert!(cart.add_item(rice, dec!(1.25), dec!(60)).is_ok());
        assert_eq!(cart.items.len(), 1);
    }

    #[test]
    fn non_positive_quantity_update_removes_line() {
        let tea = product("Tea", dec!(100), dec!(5));
        let mut cart = Cart::new();
        cart.add_item(tea.clone(), dec!(2), dec!(100)).unwrap();

        cart.update_quantity(tea.id, dec!(4)).unwrap();
        assert_eq!(cart.items[0].quantity, dec!(4));

        cart.update_quantity(tea.id, dec!(0)).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn clear_resets_everything() {
        let mut cart = Cart::new();
        cart.add_item(product("Tea", dec!(100), dec!(5)), dec!(1), dec!(100)).unwrap();
        cart.set_discount_percent(dec!(150));
        assert_eq!(cart.discount_percent, dec!(100));
        cart.customer_name = Some("Meena".to_string());
        cart.payment_method = PaymentMethod::Upi;

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.discount_percent, Decimal::ZERO);
        assert_eq!(cart.customer_name, None);
        assert_eq!(cart.payment_method, PaymentMethod::Cash);
    }

    #[test]
    fn bill_lines_add_up_to_bill_total() {
        let mut cart = Cart::new();
        cart.add_item(product("Tea", dec!(100), dec!(18)), dec!(2), dec!(100)).unwrap();
        cart.add_item(product("Salt", dec!(20), dec!(0)), dec!(3), dec!(20)).unwrap();
        cart.set_discount_percent(dec!(10));

        let lines = cart.bill_lines().unwrap();
        let totals = cart.totals();

        assert_eq!(lines[0].discount_amount, dec!(20));
        assert_eq!(lines[0].taxable_amount, dec!(180));
        assert_eq!(lines[0].gst_amount, dec!(32.4));
        assert_eq!(lines[0].total, dec!(212.4));
        let sum: Decimal = lines.iter().map(|l| l.total).sum();
        assert_eq!(sum, totals.total);
    }

    #[test]
    fn oversized_request_line_is_rejected_before_totals() {
        let tea = product("Tea", dec!(100), dec!(5));
        let line: CheckoutLine = serde_json::from_value(serde_json::json!({
            "product_id": tea.id,
            "quantity": "79228162514264337593543950335",
            "unit_price": "2",
        }))
        .unwrap();
        let mut cart = Cart::new();

        let added = cart.add_item(tea, line.quantity, line.unit_price.unwrap());
        assert_eq!(added, Err(CartError::QuantityTooLarge));
        assert!(cart.is_empty());
        assert_eq!(cart.totals().total, Decimal::ZERO);
    }

    #[test]
    fn bounds_prices_and_merged_quantities() {
        let tea = product("Tea", dec!(100), dec!(5));
        let mut cart = Cart::new();

        assert_eq!(
            cart.add_item(tea.clone(), dec!(1), MAX_PRICE + dec!(1)),
            Err(CartError::PriceTooLarge)
        );
        cart.add_item(tea.clone(), MAX_QUANTITY, dec!(100)).unwrap();
        assert_eq!(cart.add_item(tea.clone(), dec!(1), dec!(100)), Err(CartError::QuantityTooLarge));
        assert_eq!(cart.items[0].quantity, MAX_QUANTITY);
        assert_eq!(cart.update_item_price(tea.id, Decimal::MAX), Err(CartError::PriceTooLarge));

        let totals = cart.totals();
        assert_eq!(totals.total, totals.taxable_amount + totals.gst_amount);
    }

    #[test]
    fn empty_cart_has_no_bill_lines() {
        assert_eq!(Cart::new().bill_lines(), Err(CartError::Empty));
    }
}
