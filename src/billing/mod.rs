//! Cart handling and bill arithmetic.
//!
//! Everything here is pure; the checkout handler feeds it products loaded
//! from the database and persists what it returns.

pub mod cart;
pub mod totals;

pub use cart::{BillLine, Cart, CartError};
pub use totals::BillTotals;
