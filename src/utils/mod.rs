pub mod auth;
pub mod money;
pub mod units;

pub use auth::verify_token;
pub use money::{format_inr, format_percent, format_quantity, MAX_PRICE};
pub use units::{fits_unit, unit_label, MAX_QUANTITY};
