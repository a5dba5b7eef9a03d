pub mod permission;

pub use permission::{shop_access, shop_admin, CurrentUser};
