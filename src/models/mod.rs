pub mod bill;
pub mod catalog;
pub mod dashboard;
pub mod purchase;
pub mod shop;
pub mod stock;

pub use bill::{Bill, BillItem, BillPeriod, BillWithItems, CheckoutRequest, PaymentMethod, PaymentStatus};
pub use catalog::{
    Brand, BrandInput, Category, CategoryInput, CategoryNode, PriceType, PriceTypeInput, Product,
    ProductInput, ProductPrice, ProductWithPrices,
};
pub use dashboard::{DashboardStats, LowStockProduct, Paginated, ShopDashboard, UserDashboard};
pub use purchase::{
    PurchaseOrder, PurchaseOrderDetail, PurchaseOrderInput, PurchaseOrderItem,
    PurchaseOrderItemDisplay, PurchaseOrderStatus, PurchaseOrderSummary, ReceiveRequest,
    StatusUpdate, Supplier, SupplierInput,
};
pub use shop::{AccessibleShop, EmployeeDisplay, EmployeeStatus, Profile, Shop, ShopEmployee, ShopInput, UserRole};
pub use stock::{
    AdjustmentRequest, InventoryOverview, InventorySummary, StockChange, StockFilter, StockLimit,
    StockMovement, StockMovementDisplay, StockMovementType, StockReferenceType, StockRow,
    StockStatus,
};
