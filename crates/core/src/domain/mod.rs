pub mod customer;
pub mod geo;
pub mod order;
pub mod product;

pub use customer::{CustomerOrderStats, UserId};
pub use geo::{GeoPoint, Location};
pub use order::{CoPurchaseOrder, OrderId, OrderLineFact, OrderStatus, PurchasedLine};
pub use product::{ProductId, ProductQuery, ProductSnapshot};
