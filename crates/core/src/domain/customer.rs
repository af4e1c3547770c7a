use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-customer delivered-order aggregates, one row per qualifying user.
/// Customers with no delivered orders never appear here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerOrderStats {
    pub user_id: UserId,
    pub name: String,
    pub shop_name: String,
    pub last_order_at: DateTime<Utc>,
    pub order_count: u32,
    pub total_spent: Decimal,
}
