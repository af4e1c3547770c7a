use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::customer::UserId;
use super::product::ProductId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Confirmed demand: the order left the warehouse or reached the buyer.
    pub fn is_realized(&self) -> bool {
        matches!(self, Self::Shipped | Self::Delivered)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown order status `{other}`")),
        }
    }
}

/// One order line of a realized order, as read for sales aggregation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLineFact {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub ordered_at: DateTime<Utc>,
}

impl OrderLineFact {
    pub fn revenue(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Order line joined with product attributes, used by the recommender
/// to build category/supplier preference tallies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchasedLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub category: String,
    pub supplier: String,
}

/// An order reduced to its buyer and product set, for co-purchase analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoPurchaseOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub product_ids: Vec<ProductId>,
}
