use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-side snapshot of a catalog product as the engines consume it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub supplier: String,
    pub price: Decimal,
    /// Absent or non-positive cost prices fall back to an assumed margin.
    pub cost_price: Option<Decimal>,
    /// Current discount, integer percent.
    pub discount_pct: u32,
    pub stock: u32,
    pub available: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
}

impl ProductSnapshot {
    /// Effective selling price after the current discount.
    pub fn discounted_price(&self) -> Decimal {
        self.price * (Decimal::from(100 - self.discount_pct.min(100))) / Decimal::from(100)
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}

/// Filter for catalog product queries.
#[derive(Clone, Debug, Default)]
pub struct ProductQuery {
    pub only_available: bool,
    pub category: Option<String>,
    /// Match any of these categories (OR, combined with `suppliers`).
    pub categories: Vec<String>,
    /// Match any of these suppliers (OR, combined with `categories`).
    pub suppliers: Vec<String>,
    pub exclude_ids: Vec<ProductId>,
    pub limit: Option<usize>,
}

impl ProductQuery {
    pub fn available() -> Self {
        Self { only_available: true, ..Self::default() }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
