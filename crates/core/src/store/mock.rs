//! In-memory store used by the engine unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::{
    CoPurchaseOrder, CustomerOrderStats, Location, OrderLineFact, ProductId, ProductQuery,
    ProductSnapshot, PurchasedLine, UserId,
};
use crate::errors::StoreError;

use super::{CatalogStore, CustomerStore, DeliveryStore, OrderStore, SalesStore};

#[derive(Default)]
pub(crate) struct MockStore {
    pub products: Vec<ProductSnapshot>,
    pub order_lines: Vec<OrderLineFact>,
    pub purchases: HashMap<String, Vec<PurchasedLine>>,
    pub co_orders: Vec<CoPurchaseOrder>,
    pub customer_stats: Vec<CustomerOrderStats>,
    pub deliveries: HashMap<NaiveDate, Vec<Location>>,
    pub popular: Vec<(ProductId, u32)>,
    pub category_averages: HashMap<String, Decimal>,
    pub applied_discounts: RwLock<Vec<(ProductId, u32)>>,
    pub co_purchase_calls: AtomicUsize,
}

impl MockStore {
    pub fn with_products(products: Vec<ProductSnapshot>) -> Self {
        Self { products, ..Self::default() }
    }
}

#[async_trait]
impl CatalogStore for MockStore {
    async fn product(&self, id: &ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
        Ok(self.products.iter().find(|p| &p.id == id).cloned())
    }

    async fn products(&self, query: &ProductQuery) -> Result<Vec<ProductSnapshot>, StoreError> {
        let mut matched: Vec<ProductSnapshot> = self
            .products
            .iter()
            .filter(|p| !query.only_available || p.available)
            .filter(|p| query.category.as_deref().map_or(true, |c| p.category == c))
            .filter(|p| {
                (query.categories.is_empty() && query.suppliers.is_empty())
                    || query.categories.contains(&p.category)
                    || query.suppliers.contains(&p.supplier)
            })
            .filter(|p| !query.exclude_ids.contains(&p.id))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn category_average_price(
        &self,
        category: &str,
    ) -> Result<Option<Decimal>, StoreError> {
        Ok(self.category_averages.get(category).copied())
    }

    async fn set_product_discount(
        &self,
        id: &ProductId,
        discount_pct: u32,
    ) -> Result<(), StoreError> {
        self.applied_discounts.write().await.push((id.clone(), discount_pct));
        Ok(())
    }
}

#[async_trait]
impl SalesStore for MockStore {
    async fn realized_order_lines(
        &self,
        product_id: &ProductId,
        since: DateTime<Utc>,
    ) -> Result<Vec<OrderLineFact>, StoreError> {
        Ok(self
            .order_lines
            .iter()
            .filter(|line| &line.product_id == product_id && line.ordered_at >= since)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CustomerStore for MockStore {
    async fn delivered_order_stats(&self) -> Result<Vec<CustomerOrderStats>, StoreError> {
        Ok(self.customer_stats.clone())
    }
}

#[async_trait]
impl OrderStore for MockStore {
    async fn recent_purchases(
        &self,
        user_id: &UserId,
        _order_limit: usize,
    ) -> Result<Vec<PurchasedLine>, StoreError> {
        Ok(self.purchases.get(&user_id.0).cloned().unwrap_or_default())
    }

    async fn orders_sharing_products(
        &self,
        product_ids: &[ProductId],
        exclude_user: &UserId,
        limit: usize,
    ) -> Result<Vec<CoPurchaseOrder>, StoreError> {
        let mut orders: Vec<CoPurchaseOrder> = self
            .co_orders
            .iter()
            .filter(|order| &order.user_id != exclude_user)
            .filter(|order| order.product_ids.iter().any(|id| product_ids.contains(id)))
            .cloned()
            .collect();
        orders.truncate(limit);
        Ok(orders)
    }

    async fn co_purchase_lines(
        &self,
        cart_ids: &[ProductId],
        limit: usize,
    ) -> Result<Vec<ProductId>, StoreError> {
        self.co_purchase_calls.fetch_add(1, Ordering::Relaxed);
        let unavailable: Vec<&ProductId> = self
            .products
            .iter()
            .filter(|p| !p.available)
            .map(|p| &p.id)
            .collect();
        let mut lines = Vec::new();
        for order in &self.co_orders {
            if !order.product_ids.iter().any(|id| cart_ids.contains(id)) {
                continue;
            }
            for id in &order.product_ids {
                if !cart_ids.contains(id) && !unavailable.contains(&id) {
                    lines.push(id.clone());
                }
            }
        }
        lines.truncate(limit);
        Ok(lines)
    }

    async fn popular_products(
        &self,
        limit: usize,
    ) -> Result<Vec<(ProductId, u32)>, StoreError> {
        let mut popular = self.popular.clone();
        popular.truncate(limit);
        Ok(popular)
    }
}

#[async_trait]
impl DeliveryStore for MockStore {
    async fn pending_deliveries(&self, date: NaiveDate) -> Result<Vec<Location>, StoreError> {
        Ok(self.deliveries.get(&date).cloned().unwrap_or_default())
    }
}
