//! Ports onto the external catalog/order relational store.
//!
//! The engines are read-mostly consumers of an already-existing store;
//! these traits are the functional boundary from spec'd collaborator
//! queries to whatever backend implements them. The single write in the
//! whole surface is [`CatalogStore::set_product_discount`], invoked only
//! by an explicit apply call, never implicitly by the pricing engine.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    CoPurchaseOrder, CustomerOrderStats, Location, OrderLineFact, ProductId, ProductQuery,
    ProductSnapshot, PurchasedLine, UserId,
};
use crate::errors::StoreError;

#[cfg(test)]
pub(crate) mod mock;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Look up a single product; `None` when it does not exist.
    async fn product(&self, id: &ProductId) -> Result<Option<ProductSnapshot>, StoreError>;

    /// Products matching the query filter, in stable (id-ascending) order.
    async fn products(&self, query: &ProductQuery) -> Result<Vec<ProductSnapshot>, StoreError>;

    /// Average listed price across a category; `None` for an empty category.
    async fn category_average_price(&self, category: &str)
        -> Result<Option<Decimal>, StoreError>;

    /// The engine's only write: persist a recommended discount percentage.
    async fn set_product_discount(
        &self,
        id: &ProductId,
        discount_pct: u32,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SalesStore: Send + Sync {
    /// Order lines for a product from realized (shipped or delivered)
    /// orders placed at or after `since`.
    async fn realized_order_lines(
        &self,
        product_id: &ProductId,
        since: DateTime<Utc>,
    ) -> Result<Vec<OrderLineFact>, StoreError>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Delivered-order aggregates for every customer with at least one
    /// delivered order.
    async fn delivered_order_stats(&self) -> Result<Vec<CustomerOrderStats>, StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Lines of the user's most recent `order_limit` orders, joined with
    /// product category/supplier.
    async fn recent_purchases(
        &self,
        user_id: &UserId,
        order_limit: usize,
    ) -> Result<Vec<PurchasedLine>, StoreError>;

    /// Up to `limit` orders from other users that share at least one of
    /// the given products, each reduced to buyer + product set.
    async fn orders_sharing_products(
        &self,
        product_ids: &[ProductId],
        exclude_user: &UserId,
        limit: usize,
    ) -> Result<Vec<CoPurchaseOrder>, StoreError>;

    /// Up to `limit` order lines taken from orders containing at least
    /// one cart product, excluding the cart products themselves and any
    /// product that is no longer available.
    async fn co_purchase_lines(
        &self,
        cart_ids: &[ProductId],
        limit: usize,
    ) -> Result<Vec<ProductId>, StoreError>;

    /// Product co-purchase frequency across all orders, descending.
    async fn popular_products(&self, limit: usize)
        -> Result<Vec<(ProductId, u32)>, StoreError>;
}

#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Geocoded pending orders created on the given calendar day.
    async fn pending_deliveries(&self, date: NaiveDate) -> Result<Vec<Location>, StoreError>;
}

/// Convenience bound for backends implementing the full store surface.
pub trait CommerceStore:
    CatalogStore + SalesStore + CustomerStore + OrderStore + DeliveryStore
{
}

impl<T> CommerceStore for T where
    T: CatalogStore + SalesStore + CustomerStore + OrderStore + DeliveryStore
{
}
