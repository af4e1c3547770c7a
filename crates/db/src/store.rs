//! SQLite-backed implementation of the core store ports.
//!
//! Timestamps are stored as `YYYY-MM-DD HH:MM:SS` UTC text and money
//! columns as canonical decimal strings; both are parsed on read so the
//! engines only ever see `DateTime<Utc>` and `Decimal`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use mercato_core::domain::{
    CoPurchaseOrder, CustomerOrderStats, GeoPoint, Location, OrderId, OrderLineFact, ProductId,
    ProductQuery, ProductSnapshot, PurchasedLine, UserId,
};
use mercato_core::errors::StoreError;
use mercato_core::store::{CatalogStore, CustomerStore, DeliveryStore, OrderStore, SalesStore};

use crate::DbPool;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqlCommerceStore {
    pool: DbPool,
}

impl SqlCommerceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

pub(crate) fn db_error(error: sqlx::Error) -> StoreError {
    StoreError::Query(error.to_string())
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, StoreError> {
    raw.parse().map_err(|_| {
        StoreError::Decode(format!("column `{column}` holds non-decimal value `{raw}`"))
    })
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| {
            StoreError::Decode(format!("column `{column}` holds non-timestamp value `{raw}`"))
        })
}

fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn get_column<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(db_error)
}

fn quantity_from(raw: i64, column: &str) -> Result<u32, StoreError> {
    u32::try_from(raw)
        .map_err(|_| StoreError::Decode(format!("column `{column}` holds negative value {raw}")))
}

fn product_from_row(row: &SqliteRow) -> Result<ProductSnapshot, StoreError> {
    let price_text: String = get_column(row, "price")?;
    let cost_price_text: Option<String> = get_column(row, "cost_price")?;
    let created_at_text: String = get_column(row, "created_at")?;
    let discount_raw: i64 = get_column(row, "discount_pct")?;
    let stock_raw: i64 = get_column(row, "stock")?;

    let cost_price = match cost_price_text {
        Some(raw) => Some(parse_decimal("cost_price", &raw)?),
        None => None,
    };

    Ok(ProductSnapshot {
        id: ProductId(get_column(row, "id")?),
        name: get_column(row, "name")?,
        category: get_column(row, "category")?,
        supplier: get_column(row, "supplier")?,
        price: parse_decimal("price", &price_text)?,
        cost_price,
        discount_pct: quantity_from(discount_raw, "discount_pct")?,
        stock: quantity_from(stock_raw, "stock")?,
        available: get_column::<i64>(row, "available")? != 0,
        featured: get_column::<i64>(row, "featured")? != 0,
        created_at: parse_timestamp("created_at", &created_at_text)?,
    })
}

const PRODUCT_COLUMNS: &str = "id, name, category, supplier, price, cost_price, discount_pct, \
                               stock, available, featured, created_at";

fn placeholders(count: usize) -> String {
    let mut out = String::new();
    for index in 0..count {
        if index > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out
}

/// Builds the WHERE clause for a catalog query; bind values are returned
/// in placeholder order.
fn product_filter_sql(query: &ProductQuery) -> (String, Vec<String>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    if query.only_available {
        clauses.push("available = 1".to_string());
    }
    if let Some(category) = &query.category {
        clauses.push("category = ?".to_string());
        binds.push(category.clone());
    }
    match (query.categories.is_empty(), query.suppliers.is_empty()) {
        (false, false) => {
            clauses.push(format!(
                "(category IN ({}) OR supplier IN ({}))",
                placeholders(query.categories.len()),
                placeholders(query.suppliers.len()),
            ));
            binds.extend(query.categories.iter().cloned());
            binds.extend(query.suppliers.iter().cloned());
        }
        (false, true) => {
            clauses.push(format!("category IN ({})", placeholders(query.categories.len())));
            binds.extend(query.categories.iter().cloned());
        }
        (true, false) => {
            clauses.push(format!("supplier IN ({})", placeholders(query.suppliers.len())));
            binds.extend(query.suppliers.iter().cloned());
        }
        (true, true) => {}
    }
    if !query.exclude_ids.is_empty() {
        clauses.push(format!("id NOT IN ({})", placeholders(query.exclude_ids.len())));
        binds.extend(query.exclude_ids.iter().map(|id| id.0.clone()));
    }

    let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM products");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY id ASC");
    if query.limit.is_some() {
        sql.push_str(" LIMIT ?");
    }

    (sql, binds)
}

#[async_trait]
impl CatalogStore for SqlCommerceStore {
    async fn product(&self, id: &ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn products(&self, query: &ProductQuery) -> Result<Vec<ProductSnapshot>, StoreError> {
        let (sql, binds) = product_filter_sql(query);

        let mut prepared = sqlx::query(&sql);
        for value in &binds {
            prepared = prepared.bind(value);
        }
        if let Some(limit) = query.limit {
            prepared = prepared.bind(limit as i64);
        }

        let rows = prepared.fetch_all(&self.pool).await.map_err(db_error)?;
        rows.iter().map(product_from_row).collect()
    }

    async fn category_average_price(
        &self,
        category: &str,
    ) -> Result<Option<Decimal>, StoreError> {
        let rows = sqlx::query("SELECT price FROM products WHERE category = ?1")
            .bind(category)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut sum = Decimal::ZERO;
        for row in &rows {
            let raw: String = get_column(row, "price")?;
            sum += parse_decimal("price", &raw)?;
        }
        Ok(Some(sum / Decimal::from(rows.len() as u64)))
    }

    async fn set_product_discount(
        &self,
        id: &ProductId,
        discount_pct: u32,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE products SET discount_pct = ?1 WHERE id = ?2")
            .bind(discount_pct as i64)
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Query(format!("product `{id}` not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl SalesStore for SqlCommerceStore {
    async fn realized_order_lines(
        &self,
        product_id: &ProductId,
        since: DateTime<Utc>,
    ) -> Result<Vec<OrderLineFact>, StoreError> {
        let rows = sqlx::query(
            "SELECT ol.order_id, ol.product_id, ol.quantity, ol.unit_price, \
                    o.created_at AS ordered_at
             FROM order_lines ol
             JOIN orders o ON o.id = ol.order_id
             WHERE ol.product_id = ?1
               AND o.status IN ('shipped', 'delivered')
               AND o.created_at >= ?2
             ORDER BY o.created_at ASC, ol.id ASC",
        )
        .bind(&product_id.0)
        .bind(encode_timestamp(since))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                let quantity_raw: i64 = get_column(row, "quantity")?;
                let unit_price_text: String = get_column(row, "unit_price")?;
                let ordered_at_text: String = get_column(row, "ordered_at")?;
                Ok(OrderLineFact {
                    order_id: OrderId(get_column(row, "order_id")?),
                    product_id: ProductId(get_column(row, "product_id")?),
                    quantity: quantity_from(quantity_raw, "quantity")?,
                    unit_price: parse_decimal("unit_price", &unit_price_text)?,
                    ordered_at: parse_timestamp("ordered_at", &ordered_at_text)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CustomerStore for SqlCommerceStore {
    async fn delivered_order_stats(&self) -> Result<Vec<CustomerOrderStats>, StoreError> {
        let rows = sqlx::query(
            "SELECT o.user_id, u.name, u.shop_name, o.total, o.created_at
             FROM orders o
             JOIN users u ON u.id = o.user_id
             WHERE o.status = 'delivered'
             ORDER BY o.user_id ASC, o.created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        // Decimal totals are aggregated here rather than in SQL so string
        // money columns never round-trip through floating point.
        let mut by_user: HashMap<String, CustomerOrderStats> = HashMap::new();
        for row in &rows {
            let user_id: String = get_column(row, "user_id")?;
            let total_text: String = get_column(row, "total")?;
            let created_at_text: String = get_column(row, "created_at")?;
            let total = parse_decimal("total", &total_text)?;
            let created_at = parse_timestamp("created_at", &created_at_text)?;

            match by_user.get_mut(&user_id) {
                Some(stats) => {
                    stats.order_count += 1;
                    stats.total_spent += total;
                    if created_at > stats.last_order_at {
                        stats.last_order_at = created_at;
                    }
                }
                None => {
                    by_user.insert(
                        user_id.clone(),
                        CustomerOrderStats {
                            user_id: UserId(user_id),
                            name: get_column(row, "name")?,
                            shop_name: get_column(row, "shop_name")?,
                            last_order_at: created_at,
                            order_count: 1,
                            total_spent: total,
                        },
                    );
                }
            }
        }

        let mut stats: Vec<CustomerOrderStats> = by_user.into_values().collect();
        stats.sort_by(|a, b| a.user_id.0.cmp(&b.user_id.0));
        Ok(stats)
    }
}

#[async_trait]
impl OrderStore for SqlCommerceStore {
    async fn recent_purchases(
        &self,
        user_id: &UserId,
        order_limit: usize,
    ) -> Result<Vec<PurchasedLine>, StoreError> {
        let rows = sqlx::query(
            "SELECT ol.order_id, ol.product_id, ol.quantity, p.category, p.supplier
             FROM order_lines ol
             JOIN products p ON p.id = ol.product_id
             WHERE ol.order_id IN (
                 SELECT id FROM orders
                 WHERE user_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2
             )
             ORDER BY ol.order_id ASC, ol.id ASC",
        )
        .bind(&user_id.0)
        .bind(order_limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                let quantity_raw: i64 = get_column(row, "quantity")?;
                Ok(PurchasedLine {
                    order_id: OrderId(get_column(row, "order_id")?),
                    product_id: ProductId(get_column(row, "product_id")?),
                    quantity: quantity_from(quantity_raw, "quantity")?,
                    category: get_column(row, "category")?,
                    supplier: get_column(row, "supplier")?,
                })
            })
            .collect()
    }

    async fn orders_sharing_products(
        &self,
        product_ids: &[ProductId],
        exclude_user: &UserId,
        limit: usize,
    ) -> Result<Vec<CoPurchaseOrder>, StoreError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT o.id AS order_id, o.user_id, ol.product_id
             FROM orders o
             JOIN order_lines ol ON ol.order_id = o.id
             WHERE o.id IN (
                 SELECT id FROM orders
                 WHERE user_id <> ?
                   AND id IN (
                       SELECT DISTINCT order_id FROM order_lines
                       WHERE product_id IN ({})
                   )
                 ORDER BY created_at DESC
                 LIMIT ?
             )
             ORDER BY o.created_at DESC, o.id ASC, ol.id ASC",
            placeholders(product_ids.len()),
        );

        let mut prepared = sqlx::query(&sql).bind(&exclude_user.0);
        for id in product_ids {
            prepared = prepared.bind(&id.0);
        }
        prepared = prepared.bind(limit as i64);

        let rows = prepared.fetch_all(&self.pool).await.map_err(db_error)?;

        // Rows arrive grouped by order; fold them into one entry per order
        // while preserving recency order.
        let mut orders: Vec<CoPurchaseOrder> = Vec::new();
        for row in &rows {
            let order_id: String = get_column(row, "order_id")?;
            let product_id: String = get_column(row, "product_id")?;
            match orders.last_mut() {
                Some(last) if last.order_id.0 == order_id => {
                    last.product_ids.push(ProductId(product_id));
                }
                _ => orders.push(CoPurchaseOrder {
                    order_id: OrderId(order_id),
                    user_id: UserId(get_column(row, "user_id")?),
                    product_ids: vec![ProductId(product_id)],
                }),
            }
        }
        Ok(orders)
    }

    async fn co_purchase_lines(
        &self,
        cart_ids: &[ProductId],
        limit: usize,
    ) -> Result<Vec<ProductId>, StoreError> {
        if cart_ids.is_empty() {
            return Ok(Vec::new());
        }

        let cart_placeholders = placeholders(cart_ids.len());
        let sql = format!(
            "SELECT ol.product_id
             FROM order_lines ol
             JOIN products p ON p.id = ol.product_id
             WHERE ol.order_id IN (
                 SELECT DISTINCT order_id FROM order_lines
                 WHERE product_id IN ({cart_placeholders})
             )
               AND ol.product_id NOT IN ({cart_placeholders})
               AND p.available = 1
             ORDER BY ol.order_id ASC, ol.id ASC
             LIMIT ?",
        );

        let mut prepared = sqlx::query(&sql);
        for id in cart_ids {
            prepared = prepared.bind(&id.0);
        }
        for id in cart_ids {
            prepared = prepared.bind(&id.0);
        }
        prepared = prepared.bind(limit as i64);

        let rows = prepared.fetch_all(&self.pool).await.map_err(db_error)?;
        rows.iter()
            .map(|row| Ok(ProductId(get_column(row, "product_id")?)))
            .collect()
    }

    async fn popular_products(
        &self,
        limit: usize,
    ) -> Result<Vec<(ProductId, u32)>, StoreError> {
        let rows = sqlx::query(
            "SELECT product_id, COUNT(DISTINCT order_id) AS freq
             FROM order_lines
             GROUP BY product_id
             ORDER BY freq DESC, product_id ASC
             LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                let freq_raw: i64 = get_column(row, "freq")?;
                Ok((
                    ProductId(get_column(row, "product_id")?),
                    quantity_from(freq_raw, "freq")?,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl DeliveryStore for SqlCommerceStore {
    async fn pending_deliveries(&self, date: NaiveDate) -> Result<Vec<Location>, StoreError> {
        let rows = sqlx::query(
            "SELECT o.id AS order_id, o.latitude, o.longitude, u.shop_name
             FROM orders o
             JOIN users u ON u.id = o.user_id
             WHERE o.status = 'pending'
               AND o.latitude IS NOT NULL
               AND o.longitude IS NOT NULL
               AND date(o.created_at) = ?1
             ORDER BY o.created_at ASC, o.id ASC",
        )
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                let shop_name: String = get_column(row, "shop_name")?;
                Ok(Location {
                    order_id: OrderId(get_column(row, "order_id")?),
                    point: GeoPoint::new(
                        get_column::<f64>(row, "latitude")?,
                        get_column::<f64>(row, "longitude")?,
                    ),
                    shop_name: (!shop_name.is_empty()).then_some(shop_name),
                })
            })
            .collect()
    }
}
