//! Deterministic demo dataset and its verification contract.

use sqlx::Executor;

use mercato_core::errors::StoreError;

use crate::connection::DbPool;
use crate::store::db_error;

const SEED_PRODUCT_IDS: &[&str] = &[
    "prod-tomato",
    "prod-cucumber",
    "prod-milk",
    "prod-yogurt",
    "prod-cola",
    "prod-water",
    "prod-rice",
    "prod-olive-oil",
    "prod-retired",
];

const SEED_USER_IDS: &[&str] = &["user-bahar", "user-golha", "user-sahel"];

const SEED_ORDER_IDS: &[&str] =
    &["ord-1001", "ord-1002", "ord-1003", "ord-1004", "ord-1005", "ord-1006", "ord-1007"];

const SEED_ORDER_LINE_COUNT: i64 = 14;

/// Demo dataset for local runs and end-to-end tests.
///
/// Seeds a small catalog across five categories, three shops, and orders
/// in every status so each analytical surface has realistic input.
pub struct DemoDataset;

impl DemoDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Load the demo dataset in a single transaction.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, StoreError> {
        let mut tx = pool.begin().await.map_err(db_error)?;
        tx.execute(sqlx::query(Self::SQL)).await.map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        Ok(SeedResult {
            product_count: SEED_PRODUCT_IDS.len(),
            user_count: SEED_USER_IDS.len(),
            order_count: SEED_ORDER_IDS.len(),
        })
    }

    /// Verify that the seeded rows exist and match the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, StoreError> {
        let mut checks = Vec::new();

        let product_count: i64 = count_by_ids(pool, "products", SEED_PRODUCT_IDS).await?;
        checks.push(("products", product_count == SEED_PRODUCT_IDS.len() as i64));

        let user_count: i64 = count_by_ids(pool, "users", SEED_USER_IDS).await?;
        checks.push(("users", user_count == SEED_USER_IDS.len() as i64));

        let order_count: i64 = count_by_ids(pool, "orders", SEED_ORDER_IDS).await?;
        checks.push(("orders", order_count == SEED_ORDER_IDS.len() as i64));

        let quoted_orders = sql_array_from_ids(SEED_ORDER_IDS);
        let line_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM order_lines WHERE order_id IN {quoted_orders}"
        ))
        .fetch_one(pool)
        .await
        .map_err(db_error)?;
        checks.push(("order-lines", line_count == SEED_ORDER_LINE_COUNT));

        let unavailable_ok: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = 'prod-retired' AND available = 0)",
        )
        .fetch_one(pool)
        .await
        .map_err(db_error)?;
        checks.push(("retired-product-unavailable", unavailable_ok == 1));

        let delivered_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM orders WHERE status = 'delivered' AND id IN {quoted_orders}"
        ))
        .fetch_one(pool)
        .await
        .map_err(db_error)?;
        checks.push(("delivered-orders", delivered_count == 3));

        let geocoded_pending: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM orders
             WHERE status = 'pending'
               AND latitude IS NOT NULL AND longitude IS NOT NULL
               AND id IN {quoted_orders}"
        ))
        .fetch_one(pool)
        .await
        .map_err(db_error)?;
        checks.push(("geocoded-pending-orders", geocoded_pending == 2));

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove the seeded rows from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), StoreError> {
        let mut tx = pool.begin().await.map_err(db_error)?;

        let quoted_orders = sql_array_from_ids(SEED_ORDER_IDS);
        let quoted_users = sql_array_from_ids(SEED_USER_IDS);
        let quoted_products = sql_array_from_ids(SEED_PRODUCT_IDS);

        sqlx::query(&format!("DELETE FROM order_lines WHERE order_id IN {quoted_orders}"))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        sqlx::query(&format!("DELETE FROM orders WHERE id IN {quoted_orders}"))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        sqlx::query(&format!("DELETE FROM users WHERE id IN {quoted_users}"))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        sqlx::query(&format!("DELETE FROM products WHERE id IN {quoted_products}"))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SeedResult {
    pub product_count: usize,
    pub user_count: usize,
    pub order_count: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

async fn count_by_ids(pool: &DbPool, table: &str, ids: &[&str]) -> Result<i64, StoreError> {
    let quoted = sql_array_from_ids(ids);
    sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table} WHERE id IN {quoted}"))
        .fetch_one(pool)
        .await
        .map_err(db_error)
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("'{id}'")).collect();
    format!("({})", quoted.join(", "))
}
