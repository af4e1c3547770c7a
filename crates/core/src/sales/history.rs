//! Sales history aggregation: raw realized order lines reduced into a
//! per-day (quantity, revenue) series.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{OrderLineFact, ProductId};
use crate::errors::EngineResult;
use crate::store::SalesStore;

/// Aggregated sales for one product on one UTC calendar day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalesDataPoint {
    pub day: NaiveDate,
    pub quantity: u32,
    pub revenue: Decimal,
}

/// Group realized order lines by UTC calendar day, summing quantity and
/// revenue. Only days with at least one sale are returned, ascending by
/// day; callers needing a dense series zero-fill themselves.
pub fn aggregate_daily(lines: &[OrderLineFact]) -> Vec<SalesDataPoint> {
    let mut days: BTreeMap<NaiveDate, (u32, Decimal)> = BTreeMap::new();
    for line in lines {
        let entry = days.entry(line.ordered_at.date_naive()).or_insert((0, Decimal::ZERO));
        entry.0 += line.quantity;
        entry.1 += line.revenue();
    }
    days.into_iter()
        .map(|(day, (quantity, revenue))| SalesDataPoint { day, quantity, revenue })
        .collect()
}

/// Expand a sparse series into a dense window of exactly `window_days`
/// points ending at `today`, inserting explicit zeros for missing days.
pub fn zero_filled_series(
    points: &[SalesDataPoint],
    window_days: u32,
    today: NaiveDate,
) -> Vec<SalesDataPoint> {
    let by_day: BTreeMap<NaiveDate, &SalesDataPoint> =
        points.iter().map(|p| (p.day, p)).collect();
    let start = today - Days::new(u64::from(window_days.saturating_sub(1)));
    (0..window_days)
        .map(|offset| {
            let day = start + Days::new(u64::from(offset));
            by_day.get(&day).map(|p| (*p).clone()).unwrap_or(SalesDataPoint {
                day,
                quantity: 0,
                revenue: Decimal::ZERO,
            })
        })
        .collect()
}

/// Read-side projection of a product's realized sales.
pub struct SalesHistory<S> {
    store: Arc<S>,
}

impl<S: SalesStore> SalesHistory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Per-day sales for the trailing `days` window. Pending and
    /// cancelled orders never contribute; they are not confirmed demand.
    pub async fn product_sales_history(
        &self,
        product_id: &ProductId,
        days: u32,
    ) -> EngineResult<Vec<SalesDataPoint>> {
        let since = window_start(Utc::now(), days);
        let lines = self.store.realized_order_lines(product_id, since).await?;
        Ok(aggregate_daily(&lines))
    }
}

pub(crate) fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now - chrono::Duration::days(i64::from(days))
}
