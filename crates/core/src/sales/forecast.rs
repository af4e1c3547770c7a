//! Demand forecasting: exponential smoothing with a dampened trend
//! adjustment over a fixed 90-day zero-filled history window.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::{ProductId, ProductQuery, ProductSnapshot};
use crate::errors::EngineResult;
use crate::fanout::try_map_bounded;
use crate::store::{CatalogStore, SalesStore};

use super::history::{zero_filled_series, SalesDataPoint, SalesHistory};

/// Trailing history window the forecast is computed over.
pub const HISTORY_WINDOW_DAYS: u32 = 90;
/// Window for the simple average daily sales figure.
pub const RECENT_MEAN_DAYS: u32 = 30;
/// Single exponential smoothing factor.
pub const SMOOTHING_ALPHA: f64 = 0.3;
/// Dampening applied to the head-vs-tail trend ratio.
pub const TREND_DAMPENING: f64 = 0.3;
/// Days compared at each edge of the window for the trend signal.
pub const TREND_EDGE_DAYS: usize = 7;
/// Sentinel for "stock effectively never runs out" when sales are zero.
pub const STOCK_SENTINEL_DAYS: u32 = 999;
/// Store-read fan-out width for the batch report.
pub const FORECAST_FANOUT_WIDTH: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockUrgency {
    Low,
    Medium,
    High,
    Critical,
}

impl StockUrgency {
    pub fn from_days_of_stock(days: u32) -> Self {
        if days < 3 {
            Self::Critical
        } else if days < 7 {
            Self::High
        } else if days < 14 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Per-product demand estimate and restock guidance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DemandForecast {
    pub product_id: ProductId,
    pub product_name: String,
    pub current_stock: u32,
    pub average_daily_sales: f64,
    /// Estimated units demanded over the forecast horizon.
    pub forecasted_demand: u32,
    pub days_of_stock_remaining: u32,
    pub recommended_reorder: u32,
    pub urgency: StockUrgency,
}

/// Smoothed per-day demand over a dense series: seed at the window mean,
/// then one update per observation.
pub fn smooth_daily_demand(series: &[SalesDataPoint]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let mean = series.iter().map(|p| f64::from(p.quantity)).sum::<f64>() / series.len() as f64;
    series.iter().fold(mean, |forecast, point| {
        SMOOTHING_ALPHA * f64::from(point.quantity) + (1.0 - SMOOTHING_ALPHA) * forecast
    })
}

/// Dampened trend multiplier from the last vs. first `TREND_EDGE_DAYS`
/// of the window. A flat or unmeasurable trend yields 1.0.
pub fn trend_multiplier(series: &[SalesDataPoint]) -> f64 {
    if series.len() < TREND_EDGE_DAYS * 2 {
        return 1.0;
    }
    let older: f64 = series[..TREND_EDGE_DAYS].iter().map(|p| f64::from(p.quantity)).sum::<f64>()
        / TREND_EDGE_DAYS as f64;
    let recent: f64 = series[series.len() - TREND_EDGE_DAYS..]
        .iter()
        .map(|p| f64::from(p.quantity))
        .sum::<f64>()
        / TREND_EDGE_DAYS as f64;
    if older > 0.0 {
        1.0 + TREND_DAMPENING * ((recent - older) / older)
    } else {
        1.0
    }
}

/// Mean daily quantity over the most recent `RECENT_MEAN_DAYS` of a
/// dense series.
pub fn average_daily_sales(series: &[SalesDataPoint]) -> f64 {
    let window = RECENT_MEAN_DAYS as usize;
    if series.is_empty() {
        return 0.0;
    }
    let tail = &series[series.len().saturating_sub(window)..];
    tail.iter().map(|p| f64::from(p.quantity)).sum::<f64>() / window as f64
}

fn forecast_units(series: &[SalesDataPoint], days_ahead: u32) -> u32 {
    let per_day = smooth_daily_demand(series) * trend_multiplier(series);
    let estimate = (per_day * f64::from(days_ahead)).ceil();
    if estimate.is_sign_negative() {
        0
    } else {
        estimate as u32
    }
}

pub struct DemandForecaster<S> {
    store: Arc<S>,
    history: SalesHistory<S>,
    fanout_width: usize,
}

impl<S: SalesStore + CatalogStore> DemandForecaster<S> {
    pub fn new(store: Arc<S>) -> Self {
        let history = SalesHistory::new(Arc::clone(&store));
        Self { store, history, fanout_width: FORECAST_FANOUT_WIDTH }
    }

    pub fn with_fanout_width(mut self, width: usize) -> Self {
        self.fanout_width = width;
        self
    }

    /// Forward demand estimate for one product, in units over
    /// `days_ahead` days.
    pub async fn forecast_product_demand(
        &self,
        product_id: &ProductId,
        days_ahead: u32,
    ) -> EngineResult<u32> {
        let sparse =
            self.history.product_sales_history(product_id, HISTORY_WINDOW_DAYS).await?;
        let series =
            zero_filled_series(&sparse, HISTORY_WINDOW_DAYS, Utc::now().date_naive());
        Ok(forecast_units(&series, days_ahead))
    }

    /// Restock report across the available catalog. Only products close
    /// to running out (or already short of forecast demand) are
    /// included, most urgent first. Per-product history reads are fanned
    /// out at a bounded width.
    pub async fn inventory_recommendations(&self) -> EngineResult<Vec<DemandForecast>> {
        let products = self.store.products(&ProductQuery::available()).await?;
        let today = Utc::now().date_naive();

        let mut forecasts: Vec<DemandForecast> =
            try_map_bounded(products, self.fanout_width, |product: ProductSnapshot| {
                let history = SalesHistory::new(Arc::clone(&self.store));
                async move {
                    let sparse = history
                        .product_sales_history(&product.id, HISTORY_WINDOW_DAYS)
                        .await?;
                    let series = zero_filled_series(&sparse, HISTORY_WINDOW_DAYS, today);
                    Ok::<_, crate::errors::EngineError>(build_forecast(&product, &series))
                }
            })
            .await?
            .into_iter()
            .flatten()
            .collect();

        forecasts.sort_by(|a, b| b.urgency.cmp(&a.urgency));
        Ok(forecasts)
    }
}

/// Forecast one product over a 30-day horizon; `None` when it needs no
/// attention (ample stock and no reorder shortfall).
fn build_forecast(product: &ProductSnapshot, series: &[SalesDataPoint]) -> Option<DemandForecast> {
    let average = average_daily_sales(series);
    let forecasted = forecast_units(series, 30);

    let days_of_stock = if average > 0.0 {
        let days = (f64::from(product.stock) / average).round();
        days.min(f64::from(STOCK_SENTINEL_DAYS)) as u32
    } else {
        STOCK_SENTINEL_DAYS
    };
    let recommended_reorder = forecasted.saturating_sub(product.stock);

    if days_of_stock >= 14 && recommended_reorder == 0 {
        return None;
    }

    Some(DemandForecast {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        current_stock: product.stock,
        average_daily_sales: average,
        forecasted_demand: forecasted,
        days_of_stock_remaining: days_of_stock,
        recommended_reorder,
        urgency: StockUrgency::from_days_of_stock(days_of_stock),
    })
}
