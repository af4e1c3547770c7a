pub mod forecast;
pub mod history;

pub use forecast::{DemandForecast, DemandForecaster, StockUrgency};
pub use history::{aggregate_daily, zero_filled_series, SalesDataPoint, SalesHistory};
