use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};

use mercato_core::RouteOptimizer;

use super::{build_runtime, load_config, open_store, CommandFailure, CommandResult};

pub fn run(date: Option<&str>) -> CommandResult {
    let config = match load_config("route") {
        Ok(config) => config,
        Err(result) => return *result,
    };

    let day = match date {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(day) => day,
            Err(_) => {
                return CommandResult::failure(
                    "route",
                    "invalid_arguments",
                    format!("`{raw}` is not a YYYY-MM-DD date"),
                    2,
                );
            }
        },
        None => Utc::now().date_naive(),
    };

    let runtime = match build_runtime("route") {
        Ok(runtime) => runtime,
        Err(result) => return *result,
    };

    // Couriers leave at the configured hour of the delivery day.
    let departure = Utc
        .from_utc_datetime(&day.and_hms_opt(config.routing.departure_hour, 0, 0).unwrap_or_else(
            || day.and_hms_opt(8, 0, 0).expect("valid fallback departure time"),
        ));

    let result = runtime.block_on(async {
        let store = Arc::new(open_store(&config).await?);
        RouteOptimizer::new(store)
            .with_profile(config.routing_profile())
            .routes_for_date(day, departure)
            .await
            .map_err(|error| -> CommandFailure { ("route", error.to_string(), 7) })
    });

    match result {
        Ok(routes) => {
            let stops: usize = routes.iter().map(|route| route.stops.len()).sum();
            let message = format!("{} routes covering {stops} stops on {day}", routes.len());
            CommandResult::with_data("route", message, routes)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("route", error_class, message, exit_code)
        }
    }
}
