use serde_json::json;

use super::{load_config, CommandResult};

/// Print the effective configuration after defaults, file, and
/// environment overrides have been merged.
pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(result) => return *result,
    };

    let effective = json!({
        "database": {
            "url": config.database.url,
            "max_connections": config.database.max_connections,
            "timeout_secs": config.database.timeout_secs,
        },
        "logging": {
            "level": config.logging.level,
            "format": config.logging.format,
        },
        "warehouse": {
            "latitude": config.warehouse.latitude,
            "longitude": config.warehouse.longitude,
        },
        "fanout": {
            "width": config.fanout.width,
        },
        "routing": {
            "speed_kmh": config.routing.speed_kmh,
            "stop_service_minutes": config.routing.stop_service_minutes,
            "max_stops_per_route": config.routing.max_stops_per_route,
            "departure_hour": config.routing.departure_hour,
        },
    });

    CommandResult::with_data("config", "effective configuration", effective)
}
