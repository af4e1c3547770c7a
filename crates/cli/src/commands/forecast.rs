use std::sync::Arc;

use mercato_core::DemandForecaster;

use super::{build_runtime, load_config, open_store, CommandFailure, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("forecast") {
        Ok(config) => config,
        Err(result) => return *result,
    };
    let runtime = match build_runtime("forecast") {
        Ok(runtime) => runtime,
        Err(result) => return *result,
    };

    let result = runtime.block_on(async {
        let store = Arc::new(open_store(&config).await?);
        let forecaster =
            DemandForecaster::new(store).with_fanout_width(config.fanout.width);
        forecaster
            .inventory_recommendations()
            .await
            .map_err(|error| -> CommandFailure { ("forecast", error.to_string(), 7) })
    });

    match result {
        Ok(forecasts) => {
            let message = if forecasts.is_empty() {
                "no products need restocking".to_string()
            } else {
                format!("{} products need attention", forecasts.len())
            };
            CommandResult::with_data("forecast", message, forecasts)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("forecast", error_class, message, exit_code)
        }
    }
}
