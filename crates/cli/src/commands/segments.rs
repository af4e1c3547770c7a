use std::sync::Arc;

use mercato_core::CustomerSegmenter;

use super::{build_runtime, load_config, open_store, CommandFailure, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("segments") {
        Ok(config) => config,
        Err(result) => return *result,
    };
    let runtime = match build_runtime("segments") {
        Ok(runtime) => runtime,
        Err(result) => return *result,
    };

    let result = runtime.block_on(async {
        let store = Arc::new(open_store(&config).await?);
        CustomerSegmenter::new(store)
            .calculate_rfm_segments()
            .await
            .map_err(|error| -> CommandFailure { ("segments", error.to_string(), 7) })
    });

    match result {
        Ok(segments) => {
            let message = format!("segmented {} customers", segments.len());
            CommandResult::with_data("segments", message, segments)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("segments", error_class, message, exit_code)
        }
    }
}
