use std::sync::Arc;

use mercato_core::PricingEngine;

use super::{build_runtime, load_config, open_store, CommandFailure, CommandResult};

pub fn run(min_impact: u32, category: Option<&str>, apply: bool) -> CommandResult {
    let config = match load_config("pricing") {
        Ok(config) => config,
        Err(result) => return *result,
    };
    let runtime = match build_runtime("pricing") {
        Ok(runtime) => runtime,
        Err(result) => return *result,
    };

    let result = runtime.block_on(async {
        let store = Arc::new(open_store(&config).await?);
        let engine = PricingEngine::new(store).with_fanout_width(config.fanout.width);

        let recommendations = engine
            .discount_recommendations(min_impact, category)
            .await
            .map_err(|error| -> CommandFailure { ("pricing", error.to_string(), 7) })?;

        let mut applied = 0usize;
        if apply {
            for recommendation in &recommendations {
                engine
                    .apply_recommendation(
                        &recommendation.product_id,
                        recommendation.recommended_discount_pct,
                    )
                    .await
                    .map_err(|error| -> CommandFailure {
                        ("pricing_apply", error.to_string(), 8)
                    })?;
                applied += 1;
            }
        }

        Ok::<_, CommandFailure>((recommendations, applied))
    });

    match result {
        Ok((recommendations, applied)) => {
            let message = if apply {
                format!("applied {applied} of {} recommendations", recommendations.len())
            } else {
                format!("{} discount recommendations", recommendations.len())
            };
            CommandResult::with_data("pricing", message, recommendations)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("pricing", error_class, message, exit_code)
        }
    }
}
