use std::sync::Arc;

use mercato_core::domain::{ProductId, UserId};
use mercato_core::RecommendationEngine;

use super::{build_runtime, load_config, open_store, CommandFailure, CommandResult};

pub fn run(user: Option<&str>, cart: &[String], limit: usize) -> CommandResult {
    if user.is_none() && cart.is_empty() {
        return CommandResult::failure(
            "recommend",
            "invalid_arguments",
            "pass --user <id> or --cart <product-id,...>",
            2,
        );
    }

    let config = match load_config("recommend") {
        Ok(config) => config,
        Err(result) => return *result,
    };
    let runtime = match build_runtime("recommend") {
        Ok(runtime) => runtime,
        Err(result) => return *result,
    };

    let user = user.map(|id| UserId(id.to_string()));
    let cart: Vec<ProductId> = cart.iter().map(|id| ProductId(id.clone())).collect();

    let result = runtime.block_on(async {
        let store = Arc::new(open_store(&config).await?);
        let engine = RecommendationEngine::new(store);

        let scores = match &user {
            Some(user_id) => engine.personalized(user_id, limit).await,
            None => engine.cart_recommendations(&cart, limit).await,
        };
        scores.map_err(|error| -> CommandFailure { ("recommend", error.to_string(), 7) })
    });

    match result {
        Ok(scores) => {
            let message = match &user {
                Some(user_id) => {
                    format!("{} recommendations for {user_id}", scores.len())
                }
                None => format!("{} cart recommendations", scores.len()),
            };
            CommandResult::with_data("recommend", message, scores)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("recommend", error_class, message, exit_code)
        }
    }
}
