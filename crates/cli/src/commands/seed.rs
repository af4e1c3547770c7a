use serde::Serialize;

use mercato_db::{migrations, DemoDataset};

use super::{build_runtime, connect_pool, load_config, CommandFailure, CommandResult};

#[derive(Debug, Serialize)]
struct SeedSummary {
    products: usize,
    users: usize,
    orders: usize,
    verified: bool,
}

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return *result,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return *result,
    };

    let result = runtime.block_on(async {
        let pool = connect_pool(&config).await?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let seeded = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed", error.to_string(), 6u8))?;
        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        pool.close().await;

        if !verification.all_present {
            let failed: Vec<&str> = verification
                .checks
                .iter()
                .filter(|(_, ok)| !ok)
                .map(|(label, _)| *label)
                .collect();
            return Err((
                "seed_verification",
                format!("seeded data failed verification: {}", failed.join(", ")),
                6u8,
            ));
        }

        Ok::<SeedSummary, CommandFailure>(SeedSummary {
            products: seeded.product_count,
            users: seeded.user_count,
            orders: seeded.order_count,
            verified: true,
        })
    });

    match result {
        Ok(summary) => {
            let message = format!(
                "seeded {} products, {} users, {} orders",
                summary.products, summary.users, summary.orders
            );
            CommandResult::with_data("seed", message, summary)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
