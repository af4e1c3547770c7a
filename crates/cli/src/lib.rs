pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use mercato_core::config::EngineConfig;

#[derive(Debug, Parser)]
#[command(
    name = "mercato",
    about = "Mercato commerce analytics CLI",
    long_about = "Run demand forecasts, pricing recommendations, customer segmentation, \
                  product recommendations, and delivery route planning against the store database.",
    after_help = "Examples:\n  mercato migrate\n  mercato forecast\n  mercato pricing --min-impact 10\n  mercato route --date 2025-08-20"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset and verify it")]
    Seed,
    #[command(about = "Restock report: forecast demand and flag products running low")]
    Forecast,
    #[command(about = "Discount recommendations across the catalog")]
    Pricing {
        #[arg(long, default_value_t = 5, help = "Minimum discount move (percentage points) worth reporting")]
        min_impact: u32,
        #[arg(long, help = "Restrict the batch to one category")]
        category: Option<String>,
        #[arg(long, help = "Persist every reported discount onto the catalog")]
        apply: bool,
    },
    #[command(about = "RFM customer segmentation over delivered orders")]
    Segments,
    #[command(about = "Product recommendations for a customer or an anonymous cart")]
    Recommend {
        #[arg(long, conflicts_with = "cart", help = "Customer to personalize for")]
        user: Option<String>,
        #[arg(long, value_delimiter = ',', help = "Cart product ids, comma separated")]
        cart: Vec<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    #[command(about = "Plan delivery routes for a day's pending orders")]
    Route {
        #[arg(long, help = "Delivery day as YYYY-MM-DD; defaults to today")]
        date: Option<String>,
    },
    #[command(about = "Print the effective configuration")]
    Config,
}

pub(crate) fn init_logging(config: &EngineConfig) {
    use mercato_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    // A second init in the same process is fine to ignore.
    let _ = match config.logging.format {
        Compact => tracing_subscriber::fmt()
            .with_target(false)
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .compact()
            .try_init(),
        Pretty => tracing_subscriber::fmt()
            .with_target(false)
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .pretty()
            .try_init(),
        Json => tracing_subscriber::fmt()
            .with_target(false)
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .json()
            .try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Forecast => commands::forecast::run(),
        Command::Pricing { min_impact, category, apply } => {
            commands::pricing::run(min_impact, category.as_deref(), apply)
        }
        Command::Segments => commands::segments::run(),
        Command::Recommend { user, cart, limit } => {
            commands::recommend::run(user.as_deref(), &cart, limit)
        }
        Command::Route { date } => commands::route::run(date.as_deref()),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
