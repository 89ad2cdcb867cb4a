pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::commands::recompute::RecomputeTarget;

#[derive(Debug, Parser)]
#[command(
    name = "outfitter",
    about = "Outfitter operator CLI",
    long_about = "Apply migrations, load the demo catalog, rebuild compatibility edges, and preview outfit recommendations.",
    after_help = "Examples:\n  outfitter migrate\n  outfitter seed\n  outfitter recompute --all\n  outfitter recommend <product-id> --user <user-id>"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo catalog and demo shopper")]
    Seed,
    #[command(about = "Rebuild compatibility edges for one product or the whole catalog")]
    Recompute {
        #[arg(help = "Product id to recompute", required_unless_present = "all", conflicts_with = "all")]
        product_id: Option<String>,
        #[arg(long, help = "Recompute every product with bounded concurrency")]
        all: bool,
    },
    #[command(about = "Assemble outfits for a product and shopper")]
    Recommend {
        #[arg(help = "Base product id")]
        product_id: String,
        #[arg(long = "user", help = "Shopper id whose profile personalizes the ranking")]
        user_id: String,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Recompute { product_id, all } => {
            let target = match product_id {
                Some(product_id) if !all => RecomputeTarget::Product(product_id),
                _ => RecomputeTarget::All,
            };
            commands::recompute::run(target)
        }
        Command::Recommend { product_id, user_id } => {
            commands::recommend::run(&product_id, &user_id)
        }
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
