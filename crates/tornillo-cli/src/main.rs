mod cart;
mod catalog;
mod checkout;


use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cart::CartCommands;

#[derive(Debug, Parser)]
#[command(name = "tornillo")]
#[command(about = "Tornillo Feliz storefront command line client")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Browse one page of the product catalog
    Catalog {
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Products per page
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Free-text search
        #[arg(long)]
        search: Option<String>,
    },
    /// Inspect or edit the local cart
    Cart {
        #[command(subcommand)]
        command: CartCommands,
    },
    /// Sync the cart with the server and place the order
    Checkout {
        /// JSON file with `customer`, `delivery` and `payment` blocks
        #[arg(long)]
        order: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = tornillo_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Some(Commands::Catalog {
            page,
            limit,
            search,
        }) => catalog::run_catalog(&config, page, limit, search.as_deref()).await?,
        Some(Commands::Cart { command }) => cart::run_cart(&config, command).await?,
        Some(Commands::Checkout { order }) => checkout::run_checkout(&config, &order).await?,
        None => println!("tornillo: try `tornillo catalog` or `tornillo cart show`"),
    }

    Ok(())
}
