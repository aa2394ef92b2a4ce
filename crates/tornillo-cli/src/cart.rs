//! `cart` commands: edit the device-local cart.

use anyhow::bail;
use clap::Subcommand;
use tornillo_core::{parse_quantity, AppConfig, CartStore, FileCartStorage};
use tornillo_sales::{SalesClient, SalesClientConfig};

/// Sub-commands available under `cart`.
#[derive(Debug, Subcommand)]
pub enum CartCommands {
    /// Print the cart lines and totals
    Show,
    /// Add a catalog product to the cart
    Add {
        product_id: String,
        /// Units to add; anything that is not a positive number counts as 1
        #[arg(long, default_value = "1")]
        qty: String,
    },
    /// Remove a product from the cart
    Remove { product_id: String },
    /// Add one unit
    Inc { product_id: String },
    /// Take one unit away, never below 1
    Dec { product_id: String },
    /// Set the quantity of a line (minimum 1)
    Set { product_id: String, qty: String },
    /// Empty the cart
    Clear,
}

/// Opens the cart stored under the configured cart directory.
pub(crate) fn open_cart(config: &AppConfig) -> CartStore<FileCartStorage> {
    CartStore::hydrate(FileCartStorage::new(&config.cart_dir))
}

/// Run a cart sub-command.
///
/// # Errors
///
/// Returns an error only for `add`, when the product cannot be fetched or is
/// out of stock. Local edits never fail.
pub(crate) async fn run_cart(config: &AppConfig, command: CartCommands) -> anyhow::Result<()> {
    let mut cart = open_cart(config);

    match command {
        CartCommands::Show => {}
        CartCommands::Add { product_id, qty } => {
            let client = SalesClient::new(&SalesClientConfig::from_app_config(config))?;
            let product = client.get_product(&product_id).await?;
            if !product.in_stock() {
                bail!("{} ({}) is out of stock", product.name, product.id);
            }
            cart.add(product.to_cart_product(), parse_quantity(&qty));
        }
        CartCommands::Remove { product_id } => {
            if !cart.remove(&product_id) {
                println!("{product_id} is not in the cart");
            }
        }
        CartCommands::Inc { product_id } => cart.increase_qty(&product_id),
        CartCommands::Dec { product_id } => cart.decrease_qty(&product_id),
        CartCommands::Set { product_id, qty } => cart.set_qty(&product_id, parse_quantity(&qty)),
        CartCommands::Clear => cart.clear(),
    }

    print_cart(&cart);
    Ok(())
}

pub(crate) fn print_cart(cart: &CartStore<FileCartStorage>) {
    if cart.is_empty() {
        println!("cart is empty");
        return;
    }

    println!("{:<12}{:>6}{:>12}{:>12}  NAME", "ID", "QTY", "PRICE", "LINE");
    for line in cart.items() {
        println!(
            "{:<12}{:>6}{:>12.2}{:>12.2}  {}",
            line.product.id,
            line.quantity,
            line.product.price,
            line.line_total(),
            line.product.name
        );
    }
    println!("{} items, total {:.2}", cart.item_count(), cart.total());
}
