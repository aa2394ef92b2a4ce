//! `checkout` command: reconcile the server cart and place the order.

use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::Value;
use tornillo_core::{AppConfig, CheckoutPayload};
use tornillo_sales::{Reconciler, SalesClient, SalesClientConfig};

use crate::cart::open_cart;

/// Contents of the `--order` file. Each block is passed through untouched.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct OrderDetails {
    #[serde(default)]
    pub customer: Value,
    #[serde(default)]
    pub delivery: Value,
    #[serde(default)]
    pub payment: Value,
}

/// Read the order file and check out the local cart.
///
/// The local cart is cleared only after the server accepts the order.
///
/// # Errors
///
/// Returns an error if the order file is unreadable, the cart is empty, or
/// any step of reconciliation or checkout fails.
pub(crate) async fn run_checkout(config: &AppConfig, order_path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(order_path)
        .with_context(|| format!("reading order file {}", order_path.display()))?;
    let details: OrderDetails = serde_json::from_str(&raw)
        .with_context(|| format!("parsing order file {}", order_path.display()))?;

    let mut cart = open_cart(config);
    if cart.is_empty() {
        bail!("cart is empty; add products with `tornillo cart add <ID>`");
    }

    let payload = CheckoutPayload::from_cart(
        &cart,
        config.default_tax_rate,
        config.shipping_flat,
        details.customer,
        details.delivery,
        details.payment,
    );
    println!(
        "subtotal {:.2}  tax {:.2}  shipping {:.2}  total {:.2}",
        payload.summary.subtotal,
        payload.summary.tax,
        payload.summary.shipping,
        payload.summary.total
    );

    let client = SalesClient::new(&SalesClientConfig::from_app_config(config))?;
    let reconciler = Reconciler::new(client).with_default_tax_rate(config.default_tax_rate);
    let receipt = reconciler
        .place_order(&payload)
        .await
        .context("checkout failed; your local cart is unchanged")?;

    cart.clear();
    println!("{}", serde_json::to_string_pretty(&receipt)?);
    Ok(())
}
