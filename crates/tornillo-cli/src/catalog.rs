//! `catalog` command: print one page of products.

use tornillo_core::AppConfig;
use tornillo_sales::{SalesClient, SalesClientConfig};

/// Fetch and print a catalog page.
///
/// # Errors
///
/// Returns an error if the client cannot be built or the request fails.
pub(crate) async fn run_catalog(
    config: &AppConfig,
    page: u32,
    limit: u32,
    search: Option<&str>,
) -> anyhow::Result<()> {
    let client = SalesClient::new(&SalesClientConfig::from_app_config(config))?;
    let result = client.list_products(page.max(1), limit.max(1), search).await?;

    if result.items.is_empty() {
        println!("no products on page {page}");
        return Ok(());
    }

    println!("{:<12}{:>10}  {:<8}NAME", "ID", "PRICE", "STOCK");
    for product in &result.items {
        let stock = product
            .stock
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        let name = if product.name.chars().count() > 48 {
            format!("{}...", product.name.chars().take(48).collect::<String>())
        } else {
            product.name.clone()
        };
        println!(
            "{:<12}{:>10.2}  {:<8}{}",
            product.id,
            product.price(),
            stock,
            name
        );
    }

    if result.has_more(page, limit) {
        println!("more products: --page {}", page + 1);
    }
    Ok(())
}
