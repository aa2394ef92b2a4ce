//! Sales and catalog API wire types.
//!
//! Field names are camelCase on the wire. Identifiers may arrive as JSON
//! strings or numbers and are always held as `String`.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tornillo_core::{id_from_value, to_price, Product};

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    id_from_value(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a string or numeric id, got {raw}")))
}

// ---------------------------------------------------------------------------
// /sales/cart
// ---------------------------------------------------------------------------

/// The server-held cart, as returned by every `/sales/cart*` endpoint except
/// checkout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCart {
    #[serde(deserialize_with = "de_id")]
    pub cart_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub items: Vec<ServerCartItem>,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default)]
    pub tax: Option<Decimal>,
    #[serde(default)]
    pub total: Option<Decimal>,
}

impl ServerCart {
    /// `productId -> quantity` for every server line. Lines that repeat an id
    /// are summed, saturating at `u32::MAX`.
    #[must_use]
    pub fn quantities(&self) -> HashMap<&str, u32> {
        let mut map: HashMap<&str, u32> = HashMap::with_capacity(self.items.len());
        for item in &self.items {
            let qty = map.entry(item.product_id.as_str()).or_default();
            *qty = qty.saturating_add(item.quantity);
        }
        map
    }
}

/// One server cart line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCartItem {
    #[serde(deserialize_with = "de_id")]
    pub product_id: String,
    #[serde(alias = "qty")]
    pub quantity: u32,
}

/// Body of `POST /sales/cart`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EnsureCartBody {
    pub tax_rate: u32,
}

/// Body of `POST` and `PUT /sales/cart/items`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CartItemBody<'a> {
    pub product_id: &'a str,
    pub qty: u32,
}

// ---------------------------------------------------------------------------
// /catalog/products
// ---------------------------------------------------------------------------

/// A catalog product as listed by the backend.
///
/// `price` is kept untyped and read through [`to_price`], so a bad price on
/// one product never fails the whole page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogProduct {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Value,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub stock: Option<i64>,
}

impl CatalogProduct {
    /// Normalized unit price.
    #[must_use]
    pub fn price(&self) -> Decimal {
        to_price(&self.price)
    }

    /// `true` unless the backend reported a stock of zero or less.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.stock.is_none_or(|s| s > 0)
    }

    /// The snapshot a cart line keeps for this product.
    #[must_use]
    pub fn to_cart_product(&self) -> Product {
        let product = Product::new(self.id.clone(), self.name.clone(), self.price());
        match &self.image {
            Some(image) => product.with_image(image.clone()),
            None => product,
        }
    }
}

/// One page of the catalog.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogPage {
    #[serde(alias = "data", alias = "products")]
    pub items: Vec<CatalogProduct>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    /// Total number of products across all pages, when the backend reports it.
    #[serde(default)]
    pub total: Option<u64>,
}

impl CatalogPage {
    /// Whether a page after this one may exist.
    ///
    /// Without a reported total, a full page is taken to mean "maybe more".
    #[must_use]
    pub fn has_more(&self, requested_page: u32, requested_limit: u32) -> bool {
        let limit = u64::from(self.limit.unwrap_or(requested_limit));
        let page = u64::from(self.page.unwrap_or(requested_page));
        match self.total {
            Some(total) => page.saturating_mul(limit) < total,
            None => self.items.len() as u64 >= limit && limit > 0,
        }
    }
}

/// The catalog endpoint answers either with a page envelope or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CatalogResponse {
    Paged(CatalogPage),
    Bare(Vec<CatalogProduct>),
}

impl CatalogResponse {
    pub(crate) fn into_page(self, page: u32, limit: u32) -> CatalogPage {
        match self {
            CatalogResponse::Paged(p) => p,
            CatalogResponse::Bare(items) => CatalogPage {
                items,
                page: Some(page),
                limit: Some(limit),
                total: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    #[test]
    fn server_cart_accepts_numeric_ids_and_qty_alias() {
        let cart: ServerCart = serde_json::from_value(json!({
            "cartId": 7,
            "status": "OPEN",
            "items": [
                {"productId": 12, "quantity": 2},
                {"productId": "p3", "qty": 1}
            ],
            "subtotal": "25.00",
            "tax": 3
        }))
        .unwrap();
        assert_eq!(cart.cart_id, "7");
        assert_eq!(cart.items[0].product_id, "12");
        assert_eq!(cart.items[1].quantity, 1);
        assert_eq!(cart.subtotal, Some(Decimal::from_str("25.00").unwrap()));
        assert_eq!(cart.tax, Some(Decimal::from(3)));
        assert!(cart.total.is_none());
    }

    #[test]
    fn server_cart_tolerates_missing_items() {
        let cart: ServerCart = serde_json::from_value(json!({"cartId": "c1"})).unwrap();
        assert!(cart.items.is_empty());
        assert!(cart.quantities().is_empty());
    }

    #[test]
    fn server_cart_rejects_missing_product_id() {
        let result = serde_json::from_value::<ServerCart>(json!({
            "cartId": "c1",
            "items": [{"productId": null, "quantity": 1}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn quantities_maps_product_ids() {
        let cart: ServerCart = serde_json::from_value(json!({
            "cartId": "c1",
            "items": [{"productId": "p2", "quantity": 3}, {"productId": "p3", "quantity": 1}]
        }))
        .unwrap();
        let map = cart.quantities();
        assert_eq!(map.get("p2"), Some(&3));
        assert_eq!(map.get("p3"), Some(&1));
    }

    #[test]
    fn quantities_sums_repeated_product_ids() {
        let cart: ServerCart = serde_json::from_value(json!({
            "cartId": "c1",
            "items": [
                {"productId": "p2", "quantity": 2},
                {"productId": "p3", "quantity": 1},
                {"productId": "p2", "qty": 1}
            ]
        }))
        .unwrap();
        let map = cart.quantities();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("p2"), Some(&3));
    }

    #[test]
    fn catalog_product_normalizes_price_at_the_boundary() {
        let product: CatalogProduct =
            serde_json::from_value(json!({"id": 5, "name": "Taladro", "price": "abc"})).unwrap();
        assert_eq!(product.price(), Decimal::ZERO);
        let snapshot = product.to_cart_product();
        assert_eq!(snapshot.id, "5");
        assert_eq!(snapshot.name, "Taladro");
    }

    #[test]
    fn catalog_response_accepts_bare_arrays() {
        let response: CatalogResponse =
            serde_json::from_value(json!([{"id": "a", "price": 1}])).unwrap();
        let page = response.into_page(2, 10);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.page, Some(2));
        assert!(!page.has_more(2, 10));
    }

    #[test]
    fn has_more_uses_reported_total() {
        let page: CatalogPage = serde_json::from_value(json!({
            "data": [{"id": "a"}],
            "page": 1,
            "limit": 1,
            "total": 3
        }))
        .unwrap();
        assert!(page.has_more(1, 1));
    }

    #[test]
    fn in_stock_treats_missing_stock_as_available() {
        let mut product: CatalogProduct = serde_json::from_value(json!({"id": "a"})).unwrap();
        assert!(product.in_stock());
        product.stock = Some(0);
        assert!(!product.in_stock());
    }
}
