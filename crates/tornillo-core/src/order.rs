//! Checkout payload types.
//!
//! A [`CheckoutPayload`] is what the UI hands to the reconciler: the cart
//! lines with the prices the shopper saw, the displayed summary and three
//! opaque blocks. The request actually sent to the checkout endpoint is a
//! [`CheckoutRequest`], whose summary type has no `total` field: the server
//! computes the charged total from its own lines.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cart::CartStore;
use crate::persistence::CartStorage;

/// One cart line as submitted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: String,
    pub quantity: u32,
    /// Price captured from the local cart at submission time.
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

/// The totals the shopper was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping: Decimal,
    /// Display only. Never transmitted; see [`CheckoutSummary`].
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

impl OrderSummary {
    /// Builds a summary from a subtotal, a tax rate in percent and a flat
    /// shipping amount. Tax is rounded to cents, half away from zero. Amounts
    /// past [`Decimal::MAX`] saturate.
    #[must_use]
    pub fn compute(subtotal: Decimal, tax_rate_percent: u32, shipping: Decimal) -> Self {
        let tax = subtotal.saturating_mul(Decimal::from(tax_rate_percent)) / Decimal::ONE_HUNDRED;
        let tax = tax.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Self {
            subtotal,
            tax,
            shipping,
            total: subtotal.saturating_add(tax).saturating_add(shipping),
        }
    }

    /// The summary as transmitted, without `total`.
    #[must_use]
    pub fn without_total(&self) -> CheckoutSummary {
        CheckoutSummary {
            subtotal: self.subtotal,
            tax: self.tax,
            shipping: self.shipping,
        }
    }
}

/// Summary block of the checkout request. Deliberately has no `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckoutSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping: Decimal,
}

/// Everything the reconciler needs to place an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutPayload {
    pub items: Vec<CheckoutItem>,
    pub summary: OrderSummary,
    #[serde(default)]
    pub customer: Value,
    #[serde(default)]
    pub delivery: Value,
    #[serde(default)]
    pub payment: Value,
}

impl CheckoutPayload {
    /// Snapshots `cart` and computes its summary.
    pub fn from_cart<S: CartStorage>(
        cart: &CartStore<S>,
        tax_rate_percent: u32,
        shipping: Decimal,
        customer: Value,
        delivery: Value,
        payment: Value,
    ) -> Self {
        Self {
            items: cart.to_checkout_items(),
            summary: OrderSummary::compute(cart.total(), tax_rate_percent, shipping),
            customer,
            delivery,
            payment,
        }
    }

    /// Builds the body for the checkout endpoint.
    #[must_use]
    pub fn to_request(&self) -> CheckoutRequest {
        CheckoutRequest {
            customer: self.customer.clone(),
            delivery: self.delivery.clone(),
            payment: self.payment.clone(),
            summary: self.summary.without_total(),
        }
    }
}

/// Body of `POST /sales/cart/checkout`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutRequest {
    pub customer: Value,
    pub delivery: Value,
    pub payment: Value,
    pub summary: CheckoutSummary,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;
    use crate::persistence::MemoryCartStorage;
    use crate::products::Product;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn compute_rounds_tax_to_cents() {
        let summary = OrderSummary::compute(dec("10.05"), 12, dec("3"));
        // 10.05 * 0.12 = 1.206
        assert_eq!(summary.tax, dec("1.21"));
        assert_eq!(summary.total, dec("14.26"));
    }

    #[test]
    fn compute_with_empty_cart_is_all_zero_except_shipping() {
        let summary = OrderSummary::compute(Decimal::ZERO, 12, dec("2.50"));
        assert_eq!(summary.tax, Decimal::ZERO);
        assert_eq!(summary.total, dec("2.50"));
    }

    #[test]
    fn request_summary_never_contains_total() {
        for (subtotal, tax, shipping, total) in [
            ("0", "0", "0", "0"),
            ("25", "3", "0", "28"),
            ("99.99", "12.00", "5", "999"),
        ] {
            let payload = CheckoutPayload {
                items: Vec::new(),
                summary: OrderSummary {
                    subtotal: dec(subtotal),
                    tax: dec(tax),
                    shipping: dec(shipping),
                    total: dec(total),
                },
                customer: json!({"name": "Ana"}),
                delivery: json!({"total": "not the summary"}),
                payment: json!(null),
            };
            let body = serde_json::to_value(payload.to_request()).unwrap();
            let summary = body["summary"].as_object().unwrap();
            assert!(!summary.contains_key("total"), "summary leaked total: {body}");
            assert_eq!(summary.len(), 3);
            // Opaque blocks pass through untouched.
            assert_eq!(body["delivery"], json!({"total": "not the summary"}));
        }
    }

    #[test]
    fn from_cart_snapshots_lines_and_summary() {
        let mut cart = CartStore::new(MemoryCartStorage::new());
        cart.add(Product::new("p1", "Martillo", dec("10")), 2);
        cart.add(Product::new("p2", "Clavos", dec("5")), 1);

        let payload =
            CheckoutPayload::from_cart(&cart, 12, Decimal::ZERO, json!({}), json!({}), json!({}));
        assert_eq!(payload.items.len(), 2);
        assert_eq!(payload.summary.subtotal, dec("25"));
        assert_eq!(payload.summary.tax, dec("3.00"));
        assert_eq!(payload.summary.total, dec("28.00"));
    }

    #[test]
    fn checkout_item_uses_camel_case() {
        let item = CheckoutItem {
            product_id: "p1".to_owned(),
            quantity: 2,
            unit_price: dec("10.5"),
        };
        assert_eq!(
            serde_json::to_value(item).unwrap(),
            json!({"productId": "p1", "quantity": 2, "unitPrice": 10.5})
        );
    }

    #[test]
    fn compute_saturates_on_out_of_range_subtotals() {
        let summary = OrderSummary::compute(Decimal::MAX, 12, dec("4.99"));
        assert_eq!(summary.total, Decimal::MAX);
        assert!(summary.tax > Decimal::ZERO);
        assert_eq!(summary.without_total().subtotal, Decimal::MAX);
    }
}
