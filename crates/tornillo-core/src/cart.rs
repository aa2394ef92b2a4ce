//! The cart store: sole owner and mutator of the device-local cart.
//!
//! Lines are keyed by product id (at most one line per id) and always carry
//! `quantity >= 1`. Aggregates are recomputed from the lines on every read.
//! After each state change the store persists the full line list through its
//! [`CartStorage`] and notifies subscribers.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::money::to_quantity;
use crate::order::CheckoutItem;
use crate::persistence::{decode_cart, encode_cart, CartStorage, CART_STORAGE_KEY};
use crate::products::Product;

/// One product and how many units of it are in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub product: Product,
    /// Always at least 1. A request to go below 1 is a removal, never a
    /// zero-quantity line.
    pub quantity: u32,
}

impl CartLineItem {
    /// `price * quantity` for this line, saturating at [`Decimal::MAX`].
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// Handle returned by [`CartStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(&[CartLineItem]) + Send + Sync>;

/// In-memory cart backed by best-effort persistence.
pub struct CartStore<S> {
    items: Vec<CartLineItem>,
    storage: S,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl<S> fmt::Debug for CartStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartStore")
            .field("items", &self.items)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl<S: CartStorage> CartStore<S> {
    /// Creates an empty store without reading `storage`.
    pub fn new(storage: S) -> Self {
        Self {
            items: Vec::new(),
            storage,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Creates a store and loads it once from `storage`.
    ///
    /// A read failure or unreadable data starts the cart empty.
    pub fn hydrate(storage: S) -> Self {
        let items = match storage.read(CART_STORAGE_KEY) {
            Ok(Some(raw)) => decode_cart(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read persisted cart; starting empty");
                Vec::new()
            }
        };
        tracing::debug!(lines = items.len(), "cart hydrated");

        let mut store = Self::new(storage);
        store.items = items;
        store
    }

    /// Adds `qty` units of `product`, merging into an existing line for the
    /// same id. A `qty` of 0 is read as 1.
    ///
    /// Not idempotent: adding the same product twice yields two units.
    pub fn add(&mut self, product: Product, qty: u32) {
        let product = product.normalized();
        let qty = qty.max(1);

        match self.items.iter_mut().find(|l| l.product.id == product.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(qty),
            None => self.items.push(CartLineItem {
                product,
                quantity: qty,
            }),
        }
        self.changed();
    }

    /// Adds a product described by untyped JSON, normalizing every field.
    ///
    /// Returns `false` and leaves the cart untouched when `product` has no
    /// usable id.
    pub fn add_value(&mut self, product: &Value, qty: &Value) -> bool {
        let Some(product) = Product::from_value(product) else {
            tracing::debug!(%product, "ignoring add for product without id");
            return false;
        };
        self.add(product, to_quantity(qty));
        true
    }

    /// Removes the line for `product_id`. Returns `false` if there was none.
    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|l| l.product.id != product_id);
        let removed = self.items.len() != before;
        if removed {
            self.changed();
        }
        removed
    }

    /// Adds one unit to the line for `product_id`, if any.
    pub fn increase_qty(&mut self, product_id: &str) {
        self.update_line(product_id, |q| q.saturating_add(1));
    }

    /// Takes one unit from the line for `product_id`, stopping at 1.
    ///
    /// Never removes the line; removal is [`CartStore::remove`].
    pub fn decrease_qty(&mut self, product_id: &str) {
        self.update_line(product_id, |q| q.saturating_sub(1).max(1));
    }

    /// Sets the quantity of the line for `product_id` to `max(1, qty)`.
    pub fn set_qty(&mut self, product_id: &str, qty: u32) {
        self.update_line(product_id, |_| qty.max(1));
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.items.clear();
        self.changed();
    }

    /// `sum(price * quantity)` over all lines, saturating at [`Decimal::MAX`].
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(CartLineItem::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// `sum(quantity)` over all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|l| u64::from(l.quantity)).sum()
    }

    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    #[must_use]
    pub fn line(&self, product_id: &str) -> Option<&CartLineItem> {
        self.items.iter().find(|l| l.product.id == product_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Snapshots the lines as checkout items, capturing the current prices.
    #[must_use]
    pub fn to_checkout_items(&self) -> Vec<CheckoutItem> {
        self.items
            .iter()
            .map(|l| CheckoutItem {
                product_id: l.product.id.clone(),
                quantity: l.quantity,
                unit_price: l.product.price,
            })
            .collect()
    }

    /// Registers `listener` to be called with the lines after every change.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&[CartLineItem]) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Drops a listener. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn update_line(&mut self, product_id: &str, f: impl FnOnce(u32) -> u32) {
        let Some(line) = self.items.iter_mut().find(|l| l.product.id == product_id) else {
            return;
        };
        let next = f(line.quantity);
        if next == line.quantity {
            return;
        }
        line.quantity = next;
        self.changed();
    }

    fn changed(&self) {
        self.persist();
        for (_, listener) in &self.listeners {
            listener(&self.items);
        }
    }

    /// Best-effort: failures are logged, never returned.
    fn persist(&self) {
        let result =
            encode_cart(&self.items).and_then(|raw| self.storage.write(CART_STORAGE_KEY, &raw));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist cart; in-memory cart is unaffected");
        }
    }
}
