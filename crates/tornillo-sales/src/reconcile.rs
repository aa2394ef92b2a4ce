//! Checkout reconciliation: make the server cart match the local cart, then
//! check out.
//!
//! The diff is computed from scratch on every pass against a freshly fetched
//! server cart, so re-running after a partial failure converges further
//! instead of re-applying deltas. All calls are awaited one after another.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use tornillo_core::{CheckoutItem, CheckoutPayload, CheckoutRequest, OrderSummary};

use crate::error::SalesError;
use crate::types::ServerCart;

/// Tax percentage used when none can be inferred from the summary.
pub const DEFAULT_TAX_RATE: u32 = 12;

/// The remote cart operations the reconciler needs.
#[allow(async_fn_in_trait)]
pub trait CartApi {
    /// Create-or-fetch the server cart with the given tax rate. Idempotent.
    async fn ensure_cart(&self, tax_rate: u32) -> Result<ServerCart, SalesError>;

    async fn get_cart(&self) -> Result<ServerCart, SalesError>;

    /// Line mutations resolve to the updated cart when the server returns
    /// one, or `None` for a bare acknowledgement.
    async fn add_item(&self, product_id: &str, qty: u32)
        -> Result<Option<ServerCart>, SalesError>;

    /// Sets an absolute quantity.
    async fn update_item(
        &self,
        product_id: &str,
        qty: u32,
    ) -> Result<Option<ServerCart>, SalesError>;

    async fn remove_item(&self, product_id: &str) -> Result<Option<ServerCart>, SalesError>;

    async fn checkout(&self, request: &CheckoutRequest) -> Result<Value, SalesError>;
}

impl<T: CartApi + ?Sized> CartApi for &T {
    async fn ensure_cart(&self, tax_rate: u32) -> Result<ServerCart, SalesError> {
        (**self).ensure_cart(tax_rate).await
    }

    async fn get_cart(&self) -> Result<ServerCart, SalesError> {
        (**self).get_cart().await
    }

    async fn add_item(
        &self,
        product_id: &str,
        qty: u32,
    ) -> Result<Option<ServerCart>, SalesError> {
        (**self).add_item(product_id, qty).await
    }

    async fn update_item(
        &self,
        product_id: &str,
        qty: u32,
    ) -> Result<Option<ServerCart>, SalesError> {
        (**self).update_item(product_id, qty).await
    }

    async fn remove_item(&self, product_id: &str) -> Result<Option<ServerCart>, SalesError> {
        (**self).remove_item(product_id).await
    }

    async fn checkout(&self, request: &CheckoutRequest) -> Result<Value, SalesError> {
        (**self).checkout(request).await
    }
}

/// One remote call needed to converge the server cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOp {
    /// The product is on the server with a different quantity.
    Update { product_id: String, qty: u32 },
    /// The product is missing on the server.
    Add { product_id: String, qty: u32 },
    /// The product is on the server but not in the local cart.
    Remove { product_id: String },
}

/// Result of diffing a local cart against a server cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Updates and adds in local order, then removals in server order.
    pub ops: Vec<CartOp>,
    /// Local products whose server quantity already matches.
    pub unchanged: Vec<String>,
}

impl ReconcilePlan {
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.ops.is_empty()
    }
}

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub cart_id: String,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl ReconcileReport {
    /// Number of mutating calls issued.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.added + self.updated + self.removed
    }
}

/// Diffs `local` against `server`.
///
/// Local lines that share a product id are summed first, so each id yields
/// at most one operation.
#[must_use]
pub fn plan_reconciliation(local: &[CheckoutItem], server: &ServerCart) -> ReconcilePlan {
    let mut wanted: Vec<(&str, u32)> = Vec::with_capacity(local.len());
    for item in local {
        match wanted.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, qty)) => *qty = qty.saturating_add(item.quantity),
            None => wanted.push((item.product_id.as_str(), item.quantity)),
        }
    }

    let mut remote: HashMap<&str, u32> = server.quantities();
    let mut plan = ReconcilePlan::default();

    for (product_id, qty) in wanted {
        match remote.remove(product_id) {
            Some(current) if current == qty => plan.unchanged.push(product_id.to_owned()),
            Some(_) => plan.ops.push(CartOp::Update {
                product_id: product_id.to_owned(),
                qty,
            }),
            None => plan.ops.push(CartOp::Add {
                product_id: product_id.to_owned(),
                qty,
            }),
        }
    }

    // Leftovers, in server order, once per id.
    let mut seen = HashSet::new();
    for item in &server.items {
        let id = item.product_id.as_str();
        if remote.contains_key(id) && seen.insert(id) {
            plan.ops.push(CartOp::Remove {
                product_id: id.to_owned(),
            });
        }
    }

    plan
}

/// Infers the tax percentage from a summary: `round(tax / max(1, subtotal) * 100)`,
/// half away from zero. A zero, negative or unrepresentable result gives
/// `fallback`.
#[must_use]
pub fn infer_tax_rate(summary: &OrderSummary, fallback: u32) -> u32 {
    let denominator = summary.subtotal.max(Decimal::ONE);
    summary
        .tax
        .checked_div(denominator)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|pct| pct.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|pct| pct.to_u32())
        .filter(|&rate| rate > 0)
        .unwrap_or(fallback)
}

/// Drives reconciliation and checkout against a [`CartApi`].
///
/// At most one pass runs at a time per reconciler; a concurrent call fails
/// with [`SalesError::CheckoutInProgress`] without touching the network.
#[derive(Debug)]
pub struct Reconciler<A> {
    api: A,
    default_tax_rate: u32,
    in_flight: AtomicBool,
}

impl<A: CartApi> Reconciler<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            default_tax_rate: DEFAULT_TAX_RATE,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Overrides the fallback tax percentage.
    #[must_use]
    pub fn with_default_tax_rate(mut self, rate: u32) -> Self {
        self.default_tax_rate = rate;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Makes the server cart match `items` without checking out.
    ///
    /// # Errors
    ///
    /// [`SalesError::CheckoutInProgress`] if another pass is running, or the
    /// first error from any remote call. Earlier calls in the pass are not
    /// undone.
    pub async fn sync_cart(
        &self,
        items: &[CheckoutItem],
        tax_rate: u32,
    ) -> Result<ReconcileReport, SalesError> {
        let _guard = InFlight::acquire(&self.in_flight)?;
        self.converge(items, tax_rate).await
    }

    /// Reconciles the server cart with `payload.items` and checks out.
    ///
    /// Returns the server's receipt verbatim. The checkout request never
    /// carries the summary's `total`.
    ///
    /// # Errors
    ///
    /// [`SalesError::CheckoutInProgress`] if another pass is running, or the
    /// first error from any remote call, including a checkout rejection.
    /// Nothing is retried at this level; calling again re-derives the diff.
    pub async fn place_order(&self, payload: &CheckoutPayload) -> Result<Value, SalesError> {
        let _guard = InFlight::acquire(&self.in_flight)?;

        let tax_rate = infer_tax_rate(&payload.summary, self.default_tax_rate);
        let report = self.converge(&payload.items, tax_rate).await?;

        let receipt = self.api.checkout(&payload.to_request()).await?;
        tracing::info!(
            cart_id = %report.cart_id,
            tax_rate,
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            "checkout submitted"
        );
        Ok(receipt)
    }

    async fn converge(
        &self,
        items: &[CheckoutItem],
        tax_rate: u32,
    ) -> Result<ReconcileReport, SalesError> {
        let ensured = self.api.ensure_cart(tax_rate).await?;
        let server = self.api.get_cart().await?;
        if server.cart_id != ensured.cart_id {
            tracing::debug!(
                ensured = %ensured.cart_id,
                fetched = %server.cart_id,
                "server returned a different cart id on fetch"
            );
        }

        let plan = plan_reconciliation(items, &server);
        let mut report = ReconcileReport {
            cart_id: server.cart_id.clone(),
            unchanged: plan.unchanged.len(),
            ..ReconcileReport::default()
        };

        for op in &plan.ops {
            match op {
                CartOp::Update { product_id, qty } => {
                    self.api.update_item(product_id, *qty).await?;
                    report.updated += 1;
                }
                CartOp::Add { product_id, qty } => {
                    self.api.add_item(product_id, *qty).await?;
                    report.added += 1;
                }
                CartOp::Remove { product_id } => {
                    self.api.remove_item(product_id).await?;
                    report.removed += 1;
                }
            }
        }

        tracing::debug!(
            cart_id = %report.cart_id,
            calls = report.calls(),
            unchanged = report.unchanged,
            "server cart reconciled"
        );
        Ok(report)
    }
}

/// Holds the in-flight flag for the duration of a pass.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SalesError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SalesError::CheckoutInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
