//! Client for the Tornillo Feliz sales and catalog API, and the checkout
//! reconciler that keeps the server cart in step with the local one.

pub mod client;
pub mod error;
pub mod reconcile;
pub(crate) mod retry;
pub mod types;

pub use client::{SalesClient, SalesClientConfig};
pub use error::SalesError;
pub use reconcile::{
    infer_tax_rate, plan_reconciliation, CartApi, CartOp, ReconcilePlan, ReconcileReport,
    Reconciler, DEFAULT_TAX_RATE,
};
pub use types::{CatalogPage, CatalogProduct, ServerCart, ServerCartItem};
