//! Domain core of the Tornillo Feliz storefront client: the device-local
//! cart, its persistence, checkout payloads and configuration.

pub mod app_config;
pub mod cart;
pub mod config;
pub mod error;
pub mod money;
pub mod order;
pub mod persistence;
pub mod products;

pub use app_config::{AppConfig, Environment};
pub use cart::{CartLineItem, CartStore, SubscriptionId};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, PersistenceError};
pub use money::{parse_quantity, to_number, to_price, to_quantity};
pub use order::{CheckoutItem, CheckoutPayload, CheckoutRequest, CheckoutSummary, OrderSummary};
pub use persistence::{
    decode_cart, encode_cart, CartStorage, FileCartStorage, MemoryCartStorage, CART_STORAGE_KEY,
};
pub use products::{id_from_value, Product};
