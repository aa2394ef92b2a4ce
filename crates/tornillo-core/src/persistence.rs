//! Device-local persistence for the cart.
//!
//! The cart is stored as one JSON array under [`CART_STORAGE_KEY`]:
//!
//! ```json
//! [{"product": {"id": "p1", "name": "Martillo", "price": 10.0}, "quantity": 2}]
//! ```
//!
//! Reads are tolerant: anything that does not match this layout is dropped
//! element by element, and a wholly unreadable value means an empty cart.
//! Writes are best-effort; [`crate::CartStore`] logs failures and moves on.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use crate::cart::CartLineItem;
use crate::error::PersistenceError;
use crate::money::to_quantity;
use crate::products::Product;

/// Fixed key the cart is stored under.
pub const CART_STORAGE_KEY: &str = "tornillo.cart";

/// A string key-value store local to the device.
pub trait CartStorage {
    /// Returns the value stored under `key`, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the backend cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Replaces the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the backend cannot be written.
    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

impl<S: CartStorage + ?Sized> CartStorage for &S {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        (**self).write(key, value)
    }
}

/// Stores each key as `<dir>/<key>.json`. The directory is created on the
/// first write.
#[derive(Debug, Clone)]
pub struct FileCartStorage {
    dir: PathBuf,
}

impl FileCartStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CartStorage for FileCartStorage {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir)?;
        // Write-then-rename so a crash mid-write leaves the previous cart.
        let target = self.path_for(key);
        let staging = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&staging, value)?;
        fs::rename(&staging, &target)?;
        Ok(())
    }
}

/// In-process storage, for tests and sessions that should not touch disk.
#[derive(Debug, Default)]
pub struct MemoryCartStorage {
    entries: Mutex<Vec<(String, String)>>,
}

impl MemoryCartStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `value` under `key`.
    pub fn with_entry(key: &str, value: impl Into<String>) -> Self {
        Self {
            entries: Mutex::new(vec![(key.to_owned(), value.into())]),
        }
    }
}

impl CartStorage for MemoryCartStorage {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory store poisoned".to_owned()))?;
        Ok(entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone()))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory store poisoned".to_owned()))?;
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => value.clone_into(&mut entry.1),
            None => entries.push((key.to_owned(), value.to_owned())),
        }
        Ok(())
    }
}

/// Serializes the full line list in the persisted layout.
///
/// # Errors
///
/// Returns [`PersistenceError::Encode`] if serialization fails.
pub fn encode_cart(items: &[CartLineItem]) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(items)?)
}

/// Parses a persisted cart, dropping anything malformed. Never fails.
///
/// Lines that repeat a product id are merged into the first occurrence.
#[must_use]
pub fn decode_cart(raw: &str) -> Vec<CartLineItem> {
    let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(raw) else {
        tracing::debug!("persisted cart is not a JSON array; starting empty");
        return Vec::new();
    };

    let mut items: Vec<CartLineItem> = Vec::with_capacity(entries.len());
    for entry in &entries {
        let Some(line) = decode_line(entry) else {
            tracing::debug!(%entry, "dropping malformed persisted cart line");
            continue;
        };
        match items.iter_mut().find(|l| l.product.id == line.product.id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
            }
            None => items.push(line),
        }
    }
    items
}

fn decode_line(entry: &Value) -> Option<CartLineItem> {
    let product = Product::from_value(entry.get("product")?)?;
    let quantity = entry.get("quantity").map_or(1, to_quantity);
    Some(CartLineItem { product, quantity })
}
