use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::money::to_price;

/// The product snapshot a cart line holds: enough to render the line and to
/// price it at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog identifier, stable across sessions. Numeric ids from the API
    /// are stored as strings.
    pub id: String,
    pub name: String,
    /// Unit price, currency-agnostic, never negative.
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    /// Image reference, rendered by the UI; the cart does not own it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Product {
    /// Creates a product snapshot, clamping a negative price to zero.
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            image: None,
        }
        .normalized()
    }

    /// Sets the image reference.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        let image = image.into();
        self.image = (!image.is_empty()).then_some(image);
        self
    }

    /// Reads a product from untyped JSON.
    ///
    /// Returns `None` only when no usable id is present. `id` may be a string
    /// or a number; `name` defaults to empty; `price` goes through
    /// [`to_price`]; `image` is kept when it is a non-empty string.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = id_from_value(obj.get("id")?)?;

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let price = obj.get("price").map_or(Decimal::ZERO, to_price);
        let image = obj
            .get("image")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        Some(Self {
            id,
            name,
            price,
            image,
        })
    }

    /// Trims the id and clamps a negative price to zero.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let trimmed = self.id.trim();
        if trimmed.len() != self.id.len() {
            self.id = trimmed.to_owned();
        }
        self.price = self.price.max(Decimal::ZERO);
        self
    }
}

/// Reads an identifier that may arrive as a JSON string or number.
///
/// Empty or whitespace-only strings are not identifiers.
#[must_use]
pub fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
