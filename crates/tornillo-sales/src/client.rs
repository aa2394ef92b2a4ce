//! HTTP client for the storefront's sales and catalog REST API.
//!
//! Wraps `reqwest` with typed responses, bearer-token auth and a mapping from
//! HTTP status to [`SalesError`]. Idempotent reads are retried with back-off;
//! cart line mutations and checkout are sent exactly once.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tornillo_core::{AppConfig, CheckoutRequest};

use crate::error::SalesError;
use crate::reconcile::CartApi;
use crate::retry::retry_with_backoff;
use crate::types::{
    CartItemBody, CatalogPage, CatalogProduct, CatalogResponse, EnsureCartBody, ServerCart,
};

const DEFAULT_USER_AGENT: &str = "tornillo/0.1 (storefront-client)";

/// Connection settings for [`SalesClient`].
#[derive(Clone)]
pub struct SalesClientConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Additional attempts for idempotent reads. `0` disables retries.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl SalesClientConfig {
    /// Settings for `base_url` with no token and no retries.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_retries: 0,
            backoff_base_ms: 0,
        }
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            api_token: config.api_token.clone(),
            timeout_secs: config.request_timeout_secs,
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
            backoff_base_ms: config.retry_backoff_base_ms,
        }
    }
}

impl std::fmt::Debug for SalesClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesClientConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[redacted]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .finish()
    }
}

/// Client for the sales and catalog endpoints.
///
/// Use [`SalesClient::new`] with full settings, or
/// [`SalesClient::with_base_url`] to point at a mock server in tests.
pub struct SalesClient {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl SalesClient {
    /// Creates a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SalesError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`SalesError::InvalidBaseUrl`] if
    /// `config.base_url` is not an absolute http(s) URL.
    pub fn new(config: &SalesClientConfig) -> Result<Self, SalesError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.as_str())
            .build()?;

        // Normalise: exactly one trailing slash so relative joins append to
        // the base path instead of replacing its last segment.
        let normalised = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| SalesError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(SalesError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: format!("unsupported scheme '{}'", base_url.scheme()),
            });
        }

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
        })
    }

    /// Creates a client with default settings and no retries.
    ///
    /// # Errors
    ///
    /// Same as [`SalesClient::new`].
    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Result<Self, SalesError> {
        let mut config = SalesClientConfig::new(base_url);
        config.timeout_secs = timeout_secs;
        Self::new(&config)
    }

    /// Creates or fetches the session's server cart with the given tax rate.
    ///
    /// # Errors
    ///
    /// Any [`SalesError`] from the request, after retries on transient failures.
    pub async fn ensure_cart(&self, tax_rate: u32) -> Result<ServerCart, SalesError> {
        let url = self.endpoint("sales/cart")?;
        let body = EnsureCartBody { tax_rate };
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.send_json(self.client.post(url.clone()).json(&body), &url)
        })
        .await
    }

    /// Fetches the current server cart.
    ///
    /// # Errors
    ///
    /// Any [`SalesError`] from the request, after retries on transient failures.
    pub async fn get_cart(&self) -> Result<ServerCart, SalesError> {
        let url = self.endpoint("sales/cart")?;
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.send_json(self.client.get(url.clone()), &url)
        })
        .await
    }

    /// Adds `qty` units of `product_id` to the server cart.
    ///
    /// # Errors
    ///
    /// Any [`SalesError`] from the request. Not retried.
    pub async fn add_item(
        &self,
        product_id: &str,
        qty: u32,
    ) -> Result<Option<ServerCart>, SalesError> {
        tracing::debug!(product_id, qty, "adding server cart line");
        let url = self.endpoint("sales/cart/items")?;
        let body = CartItemBody { product_id, qty };
        self.send_mutation(self.client.post(url.clone()).json(&body), &url)
            .await
    }

    /// Sets the server cart quantity of `product_id` to `qty`.
    ///
    /// # Errors
    ///
    /// Any [`SalesError`] from the request. Not retried.
    pub async fn update_item(
        &self,
        product_id: &str,
        qty: u32,
    ) -> Result<Option<ServerCart>, SalesError> {
        tracing::debug!(product_id, qty, "updating server cart line");
        let url = self.endpoint("sales/cart/items")?;
        let body = CartItemBody { product_id, qty };
        self.send_mutation(self.client.put(url.clone()).json(&body), &url)
            .await
    }

    /// Removes `product_id` from the server cart.
    ///
    /// # Errors
    ///
    /// Any [`SalesError`] from the request. Not retried.
    pub async fn remove_item(&self, product_id: &str) -> Result<Option<ServerCart>, SalesError> {
        tracing::debug!(product_id, "removing server cart line");
        let url = self.endpoint(&format!(
            "sales/cart/items/{}",
            utf8_percent_encode(product_id, NON_ALPHANUMERIC)
        ))?;
        self.send_mutation(self.client.delete(url.clone()), &url)
            .await
    }

    /// Submits the server cart for checkout and returns the receipt verbatim.
    ///
    /// Never retried: a second submission could place a second order.
    ///
    /// # Errors
    ///
    /// Any [`SalesError`] from the request; a backend refusal (stock, payment)
    /// is [`SalesError::Rejected`].
    pub async fn checkout(&self, request: &CheckoutRequest) -> Result<Value, SalesError> {
        let url = self.endpoint("sales/cart/checkout")?;
        self.send_json(self.client.post(url.clone()).json(request), &url)
            .await
    }

    /// Fetches one catalog page. `page` starts at 1.
    ///
    /// # Errors
    ///
    /// Any [`SalesError`] from the request, after retries on transient failures.
    pub async fn list_products(
        &self,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<CatalogPage, SalesError> {
        let mut url = self.endpoint("catalog/products")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page", &page.to_string());
            pairs.append_pair("limit", &limit.to_string());
            if let Some(q) = search.map(str::trim).filter(|q| !q.is_empty()) {
                pairs.append_pair("q", q);
            }
        }

        let response: CatalogResponse =
            retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
                self.send_json(self.client.get(url.clone()), &url)
            })
            .await?;
        Ok(response.into_page(page, limit))
    }

    /// Fetches a single catalog product.
    ///
    /// # Errors
    ///
    /// [`SalesError::NotFound`] for an unknown id, or any other
    /// [`SalesError`] from the request.
    pub async fn get_product(&self, product_id: &str) -> Result<CatalogProduct, SalesError> {
        let url = self.endpoint(&format!(
            "catalog/products/{}",
            utf8_percent_encode(product_id, NON_ALPHANUMERIC)
        ))?;
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.send_json(self.client.get(url.clone()), &url)
        })
        .await
    }

    fn endpoint(&self, path: &str) -> Result<Url, SalesError> {
        self.base_url
            .join(path)
            .map_err(|e| SalesError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: format!("cannot join '{path}': {e}"),
            })
    }

    /// Sends `request` and returns the body of a 2xx response. Non-2xx
    /// statuses map to typed errors.
    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<String, SalesError> {
        let request = match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, url, &body));
        }
        Ok(body)
    }

    /// Like [`Self::send`], parsing the body as JSON. An empty success body
    /// parses as `null`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<T, SalesError> {
        let body = self.send(request, url).await?;
        let body = if body.trim().is_empty() { "null" } else { &body };
        serde_json::from_str(body).map_err(|e| SalesError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }

    /// Sends a line mutation. Any 2xx counts as applied; the updated cart is
    /// returned only when the body is one.
    async fn send_mutation(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<Option<ServerCart>, SalesError> {
        let body = self.send(request, url).await?;
        let cart = serde_json::from_str::<ServerCart>(&body).ok();
        if cart.is_none() && !body.trim().is_empty() {
            tracing::debug!(url = %url, "mutation acknowledged without a cart body");
        }
        Ok(cart)
    }
}

impl CartApi for SalesClient {
    async fn ensure_cart(&self, tax_rate: u32) -> Result<ServerCart, SalesError> {
        SalesClient::ensure_cart(self, tax_rate).await
    }

    async fn get_cart(&self) -> Result<ServerCart, SalesError> {
        SalesClient::get_cart(self).await
    }

    async fn add_item(
        &self,
        product_id: &str,
        qty: u32,
    ) -> Result<Option<ServerCart>, SalesError> {
        SalesClient::add_item(self, product_id, qty).await
    }

    async fn update_item(
        &self,
        product_id: &str,
        qty: u32,
    ) -> Result<Option<ServerCart>, SalesError> {
        SalesClient::update_item(self, product_id, qty).await
    }

    async fn remove_item(&self, product_id: &str) -> Result<Option<ServerCart>, SalesError> {
        SalesClient::remove_item(self, product_id).await
    }

    async fn checkout(&self, request: &CheckoutRequest) -> Result<Value, SalesError> {
        SalesClient::checkout(self, request).await
    }
}

fn status_error(status: StatusCode, url: &Url, body: &str) -> SalesError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SalesError::Unauthorized {
            status: status.as_u16(),
            url: url.to_string(),
        },
        StatusCode::NOT_FOUND => SalesError::NotFound {
            url: url.to_string(),
        },
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            SalesError::Rejected {
                status: status.as_u16(),
                message: error_message(status, body),
            }
        }
        _ => SalesError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_string(),
        },
    }
}

/// Pulls a human-readable message out of an error body: `message`, `error`
/// or `error.message`, falling back to the raw text and then the status
/// reason.
fn error_message(status: StatusCode, body: &str) -> String {
    const MAX_RAW_LEN: usize = 200;

    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let found = json
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| json.get("error").and_then(Value::as_str))
            .or_else(|| {
                json.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
            });
        if let Some(msg) = found {
            return msg.to_owned();
        }
    }

    let raw = body.trim();
    if raw.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("request rejected")
            .to_owned();
    }
    raw.chars().take(MAX_RAW_LEN).collect()
}
