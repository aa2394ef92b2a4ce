use thiserror::Error;

/// Errors returned by the sales API client and the checkout reconciler.
#[derive(Debug, Error)]
pub enum SalesError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// HTTP 401 or 403.
    #[error("not authorized for {url} (HTTP {status})")]
    Unauthorized { status: u16, url: String },

    #[error("not found: {url}")]
    NotFound { url: String },

    /// The backend refused the request (stock unavailable, invalid payment,
    /// validation failure). Carries the server's message when it sent one.
    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// Another checkout is already running on this reconciler.
    #[error("a checkout is already in progress for this cart")]
    CheckoutInProgress,
}
