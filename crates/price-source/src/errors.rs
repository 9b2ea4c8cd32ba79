//! Error types for the price source crate.

use thiserror::Error;

/// Errors that can occur while querying the price-discovery API.
#[derive(Error, Debug)]
pub enum PriceSourceError {
    /// The API rate limited the request (HTTP 429/403).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request timed out at the HTTP client level.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider answered with a non-success status or an error body.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        /// The provider that sent the response
        provider: String,
        /// What was wrong with it
        message: String,
    },

    /// The request could not be built (bad base URL, empty barcode).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A network error occurred while communicating with the provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl PriceSourceError {
    /// Returns true when a later attempt could plausibly succeed.
    ///
    /// Nothing in this crate retries; the flag is informational for callers
    /// deciding how loudly to log.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PriceSourceError::RateLimited { .. }
                | PriceSourceError::Timeout { .. }
                | PriceSourceError::Network(_)
        )
    }
}
