//! Price source errors as seen by the core.

use thiserror::Error;

use pricewatch_price_source::PriceSourceError as ExternalPriceSourceError;

/// Bridges the price-source crate's errors into the core error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceSourceError {
    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<ExternalPriceSourceError> for PriceSourceError {
    fn from(err: ExternalPriceSourceError) -> Self {
        match err {
            ExternalPriceSourceError::RateLimited { provider } => PriceSourceError::RateLimited(provider),
            ExternalPriceSourceError::Timeout { provider } => PriceSourceError::Timeout(provider),
            ExternalPriceSourceError::ProviderError { provider, message } => {
                PriceSourceError::Provider(format!("{}: {}", provider, message))
            }
            ExternalPriceSourceError::InvalidResponse { provider, message } => {
                PriceSourceError::InvalidResponse(format!("{}: {}", provider, message))
            }
            ExternalPriceSourceError::InvalidRequest(message) => {
                PriceSourceError::InvalidRequest(message)
            }
            ExternalPriceSourceError::Network(e) => PriceSourceError::Provider(e.to_string()),
        }
    }
}
