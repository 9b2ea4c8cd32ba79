//! Menor Preço price-discovery provider.
//!
//! Queries the public `/produtos` endpoint by barcode around a fixed
//! geohash, radius and period. One request per barcode, no pagination:
//! the endpoint returns the cheapest observations first and the pipeline
//! only needs a recent sample per product.

mod response;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::PriceSourceConfig;
use crate::errors::PriceSourceError;
use crate::models::{Observation, SearchParams};
use crate::provider::PriceProvider;

use response::{decode_observations, ErrorResponse};

pub(crate) const PROVIDER_ID: &str = "MENOR_PRECO";

/// HTTP client for the price-discovery API.
pub struct MenorPrecoProvider {
    client: Client,
    config: PriceSourceConfig,
}

impl MenorPrecoProvider {
    /// Create a provider with its own HTTP client.
    pub fn new(config: PriceSourceConfig) -> Result<Self, PriceSourceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Create a provider sharing an existing HTTP client.
    ///
    /// The shared client's own timeout applies.
    pub fn with_client(client: Client, config: PriceSourceConfig) -> Self {
        Self { client, config }
    }

    fn params_for(&self, barcode: &str) -> SearchParams {
        SearchParams {
            barcode: barcode.to_string(),
            locale: self.config.locale.clone(),
            radius_km: self.config.radius_km,
            period_days: self.config.period_days,
        }
    }

    async fn fetch(&self, params: &SearchParams) -> Result<String, PriceSourceError> {
        debug!("{} request for barcode {}", PROVIDER_ID, params.barcode);

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&params.query_pairs())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PriceSourceError::Timeout {
                        provider: PROVIDER_ID.to_string(),
                    }
                } else {
                    PriceSourceError::ProviderError {
                        provider: PROVIDER_ID.to_string(),
                        message: format!("Request failed: {}", e),
                    }
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(PriceSourceError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if let Ok(error_resp) = serde_json::from_str::<ErrorResponse>(&body) {
                if let Some(message) = error_resp.erro {
                    return Err(PriceSourceError::ProviderError {
                        provider: PROVIDER_ID.to_string(),
                        message,
                    });
                }
            }

            return Err(PriceSourceError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {} - {}", status, body),
            });
        }

        response
            .text()
            .await
            .map_err(|e| PriceSourceError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to read response: {}", e),
            })
    }
}

#[async_trait]
impl PriceProvider for MenorPrecoProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn search_by_barcode(&self, barcode: &str) -> Result<Vec<Observation>, PriceSourceError> {
        let barcode = barcode.trim();
        if barcode.is_empty() {
            return Err(PriceSourceError::InvalidRequest(
                "barcode must not be empty".to_string(),
            ));
        }

        let params = self.params_for(barcode);
        let body = self.fetch(&params).await?;
        let observations = decode_observations(&body)?;

        debug!(
            "{} returned {} observations for {}",
            PROVIDER_ID,
            observations.len(),
            barcode
        );
        Ok(observations)
    }
}
