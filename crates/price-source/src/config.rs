//! Price source configuration.

use std::time::Duration;

/// Default endpoint of the price-discovery API.
pub const DEFAULT_BASE_URL: &str = "https://menorpreco.notaparana.pr.gov.br/api/v1/produtos";

/// Default search origin, a geohash of the reference city centre.
pub const DEFAULT_LOCALE: &str = "6gkzwgjzn";

/// Default search radius in kilometres.
pub const DEFAULT_RADIUS_KM: u32 = 20;

/// Default observation period in days, counted backwards from today.
pub const DEFAULT_PERIOD_DAYS: u32 = 7;

/// Default HTTP client timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Fixed query parameters and transport settings shared by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSourceConfig {
    pub base_url: String,
    pub locale: String,
    pub radius_km: u32,
    pub period_days: u32,
    pub request_timeout: Duration,
}

impl Default for PriceSourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            radius_km: DEFAULT_RADIUS_KM,
            period_days: DEFAULT_PERIOD_DAYS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}
