//! Raw response structures and boundary validation.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::errors::PriceSourceError;
use crate::models::{Establishment, Observation};

use super::PROVIDER_ID;

// ============================================================================
// API Response Structures
// ============================================================================

/// Top-level search response. `produtos` is decoded entry by entry so a
/// single malformed item does not poison the whole response.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    produtos: Option<Vec<Value>>,
}

/// Error body returned alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorResponse {
    #[serde(alias = "error", alias = "mensagem")]
    pub erro: Option<String>,
}

/// The API is inconsistent about numeric fields: sometimes JSON numbers,
/// sometimes strings with a decimal comma.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    fn as_text(&self) -> String {
        match self {
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    desc: Option<String>,
    valor: Option<Scalar>,
    valor_desconto: Option<Scalar>,
    datahora: Option<String>,
    estabelecimento: Option<RawEstablishment>,
}

#[derive(Debug, Deserialize)]
struct RawEstablishment {
    nm_emp: Option<String>,
    nm_fan: Option<String>,
    nm_logr: Option<String>,
    nr_logr: Option<Scalar>,
    bairro: Option<String>,
    mun: Option<String>,
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a response body into validated observations.
///
/// Returns `InvalidResponse` when the body is not JSON or lacks the
/// `produtos` list. Individual entries failing validation are skipped.
pub(super) fn decode_observations(body: &str) -> Result<Vec<Observation>, PriceSourceError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| PriceSourceError::InvalidResponse {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to parse search response: {}", e),
        })?;

    let entries = response
        .produtos
        .ok_or_else(|| PriceSourceError::InvalidResponse {
            provider: PROVIDER_ID.to_string(),
            message: "missing 'produtos' list".to_string(),
        })?;

    let mut observations = Vec::with_capacity(entries.len());
    let mut rejected = 0usize;

    for entry in entries {
        let parsed = serde_json::from_value::<RawProduct>(entry)
            .map_err(|e| e.to_string())
            .and_then(validate);
        match parsed {
            Ok(observation) => observations.push(observation),
            Err(reason) => {
                rejected += 1;
                warn!("Dropping malformed {} entry: {}", PROVIDER_ID, reason);
            }
        }
    }

    if rejected > 0 {
        warn!(
            "{}: kept {} observations, dropped {}",
            PROVIDER_ID,
            observations.len(),
            rejected
        );
    }

    Ok(observations)
}

fn validate(raw: RawProduct) -> Result<Observation, String> {
    let establishment = raw
        .estabelecimento
        .ok_or_else(|| "missing establishment".to_string())
        .and_then(validate_establishment)?;

    let listed_price = raw
        .valor
        .as_ref()
        .map(Scalar::as_text)
        .ok_or_else(|| "missing price".to_string())
        .and_then(|text| parse_decimal(&text))?;
    if listed_price <= Decimal::ZERO {
        return Err(format!("non-positive price {}", listed_price));
    }

    let discount = match raw.valor_desconto.as_ref().map(Scalar::as_text) {
        Some(text) if !text.is_empty() => parse_decimal(&text)?,
        _ => Decimal::ZERO,
    };
    if discount < Decimal::ZERO {
        return Err(format!("negative discount {}", discount));
    }

    let observed_at = raw
        .datahora
        .as_deref()
        .ok_or_else(|| "missing timestamp".to_string())
        .and_then(parse_timestamp)?;

    Ok(Observation {
        description: non_empty(raw.desc),
        establishment,
        listed_price,
        discount,
        observed_at,
    })
}

fn validate_establishment(raw: RawEstablishment) -> Result<Establishment, String> {
    let trade_name = non_empty(raw.nm_fan);
    let legal_name = non_empty(raw.nm_emp)
        .or_else(|| trade_name.clone())
        .ok_or_else(|| "establishment without a name".to_string())?;

    Ok(Establishment {
        legal_name,
        trade_name,
        street: non_empty(raw.nm_logr),
        number: raw.nr_logr.map(|n| n.as_text()).filter(|n| !n.is_empty()),
        neighborhood: non_empty(raw.bairro),
        city: non_empty(raw.mun),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_decimal(text: &str) -> Result<Decimal, String> {
    let normalized = text.trim().replace(',', ".");
    Decimal::from_str(&normalized).map_err(|e| format!("invalid amount '{}': {}", text, e))
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, String> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(format!("invalid timestamp '{}'", text))
}
