//! Market matcher: scores every candidate market against one seller.

use log::debug;

use super::normalize::{address_score, name_score, normalize};
use crate::catalog::Market;

/// Candidates whose name score is below this are rejected.
pub const MIN_NAME_SCORE: usize = 2;

/// Candidates with a stored address whose address score is below this are rejected.
pub const MIN_ADDRESS_SCORE: usize = 2;

/// An externally observed seller: name plus whatever address fragments the
/// source returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerReference {
    pub name: String,
    pub street: Option<String>,
    pub number: Option<String>,
    pub neighborhood: Option<String>,
}

/// The winning market and how it scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketMatch<'a> {
    pub market: &'a Market,
    pub name_score: usize,
    pub address_score: usize,
}

impl MarketMatch<'_> {
    pub fn score(&self) -> usize {
        self.name_score + self.address_score
    }
}

struct Candidate {
    market: Market,
    legal_name: String,
    location: Option<String>,
}

/// Resolves sellers against a market catalog loaded once per job.
///
/// Names and locations are normalized up front so each resolution only
/// pays for the substring scans.
pub struct MarketMatcher {
    candidates: Vec<Candidate>,
}

impl MarketMatcher {
    /// Markets without a legal name are ignored.
    pub fn new(markets: Vec<Market>) -> Self {
        let candidates = markets
            .into_iter()
            .filter_map(|market| {
                let legal_name = normalize(market.legal_name.as_deref()?);
                if legal_name.is_empty() {
                    return None;
                }
                let location = market
                    .has_address()
                    .then(|| normalize(market.location.as_deref().unwrap_or_default()));
                Some(Candidate {
                    market,
                    legal_name,
                    location,
                })
            })
            .collect();
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Best-scoring market for `seller`, or `None` when no candidate clears
    /// both thresholds. Ties keep the first candidate in catalog order.
    pub fn resolve(&self, seller: &SellerReference) -> Option<MarketMatch<'_>> {
        let seller_name = normalize(&seller.name);
        if seller_name.is_empty() {
            return None;
        }

        let mut best: Option<MarketMatch<'_>> = None;

        for candidate in &self.candidates {
            let name = name_score(&candidate.legal_name, &seller_name);
            if name < MIN_NAME_SCORE {
                continue;
            }

            let address = match &candidate.location {
                Some(location) => {
                    let score = address_score(seller, location);
                    if score < MIN_ADDRESS_SCORE {
                        continue;
                    }
                    score
                }
                None => 0,
            };

            let current = MarketMatch {
                market: &candidate.market,
                name_score: name,
                address_score: address,
            };
            if best.map_or(true, |b| current.score() > b.score()) {
                best = Some(current);
            }
        }

        match &best {
            Some(m) => debug!(
                "Seller '{}' matched market {} (name {}, address {})",
                seller.name, m.market.id, m.name_score, m.address_score
            ),
            None => debug!("Seller '{}' matched no market", seller.name),
        }
        best
    }
}
