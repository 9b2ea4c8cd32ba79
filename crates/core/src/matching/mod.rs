//! Record linkage between externally observed sellers and known markets.
//!
//! Precision over recall: a wrong match permanently corrupts a market's
//! price history, so anything ambiguous or weak resolves to "no match".

mod engine;
mod normalize;

pub use engine::{MarketMatch, MarketMatcher, SellerReference, MIN_ADDRESS_SCORE, MIN_NAME_SCORE};
pub use normalize::{address_score, name_score, normalize};
