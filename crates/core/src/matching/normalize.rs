//! Text normalization and the two partial scores.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::engine::SellerReference;

/// Words of the market name shorter than this (in chars) never count.
const SIGNIFICANT_WORD_MIN_CHARS: usize = 4;

/// Lowercase, fold accents, drop `/` `.` `-`, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| !matches!(c, '/' | '.' | '-'))
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Significant words of `market_name` that occur as a substring of some word
/// of `seller_name`. Both inputs must already be normalized.
pub fn name_score(market_name: &str, seller_name: &str) -> usize {
    let seller_words: Vec<&str> = seller_name.split_whitespace().collect();
    market_name
        .split_whitespace()
        .filter(|word| word.chars().count() >= SIGNIFICANT_WORD_MIN_CHARS)
        .filter(|word| seller_words.iter().any(|candidate| candidate.contains(word)))
        .count()
}

/// How many of street, number and neighborhood (0-3) appear in the market's
/// normalized location. Blank components never count.
pub fn address_score(seller: &SellerReference, location: &str) -> usize {
    [
        seller.street.as_deref(),
        seller.number.as_deref(),
        seller.neighborhood.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(normalize)
    .filter(|fragment| !fragment.is_empty() && location.contains(fragment.as_str()))
    .count()
}
