use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::Price;
use crate::submission::normalize_decimal;

const AMOUNT: &str = r"([0-9][0-9,]*(?:\.[0-9]+)?)";

static RE_INR_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?:₹|\brs\.?|\binr)\s*{}", AMOUNT)).unwrap()
});
static RE_INR_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i){}\s*(?:rupees\b|rupee\b|rupaye\b|rupaiye\b|rupay\b|rs\b|inr\b|₹|रुपये|रुपए|रुपया)",
        AMOUNT
    ))
    .unwrap()
});
static RE_USD_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)(?:\$|\busd)\s*{}", AMOUNT)).unwrap());
static RE_USD_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i){}\s*(?:dollars?\b|usd\b)", AMOUNT)).unwrap());

/// Finds the first amount in `text` that sits next to a currency marker.
///
/// Bare numbers ("5 meters", "2 days") are ignored, and so are zero
/// amounts: an unknown price stays absent.
pub fn find_price(text: &str) -> Option<Price> {
    let patterns: [(&Regex, &str); 4] = [
        (&RE_INR_PREFIX, "INR"),
        (&RE_INR_SUFFIX, "INR"),
        (&RE_USD_PREFIX, "USD"),
        (&RE_USD_SUFFIX, "USD"),
    ];

    patterns
        .iter()
        .flat_map(|(re, currency)| {
            re.captures_iter(text).filter_map(move |caps| {
                let whole = caps.get(0)?;
                let amount = caps.get(1)?;
                Some((whole.start(), amount.as_str(), *currency))
            })
        })
        .filter_map(|(start, amount, currency)| {
            let value = normalize_decimal(amount.trim_end_matches(','));
            match value.parse::<f64>() {
                Ok(v) if v > 0.0 => Some((start, Price::new(value, currency))),
                _ => None,
            }
        })
        .min_by_key(|(start, _)| *start)
        .map(|(_, price)| price)
}
