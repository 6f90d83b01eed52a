use serde::{Deserialize, Serialize};

use crate::TokenCount;

/// USD per million tokens for each token category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingRate {
    pub input_per_1m: f64,
    pub output_per_1m: f64,
    pub cache_write_per_1m: f64,
    pub cache_read_per_1m: f64,
}

impl PricingRate {
    /// Rate with the usual cache multipliers: writes at 1.25x input, reads at 0.1x.
    pub fn with_standard_cache(input_per_1m: f64, output_per_1m: f64) -> Self {
        Self {
            input_per_1m,
            output_per_1m,
            cache_write_per_1m: input_per_1m * 1.25,
            cache_read_per_1m: input_per_1m * 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRule {
    pub model_pattern: String,
    #[serde(flatten)]
    pub rate: PricingRate,
}

impl PricingRule {
    pub fn new(model_pattern: impl Into<String>, rate: PricingRate) -> Self {
        Self {
            model_pattern: model_pattern.into(),
            rate,
        }
    }

    pub fn matches(&self, model: &str) -> bool {
        model_matches_pattern(model, &self.model_pattern)
    }
}

/// Ordered rule list; the first matching rule wins, so more specific model
/// generations must precede broader patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingTable {
    rules: Vec<PricingRule>,
}

impl PricingTable {
    pub fn new(rules: Vec<PricingRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[PricingRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rate_for(&self, model: &str) -> Option<&PricingRate> {
        self.rules
            .iter()
            .find(|rule| rule.matches(model))
            .map(|rule| &rule.rate)
    }

    /// Cost of `usage` for `model`; unpriced models cost nothing.
    pub fn cost_for(&self, model: &str, usage: TokenCount) -> f64 {
        self.rate_for(model)
            .map(|rate| compute_cost_usd(usage, rate))
            .unwrap_or(0.0)
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        let opus_current = PricingRate::with_standard_cache(5.0, 25.0);
        let opus_legacy = PricingRate::with_standard_cache(15.0, 75.0);
        let sonnet = PricingRate::with_standard_cache(3.0, 15.0);
        Self::new(vec![
            PricingRule::new("*opus-4-6*", opus_current),
            PricingRule::new("*opus-4-5*", opus_current),
            PricingRule::new("*opus-4-1*", opus_legacy),
            PricingRule::new("*opus-4*", opus_legacy),
            PricingRule::new("*3-opus*", opus_legacy),
            PricingRule::new("*sonnet-4-5*", sonnet),
            PricingRule::new("*sonnet-4*", sonnet),
            PricingRule::new("*3-7-sonnet*", sonnet),
            PricingRule::new("*3-5-sonnet*", sonnet),
            PricingRule::new("*haiku-4-5*", PricingRate::with_standard_cache(1.0, 5.0)),
            PricingRule::new("*3-5-haiku*", PricingRate::with_standard_cache(0.8, 4.0)),
            PricingRule::new("*3-haiku*", PricingRate::with_standard_cache(0.25, 1.25)),
        ])
    }
}

pub fn compute_cost_usd(usage: TokenCount, rate: &PricingRate) -> f64 {
    let per_million = |tokens: u64, rate: f64| (tokens as f64 / 1_000_000.0) * rate;
    per_million(usage.input_tokens, rate.input_per_1m)
        + per_million(usage.output_tokens, rate.output_per_1m)
        + per_million(usage.cache_creation_tokens, rate.cache_write_per_1m)
        + per_million(usage.cache_read_tokens, rate.cache_read_per_1m)
}

/// Case-insensitive glob match where `*` spans any run of characters.
pub fn model_matches_pattern(model: &str, pattern: &str) -> bool {
    let model = model.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    if pattern == "*" {
        return true;
    }
    if !pattern.contains('*') {
        return model == pattern;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let last = parts.len() - 1;
    let mut remainder = model.as_str();
    for (index, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if index == 0 {
            let Some(rest) = remainder.strip_prefix(part) else {
                return false;
            };
            remainder = rest;
        } else if index == last {
            return remainder.ends_with(part);
        } else {
            let Some(found) = remainder.find(part) else {
                return false;
            };
            remainder = &remainder[found + part.len()..];
        }
    }
    true
}
