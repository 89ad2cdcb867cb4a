//! Pairwise compatibility scoring
//!
//! Rule scorers over categorical product attributes, cosine similarity over
//! embeddings, and the weighted combination of both.

mod compatibility;
mod rules;
mod similarity;

pub use compatibility::{
    ColourHarmony, CompatibilityBreakdown, CompatibilityScorer, CompatibilityWeights,
};
pub use rules::{RuleScorer, RuleTables};
pub use similarity::cosine_similarity;

/// Default weights for the compatibility sum. Colour harmony is off by default.
pub const DEFAULT_COMPATIBILITY_WEIGHTS: CompatibilityWeights = CompatibilityWeights {
    season: 0.35,
    occasion: 0.25,
    style_vibe: 0.20,
    fit: 0.15,
    colour: 0.0,
};

/// Upper bound for the optional colour-harmony weight.
pub const MAX_COLOUR_WEIGHT: f64 = 0.05;

/// Added to the spend-range width so `max == avg` never divides by zero.
pub const PRICE_FIT_EPSILON: f64 = 1e-6;
