//! Weighted compatibility between a base product and one candidate

use serde::Serialize;

use crate::domain::product::Product;
use crate::errors::DomainError;

use super::rules::{RuleScorer, RuleTables};
use super::similarity::cosine_similarity;

/// Weights for compatibility components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompatibilityWeights {
    /// Weight for season alignment (default: 0.35)
    pub season: f64,
    /// Weight for occasion overlap (default: 0.25)
    pub occasion: f64,
    /// Weight for complementary-vs-style vector similarity (default: 0.20)
    pub style_vibe: f64,
    /// Weight for fit contrast (default: 0.15)
    pub fit: f64,
    /// Weight for colour harmony (default: 0.0, at most 0.05)
    pub colour: f64,
}

impl Default for CompatibilityWeights {
    fn default() -> Self {
        super::DEFAULT_COMPATIBILITY_WEIGHTS
    }
}

impl CompatibilityWeights {
    pub fn with_colour(mut self, colour: f64) -> Self {
        self.colour = colour.clamp(0.0, super::MAX_COLOUR_WEIGHT);
        self
    }

    pub fn combine(&self, components: &CompatibilityBreakdown) -> f64 {
        components.season * self.season
            + components.occasion * self.occasion
            + components.style_vibe * self.style_vibe
            + components.fit * self.fit
            + components.colour * self.colour
    }
}

/// Colour pairs a stylist accepts. Neutrals go with anything.
#[derive(Debug, Clone, PartialEq)]
pub struct ColourHarmony {
    pub neutrals: Vec<String>,
    pub complementary_pairs: Vec<(String, String)>,
    pub neutral_score: f64,
    pub matching_score: f64,
    pub complementary_score: f64,
    pub clash_score: f64,
}

impl Default for ColourHarmony {
    fn default() -> Self {
        let owned = |values: &[&str]| values.iter().map(|value| (*value).to_owned()).collect();
        let pair = |a: &str, b: &str| (a.to_owned(), b.to_owned());
        Self {
            neutrals: owned(&["Black", "White", "Grey", "Navy Blue", "Beige", "Cream"]),
            complementary_pairs: vec![
                pair("Blue", "Brown"),
                pair("Olive", "Tan"),
                pair("Maroon", "Khaki"),
                pair("Pink", "Grey Melange"),
            ],
            neutral_score: 1.0,
            matching_score: 0.8,
            complementary_score: 1.0,
            clash_score: 0.4,
        }
    }
}

impl ColourHarmony {
    pub fn score(&self, left: &str, right: &str) -> f64 {
        let (left, right) = (left.trim(), right.trim());
        let is_neutral = |colour: &str| self.neutrals.iter().any(|n| n.eq_ignore_ascii_case(colour));

        if is_neutral(left) || is_neutral(right) {
            return self.neutral_score;
        }
        if left.eq_ignore_ascii_case(right) {
            return self.matching_score;
        }
        let complementary = self.complementary_pairs.iter().any(|(a, b)| {
            (a.eq_ignore_ascii_case(left) && b.eq_ignore_ascii_case(right))
                || (a.eq_ignore_ascii_case(right) && b.eq_ignore_ascii_case(left))
        });
        if complementary {
            self.complementary_score
        } else {
            self.clash_score
        }
    }
}

/// Individual compatibility components and their weighted total.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CompatibilityBreakdown {
    pub season: f64,
    pub occasion: f64,
    pub style_vibe: f64,
    pub fit: f64,
    pub colour: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CompatibilityScorer {
    weights: CompatibilityWeights,
    rules: RuleScorer,
    colours: ColourHarmony,
}

impl CompatibilityScorer {
    pub fn new(weights: CompatibilityWeights, tables: RuleTables, colours: ColourHarmony) -> Self {
        Self { weights, rules: RuleScorer::new(tables), colours }
    }

    pub fn with_weights(weights: CompatibilityWeights) -> Self {
        Self { weights, ..Self::default() }
    }

    pub fn weights(&self) -> &CompatibilityWeights {
        &self.weights
    }

    /// Score `candidate` as a complement to `base`.
    ///
    /// Fails with `MissingEmbedding` when the base has no complementary vector
    /// or the candidate has no style vector; such candidates are excluded.
    pub fn score(
        &self,
        base: &Product,
        candidate: &Product,
    ) -> Result<CompatibilityBreakdown, DomainError> {
        let complementary = base.complementary_embedding.as_deref().ok_or(
            DomainError::MissingEmbedding {
                product_id: base.id,
                field: "complementary_embedding",
            },
        )?;
        let style = candidate.style_embedding.as_deref().ok_or(
            DomainError::MissingEmbedding { product_id: candidate.id, field: "style_embedding" },
        )?;

        let mut breakdown = CompatibilityBreakdown {
            season: self.rules.season_score(base.season.as_deref(), candidate.season.as_deref()),
            occasion: self.rules.occasion_score(&base.occasion_tags, &candidate.occasion_tags),
            style_vibe: cosine_similarity(complementary, style)?,
            fit: self.rules.fit_score(base.fit.as_deref(), candidate.fit.as_deref()),
            colour: self.colours.score(&base.primary_colour, &candidate.primary_colour),
            total: 0.0,
        };
        breakdown.total = self.weights.combine(&breakdown);

        Ok(breakdown)
    }
}
