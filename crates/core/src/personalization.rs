//! Per-shopper re-ranking of persisted compatibility edges

use crate::domain::product::Product;
use crate::domain::user::UserProfile;
use crate::scoring::{cosine_similarity, RuleScorer};

/// Default blend of edge compatibility with the shopper's own signals.
pub const DEFAULT_PERSONALIZATION_WEIGHTS: PersonalizationWeights = PersonalizationWeights {
    compatibility: 0.40,
    price_match: 0.30,
    style_alignment: 0.30,
    neutral_style_alignment: 0.6,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonalizationWeights {
    /// Weight for the persisted edge score (default: 0.40)
    pub compatibility: f64,
    /// Weight for price fit against the shopper's spend (default: 0.30)
    pub price_match: f64,
    /// Weight for shopper-vs-product style similarity (default: 0.30)
    pub style_alignment: f64,
    /// Used when either style vector is missing (default: 0.6)
    pub neutral_style_alignment: f64,
}

impl Default for PersonalizationWeights {
    fn default() -> Self {
        DEFAULT_PERSONALIZATION_WEIGHTS
    }
}

/// An edge's recommended product with its per-shopper score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub product: Product,
    pub compatibility_score: f64,
    pub price_match: f64,
    pub style_alignment: f64,
    pub rank_score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PersonalizationRanker {
    weights: PersonalizationWeights,
    rules: RuleScorer,
}

impl PersonalizationRanker {
    pub fn new(weights: PersonalizationWeights, rules: RuleScorer) -> Self {
        Self { weights, rules }
    }

    pub fn style_alignment(&self, user: &UserProfile, product: &Product) -> f64 {
        match (user.style_embedding.as_deref(), product.style_embedding.as_deref()) {
            (Some(user_style), Some(product_style)) => cosine_similarity(user_style, product_style)
                .unwrap_or(self.weights.neutral_style_alignment),
            _ => self.weights.neutral_style_alignment,
        }
    }

    /// Scores every `(product, compatibility)` pair and sorts descending.
    /// Ties keep the order of `candidates`, which is the edge rank order.
    pub fn rank(
        &self,
        user: &UserProfile,
        candidates: Vec<(Product, f64)>,
    ) -> Vec<RankedCandidate> {
        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|(product, compatibility_score)| {
                let price_match = self.rules.price_fit_score(user, &product);
                let style_alignment = self.style_alignment(user, &product);
                let rank_score = self.weights.compatibility * compatibility_score
                    + self.weights.price_match * price_match
                    + self.weights.style_alignment * style_alignment;
                RankedCandidate {
                    product,
                    compatibility_score,
                    price_match,
                    style_alignment,
                    rank_score,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.rank_score.total_cmp(&a.rank_score));
        ranked
    }
}
