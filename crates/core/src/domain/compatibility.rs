use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;

/// Directed, persisted score from a base product to one recommended product.
///
/// `rank` is the position in the diversity-selected list and is the tie-break
/// order for every consumer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityEdge {
    pub base_product_id: ProductId,
    pub recommended_product_id: ProductId,
    pub compatibility_score: f64,
    pub occasion_context: String,
    pub rank: u32,
}
