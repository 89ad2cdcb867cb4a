use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Embedding = Vec<f32>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub Uuid);

impl ProductId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ProductId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// A catalog row as the engine sees it.
///
/// Embeddings stay `None` until the product has been processed; scoring code
/// must treat `None` as "not yet processed", never as a zero vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub brand: String,
    pub gender: String,
    pub master_category: String,
    pub sub_category: String,
    pub article_type: String,
    pub primary_colour: String,
    pub fit: Option<String>,
    pub season: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub occasion_tags: Vec<String>,
    #[serde(default = "default_formality")]
    pub formality_score: f64,
    #[serde(default)]
    pub style_archetype: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing)]
    pub style_embedding: Option<Embedding>,
    #[serde(default, skip_serializing)]
    pub complementary_embedding: Option<Embedding>,
    #[serde(default, skip_serializing)]
    pub semantic_embedding: Option<Embedding>,
}

fn default_formality() -> f64 {
    0.5
}

impl Product {
    pub fn is_sub_category(&self, sub_category: &str) -> bool {
        self.sub_category.trim().eq_ignore_ascii_case(sub_category.trim())
    }

    /// Occasion recorded on compatibility edges built from this product.
    pub fn occasion_context(&self) -> String {
        self.occasion_tags.first().cloned().unwrap_or_else(|| "General".to_owned())
    }
}
