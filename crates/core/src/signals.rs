//! Product signal derivation from image and text embeddings
//!
//! The visual embedding is mandatory: without it the product cannot be
//! scored at all, so its failure fails the task. Every zero-shot signal
//! derived afterwards degrades on its own and keeps the prior value.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::domain::product::{Embedding, Product};
use crate::errors::{ApplicationError, DomainError};

pub const DEFAULT_OCCASIONS: [&str; 6] =
    ["Wedding", "Office", "Gym/Workout", "Casual/Daily", "Party/Nightlife", "Beach/Vacation"];
pub const DEFAULT_ARCHETYPES: [&str; 6] =
    ["Minimalist", "Streetwear", "Bohemian", "Preppy", "Vintage", "Classic/Elegant"];
pub const DEFAULT_OCCASION_THRESHOLD: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingSpace {
    /// Image-text joint space; text prompts here compare against image vectors.
    Visual,
    /// Sentence embedding space for product descriptions.
    Semantic,
}

impl fmt::Display for EmbeddingSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visual => f.write_str("visual"),
            Self::Semantic => f.write_str("semantic"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("embedding service unavailable: {0}")]
    Unavailable(String),
    #[error("embedding call timed out after {0:?}")]
    Timeout(Duration),
    #[error("embedding service returned a malformed response: {0}")]
    Malformed(String),
}

impl From<EmbeddingError> for ApplicationError {
    fn from(error: EmbeddingError) -> Self {
        Self::Integration(error.to_string())
    }
}

/// Opaque embedding models.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_image(&self, image_url: &str) -> Result<Embedding, EmbeddingError>;

    async fn embed_text(
        &self,
        space: EmbeddingSpace,
        text: &str,
    ) -> Result<Embedding, EmbeddingError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    /// Prefix joined with the first image path to form the fetch URL.
    pub image_base_url: String,
    pub occasions: Vec<String>,
    pub occasion_threshold: f64,
    pub archetypes: Vec<String>,
    /// `(casual, formal)` anchors; the formal probability becomes the score.
    pub formality_labels: (String, String),
    /// Per-call bound on every embedding request.
    pub call_timeout: Duration,
}

impl Default for SignalConfig {
    fn default() -> Self {
        let owned = |values: &[&str]| values.iter().map(|value| (*value).to_owned()).collect();
        Self {
            image_base_url: "http://127.0.0.1:9000/catalog".to_owned(),
            occasions: owned(&DEFAULT_OCCASIONS),
            occasion_threshold: DEFAULT_OCCASION_THRESHOLD,
            archetypes: owned(&DEFAULT_ARCHETYPES),
            formality_labels: (
                "Extremely Casual Streetwear".to_owned(),
                "Very Formal Black Tie".to_owned(),
            ),
            call_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct SignalExtractor {
    service: Arc<dyn EmbeddingService>,
    config: SignalConfig,
}

impl SignalExtractor {
    pub fn new(service: Arc<dyn EmbeddingService>, config: SignalConfig) -> Self {
        Self { service, config }
    }

    pub fn image_url(&self, product: &Product) -> Result<String, DomainError> {
        let path = product
            .images
            .first()
            .map(|path| path.trim())
            .filter(|path| !path.is_empty())
            .ok_or_else(|| {
                DomainError::InvariantViolation(format!("product {} has no image", product.id))
            })?;
        Ok(format!(
            "{}/{}",
            self.config.image_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }

    /// Derives embeddings and zero-shot tags for `product`.
    pub async fn extract(&self, mut product: Product) -> Result<Product, ApplicationError> {
        let url = self.image_url(&product)?;
        let visual = self.bounded(self.service.embed_image(&url)).await?;
        if visual.is_empty() {
            return Err(EmbeddingError::Malformed("empty image embedding".to_owned()).into());
        }

        match self.occasion_tags(&visual).await {
            Ok(tags) => product.occasion_tags = tags,
            Err(error) => degraded(&product, "occasion_tags", &error),
        }
        match self.style_archetype(&visual).await {
            Ok(archetype) => product.style_archetype = archetype,
            Err(error) => degraded(&product, "style_archetype", &error),
        }
        match self.formality(&visual).await {
            Ok(score) => product.formality_score = score,
            Err(error) => degraded(&product, "formality_score", &error),
        }

        product.style_embedding = Some(visual.clone());
        product.complementary_embedding = Some(visual);

        let description = describe(&product);
        match self.bounded(self.service.embed_text(EmbeddingSpace::Semantic, &description)).await {
            Ok(semantic) => product.semantic_embedding = Some(semantic),
            Err(error) => degraded(&product, "semantic_embedding", &error),
        }

        Ok(product)
    }

    async fn occasion_tags(&self, visual: &[f32]) -> Result<Vec<String>, EmbeddingError> {
        let prompts: Vec<String> =
            self.config.occasions.iter().map(|o| format!("A photo of clothing for a {o}")).collect();
        let probabilities = self.zero_shot(visual, &prompts).await?;

        Ok(self
            .config
            .occasions
            .iter()
            .zip(probabilities)
            .filter(|(_, probability)| *probability > self.config.occasion_threshold)
            .map(|(occasion, _)| occasion.clone())
            .collect())
    }

    async fn style_archetype(&self, visual: &[f32]) -> Result<Option<String>, EmbeddingError> {
        let prompts: Vec<String> =
            self.config.archetypes.iter().map(|a| format!("clothing in {a} style")).collect();
        let probabilities = self.zero_shot(visual, &prompts).await?;

        Ok(probabilities
            .iter()
            .enumerate()
            .fold(None::<(usize, f64)>, |best, (index, probability)| match best {
                Some((_, top)) if top >= *probability => best,
                _ => Some((index, *probability)),
            })
            .and_then(|(index, _)| self.config.archetypes.get(index).cloned()))
    }

    async fn formality(&self, visual: &[f32]) -> Result<f64, EmbeddingError> {
        let (casual, formal) = &self.config.formality_labels;
        let prompts = [format!("a photo of {casual}"), format!("a photo of {formal}")];
        let probabilities = self.zero_shot(visual, &prompts).await?;
        probabilities
            .get(1)
            .copied()
            .ok_or_else(|| EmbeddingError::Malformed("missing formal probability".to_owned()))
    }

    async fn zero_shot(&self, visual: &[f32], prompts: &[String]) -> Result<Vec<f64>, EmbeddingError> {
        let mut logits = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let text = self.bounded(self.service.embed_text(EmbeddingSpace::Visual, prompt)).await?;
            if text.len() != visual.len() {
                return Err(EmbeddingError::Malformed(format!(
                    "prompt embedding has {} dimensions, image has {}",
                    text.len(),
                    visual.len()
                )));
            }
            logits.push(dot(visual, &text));
        }
        Ok(softmax(&logits))
    }

    async fn bounded<F>(&self, call: F) -> Result<Embedding, EmbeddingError>
    where
        F: std::future::Future<Output = Result<Embedding, EmbeddingError>>,
    {
        tokio::time::timeout(self.config.call_timeout, call)
            .await
            .map_err(|_| EmbeddingError::Timeout(self.config.call_timeout))?
    }
}

fn degraded(product: &Product, signal: &'static str, error: &EmbeddingError) {
    warn!(
        event_name = "signals.embedding.degraded",
        product_id = %product.id,
        signal,
        error = %error,
        "embedding signal unavailable, keeping previous value"
    );
}

/// Text the semantic embedding is computed from.
pub fn describe(product: &Product) -> String {
    format!(
        "Product Name: {}. Brand: {}. Category: {} {} - {} ({}). Color: {}. Season: {}. \
         Style: This is a {} {} with a formality score of {:.2}.",
        product.name,
        product.brand,
        product.gender,
        product.master_category,
        product.sub_category,
        product.article_type,
        product.primary_colour,
        product.season.as_deref().unwrap_or("Unknown"),
        product.primary_colour,
        product.article_type,
        product.formality_score,
    )
}

fn dot(left: &[f32], right: &[f32]) -> f64 {
    left.iter().zip(right).map(|(a, b)| f64::from(*a) * f64::from(*b)).sum()
}

pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let Some(max) = logits.iter().copied().reduce(f64::max) else {
        return Vec::new();
    };
    let exps: Vec<f64> = logits.iter().map(|logit| (logit - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|value| value / sum).collect()
}
