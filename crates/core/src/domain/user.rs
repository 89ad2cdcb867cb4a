use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::product::Embedding;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// Observed spend for one category. Either bound may be missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendRange {
    #[serde(default)]
    pub avg: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl SpendRange {
    pub fn new(avg: f64, max: f64) -> Self {
        Self { avg: Some(avg), max: Some(max) }
    }

    /// Rejects ranges whose max sits below avg. Scorers do not repair these.
    pub fn validate(&self, category: &str) -> Result<(), DomainError> {
        match (self.avg, self.max) {
            (Some(avg), Some(max)) if max < avg => {
                Err(DomainError::InvalidSpendRange { category: category.to_owned() })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub spending_profile: HashMap<String, SpendRange>,
    #[serde(default = "default_sensitivity")]
    pub price_sensitivity_score: f64,
    #[serde(default)]
    pub style_embedding: Option<Embedding>,
    pub budget: f64,
}

fn default_sensitivity() -> f64 {
    0.5
}

impl UserProfile {
    pub fn spend_for(&self, category: &str) -> Option<&SpendRange> {
        let category = category.trim();
        self.spending_profile
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(category))
            .map(|(_, range)| range)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for (category, range) in &self.spending_profile {
            range.validate(category)?;
        }
        Ok(())
    }
}
