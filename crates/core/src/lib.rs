pub mod catalog;
pub mod config;
pub mod diversity;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod outfits;
pub mod personalization;
pub mod retrieval;
pub mod scoring;
pub mod signals;

pub use catalog::{CatalogStore, InMemoryCatalog, UserProfileStore};
pub use diversity::{DiversitySelector, ScoredCandidate};
pub use domain::compatibility::CompatibilityEdge;
pub use domain::outfit::{Outfit, OutfitItem};
pub use domain::product::{Embedding, Product, ProductId};
pub use domain::user::{SpendRange, UserId, UserProfile};
pub use engine::{CompatibilityEngine, OutfitRecommender, ProductProcessor, RecomputeReport};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use outfits::{BudgetScorer, BudgetTiers, OutfitAssembler, SlotTemplate};
pub use personalization::{PersonalizationRanker, PersonalizationWeights, RankedCandidate};
pub use retrieval::{CandidateRetriever, CategoryMap};
pub use scoring::{CompatibilityScorer, CompatibilityWeights, RuleScorer, RuleTables};
pub use signals::{EmbeddingError, EmbeddingService, EmbeddingSpace, SignalConfig, SignalExtractor};
