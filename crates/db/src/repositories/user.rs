use async_trait::async_trait;
use sqlx::Row;

use outfitter_core::catalog::UserProfileStore;
use outfitter_core::domain::user::{UserId, UserProfile};
use outfitter_core::errors::ApplicationError;

use super::{decode_json, encode_json, RepositoryError};
use crate::DbPool;

pub struct SqlUserProfileRepository {
    pool: DbPool,
}

impl SqlUserProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn find(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, spending_profile_json, price_sensitivity_score, style_embedding_json, budget
             FROM user_profile WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_profile(r)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, profile: &UserProfile) -> Result<(), RepositoryError> {
        let style_embedding = profile
            .style_embedding
            .as_ref()
            .map(|embedding| encode_json("style_embedding_json", embedding))
            .transpose()?;

        sqlx::query(
            "INSERT INTO user_profile (id, spending_profile_json, price_sensitivity_score,
                                       style_embedding_json, budget)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 spending_profile_json = excluded.spending_profile_json,
                 price_sensitivity_score = excluded.price_sensitivity_score,
                 style_embedding_json = excluded.style_embedding_json,
                 budget = excluded.budget,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(profile.id.to_string())
        .bind(encode_json("spending_profile_json", &profile.spending_profile)?)
        .bind(profile.price_sensitivity_score)
        .bind(style_embedding)
        .bind(profile.budget)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let spending_profile_json: String =
        row.try_get("spending_profile_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let style_embedding_json: Option<String> =
        row.try_get("style_embedding_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(UserProfile {
        id: id
            .parse()
            .map_err(|error| RepositoryError::Decode(format!("column `id`: {error}")))?,
        spending_profile: decode_json("spending_profile_json", &spending_profile_json)?,
        price_sensitivity_score: row
            .try_get("price_sensitivity_score")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        style_embedding: style_embedding_json
            .map(|raw| decode_json("style_embedding_json", &raw))
            .transpose()?,
        budget: row.try_get("budget").map_err(|e| RepositoryError::Decode(e.to_string()))?,
    })
}

#[async_trait]
impl UserProfileStore for SqlUserProfileRepository {
    async fn fetch_user_profile(
        &self,
        id: &UserId,
    ) -> Result<Option<UserProfile>, ApplicationError> {
        Ok(self.find(id).await?)
    }

    async fn save_user_profile(&self, profile: &UserProfile) -> Result<(), ApplicationError> {
        profile.validate()?;
        Ok(self.upsert(profile).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use outfitter_core::catalog::UserProfileStore;
    use outfitter_core::domain::user::{SpendRange, UserId, UserProfile};
    use outfitter_core::errors::{ApplicationError, DomainError};

    use super::SqlUserProfileRepository;
    use crate::{connect_with_settings, migrations};

    async fn repo() -> SqlUserProfileRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlUserProfileRepository::new(pool)
    }

    fn profile(spending: HashMap<String, SpendRange>) -> UserProfile {
        UserProfile {
            id: UserId::new(),
            spending_profile: spending,
            price_sensitivity_score: 0.7,
            style_embedding: Some(vec![0.1, 0.2, 0.3]),
            budget: 180.0,
        }
    }

    #[tokio::test]
    async fn profile_round_trips_with_partial_spend_ranges() {
        let repo = repo().await;
        let mut spending = HashMap::new();
        spending.insert("Shoes".to_owned(), SpendRange::new(80.0, 140.0));
        spending.insert("Accessories".to_owned(), SpendRange { avg: None, max: Some(40.0) });
        let profile = profile(spending);

        repo.save_user_profile(&profile).await.expect("save");
        let found = repo.fetch_user_profile(&profile.id).await.expect("fetch").expect("exists");

        assert_eq!(found, profile);
        assert_eq!(repo.fetch_user_profile(&UserId::new()).await.expect("fetch"), None);
    }

    #[tokio::test]
    async fn save_updates_existing_profile() {
        let repo = repo().await;
        let mut profile = profile(HashMap::new());
        repo.save_user_profile(&profile).await.expect("save");

        profile.budget = 90.0;
        profile.style_embedding = None;
        repo.save_user_profile(&profile).await.expect("update");

        let found = repo.fetch_user_profile(&profile.id).await.expect("fetch").expect("exists");
        assert_eq!(found.budget, 90.0);
        assert_eq!(found.style_embedding, None);
    }

    #[tokio::test]
    async fn inverted_spend_range_is_rejected_before_write() {
        let repo = repo().await;
        let mut spending = HashMap::new();
        spending.insert("Topwear".to_owned(), SpendRange::new(90.0, 30.0));
        let profile = profile(spending);

        let error = repo.save_user_profile(&profile).await.expect_err("invalid range");
        assert_eq!(
            error,
            ApplicationError::Domain(DomainError::InvalidSpendRange {
                category: "Topwear".to_owned()
            })
        );
        assert_eq!(repo.fetch_user_profile(&profile.id).await.expect("fetch"), None);
    }
}
