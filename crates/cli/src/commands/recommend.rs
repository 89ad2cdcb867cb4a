use outfitter_core::catalog::UserProfileStore;
use outfitter_core::domain::outfit::Outfit;
use outfitter_core::domain::product::ProductId;
use outfitter_core::domain::user::UserId;
use outfitter_core::engine::OutfitRecommender;
use outfitter_core::errors::ApplicationError;
use outfitter_db::{SqlCatalogRepository, SqlUserProfileRepository};

use crate::commands::{application_failure, invalid_input, open_database, prepare, CommandResult};

pub fn run(product_id: &str, user_id: &str) -> CommandResult {
    let (config, runtime) = match prepare("recommend") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };
    let recommender = OutfitRecommender::from_config(&config.engine);

    let result = runtime.block_on(async {
        let base_id: ProductId = product_id
            .parse()
            .map_err(|_| invalid_input(format!("invalid product id `{product_id}`")))?;
        let user_id: UserId =
            user_id.parse().map_err(|_| invalid_input(format!("invalid user id `{user_id}`")))?;

        let pool = open_database(&config).await?;
        let users = SqlUserProfileRepository::new(pool.clone());
        let catalog = SqlCatalogRepository::new(pool.clone());

        let outcome = recommend_for(&recommender, &catalog, &users, &base_id, &user_id).await;

        pool.close().await;
        outcome.map_err(|error| application_failure(&error))
    });

    match result {
        Ok(outfits) => CommandResult::success_with_data("recommend", summary(&outfits), &outfits),
        Err(failure) => CommandResult::from_failure("recommend", failure),
    }
}

async fn recommend_for(
    recommender: &OutfitRecommender,
    catalog: &SqlCatalogRepository,
    users: &SqlUserProfileRepository,
    base_id: &ProductId,
    user_id: &UserId,
) -> Result<Vec<Outfit>, ApplicationError> {
    let user = users
        .fetch_user_profile(user_id)
        .await?
        .ok_or_else(|| ApplicationError::NotFound(format!("user {user_id}")))?;
    recommender.recommend(catalog, base_id, &user).await
}

fn summary(outfits: &[Outfit]) -> String {
    match outfits.first() {
        None => "no complete outfits available".to_string(),
        Some(best) => format!(
            "{} outfits assembled; best scores {:.3} at {:.2} total",
            outfits.len(),
            best.outfit_score,
            best.total_price
        ),
    }
}
