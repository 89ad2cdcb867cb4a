use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use outfitter_core::catalog::{CatalogStore, UserProfileStore};
use outfitter_core::domain::outfit::Outfit;
use outfitter_core::domain::product::ProductId;
use outfitter_core::domain::user::UserId;
use outfitter_core::engine::OutfitRecommender;
use outfitter_core::errors::{ApplicationError, InterfaceError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::worker::ProcessWorker;

#[derive(Clone)]
pub struct ApiState {
    pub catalog: Arc<dyn CatalogStore>,
    pub users: Arc<dyn UserProfileStore>,
    pub recommender: Arc<OutfitRecommender>,
    pub worker: ProcessWorker,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub base_product_id: ProductId,
    pub user_id: UserId,
    pub outfits: Vec<Outfit>,
}

#[derive(Debug, Serialize)]
pub struct ProcessAccepted {
    pub product_id: ProductId,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl ApiError {
    fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = match &self.0 {
            InterfaceError::BadRequest { message, .. }
            | InterfaceError::NotFound { message, .. }
            | InterfaceError::ServiceUnavailable { message, .. }
            | InterfaceError::Internal { message, .. } => message.clone(),
        };
        let body = ApiErrorBody {
            error: self.0.user_message(),
            detail,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/recommendations/{product_id}", get(recommend_outfits))
        .route("/products/{product_id}/process", post(process_product))
        .with_state(state)
}

fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn parse_id<T: FromStr>(raw: &str, kind: &str, correlation_id: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid {kind} id `{raw}`"), correlation_id))
}

async fn recommend_outfits(
    Path(product_id): Path<String>,
    Query(query): Query<RecommendationQuery>,
    State(state): State<ApiState>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let correlation_id = correlation_id();
    let base_product_id: ProductId = parse_id(&product_id, "product", &correlation_id)?;
    let raw_user_id = query.user_id.filter(|value| !value.trim().is_empty()).ok_or_else(|| {
        ApiError::bad_request("query parameter `user_id` is required", &correlation_id)
    })?;
    let user_id: UserId = parse_id(&raw_user_id, "user", &correlation_id)?;

    let user = state
        .users
        .fetch_user_profile(&user_id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?
        .ok_or_else(|| {
            ApiError::from_application(
                ApplicationError::NotFound(format!("user {user_id}")),
                &correlation_id,
            )
        })?;

    let outfits = state
        .recommender
        .recommend(state.catalog.as_ref(), &base_product_id, &user)
        .await
        .map_err(|error| {
            warn!(
                event_name = "api.recommendations.failed",
                correlation_id = %correlation_id,
                product_id = %base_product_id,
                error = %error,
                "recommendation request failed"
            );
            ApiError::from_application(error, &correlation_id)
        })?;

    info!(
        event_name = "api.recommendations.served",
        correlation_id = %correlation_id,
        product_id = %base_product_id,
        user_id = %user_id,
        outfits = outfits.len(),
        "recommendations served"
    );

    Ok(Json(RecommendationResponse { base_product_id, user_id, outfits }))
}

async fn process_product(
    Path(product_id): Path<String>,
    State(state): State<ApiState>,
) -> Result<(StatusCode, Json<ProcessAccepted>), ApiError> {
    let correlation_id = correlation_id();
    let product_id: ProductId = parse_id(&product_id, "product", &correlation_id)?;

    state.worker.enqueue(product_id).await;
    info!(
        event_name = "api.process.enqueued",
        correlation_id = %correlation_id,
        product_id = %product_id,
        "product processing enqueued"
    );

    Ok((StatusCode::ACCEPTED, Json(ProcessAccepted { product_id, status: "accepted" })))
}
