use axum::{
    extract::{rejection::JsonRejection, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use hyper::Server;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app::predict_use_case::PredictUseCase;
use crate::constants::{
    ACCOMMODATES, AVAILABILITY_365, BATHROOMS, BEDROOMS, MINIMUM_NIGHTS, NEIGHBOURHOOD,
    NUMBER_OF_REVIEWS, REVIEW_SCORES_RATING, ROOM_TYPE,
};

/// One listing, with categoricals already encoded against the training vocabulary.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictRequest {
    pub room_type: i64,
    pub neighbourhood_cleansed: i64,
    pub accommodates: i64,
    pub bedrooms: i64,
    pub bathrooms: f64,
    pub number_of_reviews: i64,
    pub review_scores_rating: f64,
    pub availability_365: i64,
    pub minimum_nights: i64,
}

impl PredictRequest {
    pub fn to_features(&self) -> BTreeMap<String, f64> {
        [
            (ROOM_TYPE, self.room_type as f64),
            (NEIGHBOURHOOD, self.neighbourhood_cleansed as f64),
            (ACCOMMODATES, self.accommodates as f64),
            (BEDROOMS, self.bedrooms as f64),
            (BATHROOMS, self.bathrooms),
            (NUMBER_OF_REVIEWS, self.number_of_reviews as f64),
            (REVIEW_SCORES_RATING, self.review_scores_rating),
            (AVAILABILITY_365, self.availability_365 as f64),
            (MINIMUM_NIGHTS, self.minimum_nights as f64),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predicted_price: f64,
}

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<PredictUseCase>,
    pub model_uri: String,
}

fn detail(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "detail": message }))).into_response()
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn predict_price(
    State(state): State<AppState>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    // Every body the extractor refuses is a validation failure to callers
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return detail(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text()),
    };

    match state
        .predictor
        .predict(&request.to_features(), &state.model_uri)
        .await
    {
        Ok(price) => Json(PredictResponse {
            predicted_price: price,
        })
        .into_response(),
        Err(e) => detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Build the HTTP router
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict_price))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_server(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("🚀 HTTP server running on http://localhost:{port}");
    info!("💚 Health check: http://localhost:{port}/health");
    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
