use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::adapter::web::app_state::AppState;
use crate::adapter::web::dto::statistics_response::StatisticsResponse;

pub async fn get(State(state): State<Arc<AppState>>) -> Json<StatisticsResponse> {
    Json(StatisticsResponse::from(state.coordinator.statistics()))
}
