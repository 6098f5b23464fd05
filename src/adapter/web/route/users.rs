use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::adapter::web::app_state::AppState;
use crate::adapter::web::dto::create_user_web_input::CreateUserWebInput;
use crate::adapter::web::handler::users::post::UserHandler;
use crate::core::domain::context::{self, ContextKey};

pub async fn post(
    State(state): State<Arc<AppState>>,
    Json(user): Json<CreateUserWebInput>,
) -> Result<StatusCode, (StatusCode, String)> {
    let handler = UserHandler::new(state.create_user_use_case.clone());
    // Each request is one logical flow; everything the handler does shares
    // this key, however deep the call chain nests.
    context::scope(ContextKey::unique(), handler.create_user(user)).await
}
