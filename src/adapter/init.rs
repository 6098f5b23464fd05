use std::sync::Arc;

use futures::future::BoxFuture;
use sqlx::PgConnection;
use thiserror::Error;

use crate::adapter::config::AppConfig;
use crate::adapter::store::pg::command::user::PgUserRepository;
use crate::adapter::store::pg::engine::PgEngine;
use crate::adapter::store::pg::pool::{ConnectionCustomizer, PgPoolProvider};
use crate::adapter::web::app_state::AppState;
use crate::core::coordinator::TransactionCoordinator;
use crate::core::use_case::create_user::CreateUserUseCase;

/// Tags every acquired connection so sessions are attributable in
/// `pg_stat_activity`.
fn tag_connection(conn: &mut PgConnection) -> BoxFuture<'_, Result<(), sqlx::Error>> {
    Box::pin(async move {
        sqlx::query("SET application_name = 'txscope'")
            .execute(conn)
            .await
            .map(|_| ())
    })
}

pub struct AppInitializer;

impl AppInitializer {
    pub async fn initialize(config: &AppConfig) -> Result<Arc<AppState>, AppInitializerError> {
        let customizer: ConnectionCustomizer = Arc::new(tag_connection);
        let pool = PgPoolProvider::new(config.db_url())
            .max_connections(5)
            .customizer(customizer)
            .build()
            .await
            .map_err(|e| AppInitializerError::DatabaseInitError(e.to_string()))?;

        let engine = Arc::new(PgEngine::new(pool));
        let coordinator = Arc::new(TransactionCoordinator::new(engine));
        let user_repository = Arc::new(PgUserRepository);
        let create_user_use_case = Arc::new(CreateUserUseCase::new(
            coordinator.clone(),
            user_repository,
        ));

        Ok(Arc::new(AppState {
            coordinator,
            create_user_use_case,
        }))
    }
}

#[derive(Debug, Error)]
pub enum AppInitializerError {
    #[error("Failed to initialize database: {0}")]
    DatabaseInitError(String),
}
