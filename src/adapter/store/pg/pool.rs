use std::sync::Arc;

use futures::future::BoxFuture;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};

/// Caller-supplied customization applied to each physical connection at
/// acquisition time: read-only flags, timeouts, tracing tags. A failure here
/// surfaces as an acquisition failure.
pub type ConnectionCustomizer =
    Arc<dyn for<'c> Fn(&'c mut PgConnection) -> BoxFuture<'c, Result<(), sqlx::Error>> + Send + Sync>;

/// Builds the connection pool the engine runs on, threading an optional
/// [`ConnectionCustomizer`] into every acquisition.
pub struct PgPoolProvider {
    url: String,
    max_connections: u32,
    customizer: Option<ConnectionCustomizer>,
}

impl PgPoolProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            customizer: None,
        }
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn customizer(mut self, customizer: ConnectionCustomizer) -> Self {
        self.customizer = Some(customizer);
        self
    }

    pub async fn build(&self) -> Result<PgPool, sqlx::Error> {
        let mut options = PgPoolOptions::new().max_connections(self.max_connections);
        if let Some(customizer) = self.customizer.clone() {
            options = options.after_connect(move |conn, _meta| {
                let customizer = customizer.clone();
                Box::pin(async move { customizer(conn).await })
            });
        }
        options.connect(&self.url).await
    }
}
