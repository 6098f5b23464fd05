pub mod user;

use async_trait::async_trait;

use crate::core::domain::command::CommandError;
use crate::core::domain::transaction::QueryFacade;

#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
}

#[async_trait]
pub trait UserCommand: Send + Sync {
    async fn insert(&self, facade: &QueryFacade, user: User) -> Result<(), CommandError>;
}
