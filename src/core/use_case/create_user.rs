use async_trait::async_trait;
use std::sync::Arc;

use crate::core::coordinator::{CoordinatorError, TransactionCoordinator};
use crate::core::domain::command::CommandError;
use crate::core::domain::commit_hook::{CommitHook, CommitHookError};
use crate::core::domain::engine::SessionConfig;
use crate::core::domain::entity::audit::{AuditEntry, AUDIT_LOG_TABLE};
use crate::core::domain::entity::user::user::UnvalidatedCreateUserInput;
use crate::core::domain::entity::user::{User, UserCommand};
use crate::core::port::create_user::{
    CreateUserError, CreateUserInputBoundary, CreateUserOutputBoundary,
};

/// Runs once the signup transaction has durably committed. A savepoint
/// release or a rollback never reaches it.
struct WelcomeNotificationHook {
    user_id: i32,
}

#[async_trait]
impl CommitHook for WelcomeNotificationHook {
    async fn run(self: Box<Self>) -> Result<(), CommitHookError> {
        // The row is durable by now; a real deployment would hand this to a
        // mailer or outbox.
        tracing::info!(user_id = self.user_id, "user committed, sending welcome notification");
        Ok(())
    }

    fn label(&self) -> &str {
        "welcome-notification"
    }
}

pub struct CreateUserUseCase {
    coordinator: Arc<TransactionCoordinator>,
    repository: Arc<dyn UserCommand>,
}

impl CreateUserUseCase {
    pub fn new(coordinator: Arc<TransactionCoordinator>, repository: Arc<dyn UserCommand>) -> Self {
        Self {
            coordinator,
            repository,
        }
    }
}

#[async_trait]
impl CreateUserInputBoundary for CreateUserUseCase {
    async fn execute(
        &self,
        input: UnvalidatedCreateUserInput,
        output_boundary: &mut dyn CreateUserOutputBoundary,
    ) -> Result<(), CreateUserError> {
        let user = User::try_from(input)?;
        let id = user.id;

        let result = self
            .coordinator
            .wrap(|| async {
                let facade = self.coordinator.facade()?;
                self.repository.insert(&facade, user.clone()).await?;

                // The audit trail commits independently of the signup, so it
                // survives even when the signup later rolls back.
                let audit_session = SessionConfig::new().application_tag("audit-trail");
                self.coordinator
                    .execute_with(Some(audit_session), || async {
                        let audit = self
                            .coordinator
                            .dao_for(AUDIT_LOG_TABLE, |entry: &AuditEntry| entry.actor_id)?;
                        audit
                            .insert(&AuditEntry {
                                actor_id: id,
                                action: "user.create".to_string(),
                            })
                            .await?;
                        Ok(())
                    })
                    .await?;

                self.coordinator
                    .on_commit(Box::new(WelcomeNotificationHook { user_id: id }))
                    .await?;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => {
                output_boundary.execute(id)?;
                Ok(())
            }
            // Surface the repository's domain error when that is what
            // failed inside the transactional scope.
            Err(CoordinatorError::Operation(err)) => match err.downcast::<CommandError>() {
                Ok(command_err) => Err(CreateUserError::CommandError(command_err)),
                Err(other) => Err(CreateUserError::CoordinatorError(
                    CoordinatorError::Operation(other),
                )),
            },
            Err(other) => Err(CreateUserError::CoordinatorError(other)),
        }
    }
}
