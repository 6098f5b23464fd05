use std::sync::Arc;

use crate::core::coordinator::TransactionCoordinator;
use crate::core::port::create_user::CreateUserInputBoundary;

pub struct AppState {
    pub coordinator: Arc<TransactionCoordinator>,
    pub create_user_use_case: Arc<dyn CreateUserInputBoundary>,
}
