use serde::Serialize;

use crate::core::coordinator::Statistics;

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub open_contexts: usize,
    pub pending_callback_contexts: usize,
}

impl From<Statistics> for StatisticsResponse {
    fn from(value: Statistics) -> Self {
        Self {
            open_contexts: value.open_contexts,
            pending_callback_contexts: value.pending_callback_contexts,
        }
    }
}
