use serde::{Deserialize, Serialize};

use crate::task::TaskId;

/// Cuerpo de POST /api/v1/tasks.
/// `data` son números separados por espacios, ej: "25.0 26.8 24.7".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: TaskId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
