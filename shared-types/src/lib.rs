use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub mod auth;
pub mod task;
pub mod user;

pub use auth::{LoginRequest, LoginResponse};
pub use task::{
    Attachment, ChatMessage, CreateChatMessageRequest, CreateTaskRequest, NewAttachment,
    NewChatMessage, Task, TaskPriority, TaskStatus, UpdateTaskRequest,
};
pub use user::{CreateUserRequest, UpdateUserRequest, User, UserRole};

/// Error response for API endpoints
#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Response of the health endpoints
#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

/// A stored string did not match any variant of a wire enum
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
