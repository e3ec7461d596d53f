use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::user::User;

/// Credentials posted to the login endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Issued session token together with the authenticated user
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}
