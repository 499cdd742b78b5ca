use serde::{Deserialize, Serialize};

use crate::models::Principal;

/// Login input. Fields are optional so that presence is checked with a
/// portal error instead of a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Principal,
}
