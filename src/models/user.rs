//! User-related models

use serde::{Deserialize, Serialize};

/// Public user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub fullname: String,
    pub email: String,
    pub created_at: Option<String>,
}

/// Response of `/auth/login` and `/auth/register`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Option<User>,
}

/// Response of `/auth/me`
#[derive(Debug, Clone, Deserialize)]
pub struct MeResponse {
    pub user: Option<User>,
}
