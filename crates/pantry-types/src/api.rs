use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DonationOrder, DonationStatus};

// -- JWT Claims --

/// JWT claims issued on login and checked by the REST middleware.
/// `sub` is the caller id threaded into every core operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Donations --

#[derive(Debug, Default, Deserialize)]
pub struct DonationQuery {
    pub status: Option<DonationStatus>,
    pub created_by: Option<String>,
    pub claimed_by: Option<String>,
    #[serde(default)]
    pub order: DonationOrder,
}

#[derive(Debug, Serialize)]
pub struct CreateDonationResponse {
    pub id: String,
}

/// Outcome of a claim round. Losing is reported here, not as an HTTP error.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub won: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub ok: bool,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub reason: String,
    pub retryable: bool,
}

// -- Notifications --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteNotificationsRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdatedCount {
    pub updated: usize,
}
