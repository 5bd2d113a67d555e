use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info};

use pantry_claims::ClaimError;
use pantry_types::api::{
    ActionResponse, ClaimResponse, Claims, CreateDonationResponse, DonationQuery,
};
use pantry_types::models::{Donation, DonationFilter, NewDonation};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

/// The collection code is shown only to the owner and the current holder.
fn redact_for(mut donation: Donation, caller: &str) -> Donation {
    let is_owner = donation.created_by == caller;
    let is_holder = donation.claimed_by.as_deref() == Some(caller);
    if !is_owner && !is_holder {
        donation.collection_code = None;
    }
    donation
}

pub async fn create_donation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewDonation>,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = claims.sub.to_string();
    let lifecycle = state.lifecycle.clone();

    let donation = blocking(move || lifecycle.create_donation(&owner_id, req)).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateDonationResponse { id: donation.id }),
    ))
}

pub async fn list_donations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<DonationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub.to_string();
    let filter = DonationFilter {
        status: query.status,
        created_by: query.created_by,
        claimed_by: query.claimed_by,
    };
    let donations = state.ports.donations.clone();

    let listed = blocking(move || Ok(donations.list(&filter, query.order)?)).await?;

    let listed: Vec<Donation> = listed
        .into_iter()
        .map(|d| redact_for(d, &caller))
        .collect();
    Ok(Json(listed))
}

pub async fn get_donation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub.to_string();
    let donations = state.ports.donations.clone();

    let donation = blocking(move || {
        donations
            .get(&id)?
            .ok_or(ClaimError::NotFound(id))
    })
    .await?;

    Ok(Json(redact_for(donation, &caller)))
}

/// Runs the settling round on its own task so a dropped connection cannot
/// cancel it between commit and response.
pub async fn claim(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let requester = claims.sub.to_string();
    let arbiter = state.arbiter.clone();
    let policy = state.retry.clone();

    let outcome = tokio::spawn(async move {
        arbiter.claim_with_retry(&id, &requester, &policy).await
    })
    .await
    .map_err(|e| {
        error!("claim task join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match outcome {
        Ok(receipt) => {
            info!("Claim on {} won by {}", receipt.donation_id, claims.username);
            Ok(Json(ClaimResponse {
                won: true,
                collection_code: Some(receipt.collection_code),
                kind: None,
                reason: "claim confirmed".to_string(),
            }))
        }
        Err(e @ (ClaimError::InvalidStateTransition(_) | ClaimError::ConcurrentClaimDetected { .. })) => {
            Ok(Json(ClaimResponse {
                won: false,
                collection_code: None,
                kind: Some(e.kind().to_string()),
                reason: e.to_string(),
            }))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn unclaim(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let requester = claims.sub.to_string();
    let arbiter = state.arbiter.clone();

    blocking(move || arbiter.unclaim(&id, &requester)).await?;
    Ok(ok("claim released"))
}

pub async fn confirm_pickup(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let requester = claims.sub.to_string();
    let lifecycle = state.lifecycle.clone();

    blocking(move || lifecycle.confirm_pickup(&id, &requester)).await?;
    Ok(ok("pickup confirmed"))
}

pub async fn undo_pickup(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let requester = claims.sub.to_string();
    let lifecycle = state.lifecycle.clone();

    blocking(move || lifecycle.undo_pickup(&id, &requester)).await?;
    Ok(ok("pickup reverted"))
}

pub async fn delete_donation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let requester = claims.sub.to_string();
    let lifecycle = state.lifecycle.clone();

    blocking(move || lifecycle.delete_donation(&id, &requester)).await?;
    Ok(ok("donation deleted"))
}

fn ok(reason: &str) -> Json<ActionResponse> {
    Json(ActionResponse {
        ok: true,
        reason: reason.to_string(),
    })
}
