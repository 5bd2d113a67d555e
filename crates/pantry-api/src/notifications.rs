use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use pantry_types::api::{Claims, DeleteNotificationsRequest, UpdatedCount};

use crate::auth::AppState;

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let recipient = claims.sub.to_string();

    let inbox = state.db.list_notifications(&recipient).map_err(|e| {
        error!("DB list_notifications error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(inbox))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let recipient = claims.sub.to_string();

    let found = state
        .db
        .mark_notification_read(&id, &recipient)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !found {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let recipient = claims.sub.to_string();

    let updated = state
        .db
        .mark_all_notifications_read(&recipient)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(UpdatedCount { updated }))
}

pub async fn delete_one(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let recipient = claims.sub.to_string();

    let removed = state
        .db
        .delete_notifications(&[id], &recipient)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if removed == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Ids belonging to other recipients are skipped silently.
pub async fn delete_many(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DeleteNotificationsRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let recipient = claims.sub.to_string();

    let updated = state
        .db
        .delete_notifications(&req.ids, &recipient)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(UpdatedCount { updated }))
}
