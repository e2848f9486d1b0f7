use axum::{Extension, Json, extract::State, response::IntoResponse};

use kind_types::api::{Claims, UpsertProfileRequest};

use crate::error::ApiError;
use crate::state::AppState;

const MAX_NAME_LEN: usize = 100;

/// PUT /users/me — sync the caller's profile. The role comes from the token.
pub async fn upsert_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpsertProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    let first_name = req.first_name.trim().to_string();
    let last_name = req.last_name.trim().to_string();

    if !email.contains('@') {
        return Err(ApiError::BadRequest("invalid email".into()));
    }
    for name in [&first_name, &last_name] {
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(ApiError::BadRequest("names must be 1-100 characters".into()));
        }
    }

    let user = state
        .run_db(move |db| db.upsert_user(&claims.sub, claims.role, &email, &first_name, &last_name))
        .await?;

    Ok(Json(user))
}

/// GET /users/me
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .run_db(move |db| db.get_user_by_id(&claims.sub))
        .await?
        .ok_or(ApiError::NotFound("profile"))?;

    Ok(Json(user))
}
