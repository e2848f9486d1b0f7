use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use kind_db::queries::NewJobPost;
use kind_types::api::{Claims, CreateJobPostRequest};
use kind_types::events::GatewayEvent;
use kind_types::models::{ApplicationStatus, JobPost, JobStatus, Role};

use crate::error::ApiError;
use crate::state::AppState;

const MAX_TITLE_LEN: usize = 120;
const MAX_DESCRIPTION_LEN: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct JobQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

fn require_role(claims: &Claims, role: Role) -> Result<(), ApiError> {
    if claims.role != role {
        return Err(ApiError::Forbidden(format!("requires the {} role", role)));
    }
    Ok(())
}

async fn owned_job_post(state: &AppState, claims: &Claims, job_id: Uuid) -> Result<JobPost, ApiError> {
    let post = state
        .run_db(move |db| db.get_job_post(job_id))
        .await?
        .ok_or(ApiError::NotFound("job post"))?;
    if post.employer_id != claims.sub {
        return Err(ApiError::Forbidden("not your job post".into()));
    }
    Ok(post)
}

/// POST /jobs
pub async fn create_job_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateJobPostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Employer)?;
    state.active_user(&claims.sub).await?;

    let title = req.title.trim().to_string();
    let description = req.description.trim().to_string();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::BadRequest("title must be 1-120 characters".into()));
    }
    if description.is_empty() || description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::BadRequest("description must be 1-4000 characters".into()));
    }

    let post = state
        .run_db(move |db| {
            db.create_job_post(&NewJobPost {
                employer_id: &claims.sub,
                title: &title,
                description: &description,
                location: req.location.as_deref(),
                salary: req.salary.as_deref(),
            })
        })
        .await?;

    info!("Job post {} created by {}", post.id, post.employer_id);
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /jobs
pub async fn list_job_posts(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(200);
    let posts = state.run_db(move |db| db.list_open_job_posts(limit)).await?;
    Ok(Json(posts))
}

/// POST /jobs/{job_id}/close
pub async fn close_job_post(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    owned_job_post(&state, &claims, job_id).await?;
    state.run_db(move |db| db.close_job_post(job_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /jobs/{job_id}/applications
pub async fn apply(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Worker)?;
    state.active_user(&claims.sub).await?;

    let post = state
        .run_db(move |db| db.get_job_post(job_id))
        .await?
        .ok_or(ApiError::NotFound("job post"))?;
    if post.status != JobStatus::Open {
        return Err(ApiError::Conflict("job post is closed".into()));
    }

    let application = state
        .run_db(move |db| db.create_application(job_id, &claims.sub))
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /jobs/{job_id}/applications
pub async fn list_applications(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    owned_job_post(&state, &claims, job_id).await?;
    let applications = state
        .run_db(move |db| db.list_applications_for_post(job_id))
        .await?;
    Ok(Json(applications))
}

/// POST /applications/{application_id}/accept — creates the match and
/// notifies both sides.
pub async fn accept_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.active_user(&claims.sub).await?;

    let application = state
        .run_db(move |db| db.get_application(application_id))
        .await?
        .ok_or(ApiError::NotFound("application"))?;
    owned_job_post(&state, &claims, application.job_post_id).await?;

    let created = state
        .run_db(move |db| db.accept_application(application_id))
        .await?;

    state
        .notify(
            &[created.employer_id.as_str(), created.worker_id.as_str()],
            GatewayEvent::MatchCreated {
                r#match: created.clone(),
            },
        )
        .await;

    Ok(Json(created))
}

/// POST /applications/{application_id}/reject
pub async fn reject_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let application = state
        .run_db(move |db| db.get_application(application_id))
        .await?
        .ok_or(ApiError::NotFound("application"))?;
    owned_job_post(&state, &claims, application.job_post_id).await?;

    if application.status != ApplicationStatus::Pending {
        return Err(ApiError::Conflict(format!("application is {}", application.status)));
    }

    state
        .run_db(move |db| db.set_application_status(application_id, ApplicationStatus::Rejected))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
