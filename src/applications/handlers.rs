use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::{error, instrument, warn};

use crate::applications::dto::{
    ApplicationListItem, CreatedApplicationResponse, ListQuery, StatsResponse,
};
use crate::applications::repo::{
    self, ApplicationFilter, ApplicationPatch, JobApplication, NewApplication,
};
use crate::auth::extractors::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/applications", get(list_applications).post(create_application))
        .route("/applications/stats", get(get_stats))
        .route(
            "/applications/:id",
            patch(update_application)
                .get(get_application)
                .delete(delete_application),
        )
}

#[instrument(skip(state))]
pub async fn list_applications(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ApplicationListItem>>, (StatusCode, String)> {
    let filter = ApplicationFilter {
        statuses: query.status.map(|s| vec![s]),
        company: query.company,
        keyword: query.q,
    };
    let apps = repo::list(&state.db, user_id, &filter)
        .await
        .map_err(internal)?;
    Ok(Json(apps.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_application(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<NewApplication>,
) -> Result<(StatusCode, Json<CreatedApplicationResponse>), (StatusCode, String)> {
    match repo::create(&state.db, user_id, &payload).await {
        Ok(id) => Ok((StatusCode::CREATED, Json(CreatedApplicationResponse { id }))),
        Err(e)
            if e.as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false) =>
        {
            warn!(user_id = %user_id, "duplicate application fingerprint");
            Err((StatusCode::CONFLICT, "Application already saved".into()))
        }
        Err(e) => Err(internal(e)),
    }
}

#[instrument(skip(state))]
pub async fn get_application(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<JobApplication>, (StatusCode, String)> {
    let app = repo::get(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Application not found".to_string()))?;
    Ok(Json(app))
}

#[instrument(skip(state, payload))]
pub async fn update_application(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<ApplicationPatch>,
) -> Result<Json<JobApplication>, (StatusCode, String)> {
    if payload.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Nothing to update".into()));
    }
    let changed = repo::update(&state.db, user_id, id, &payload)
        .await
        .map_err(internal)?;
    if !changed {
        return Err((StatusCode::NOT_FOUND, "Application not found".into()));
    }
    let app = repo::get(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Application not found".to_string()))?;
    Ok(Json(app))
}

#[instrument(skip(state))]
pub async fn delete_application(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    let deleted = repo::delete(&state.db, user_id, id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err((StatusCode::NOT_FOUND, "Application not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn get_stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<StatsResponse>, (StatusCode, String)> {
    let counts = repo::status_counts(&state.db, user_id)
        .await
        .map_err(internal)?;
    let total = counts.iter().map(|(_, n)| n).sum();
    Ok(Json(StatsResponse {
        total,
        by_status: counts.into_iter().collect(),
    }))
}

fn internal<E: std::error::Error>(e: E) -> (StatusCode, String) {
    error!(error = %e, "applications store error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".into(),
    )
}
