use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::auth::{
    dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest, RegisteredResponse},
    extractors::AuthUser,
    repo::User,
    service,
};
use crate::error::AuthError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisteredResponse>), AuthError> {
    let user = service::register(&state, &payload.email, &payload.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            user: PublicUser {
                id: user.id,
                email: user.email,
            },
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let (token, user) = service::login(&state, &payload.email, &payload.password).await?;
    Ok(Json(AuthResponse {
        token,
        user: PublicUser {
            id: user.id,
            email: user.email,
        },
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    let user = User::find_by_id(&state.db, user_id)
        .await
        .map_err(AuthError::StoreUnavailable)?
        // A verified token for a since-deleted account is still not a session.
        .ok_or(AuthError::TokenInvalid)?;
    Ok(Json(PublicUser {
        id: user.id,
        email: user.email,
    }))
}
