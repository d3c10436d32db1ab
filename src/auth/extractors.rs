use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use uuid::Uuid;

use crate::auth::service;
use crate::auth::token::TokenKeys;
use crate::error::AuthError;

/// The session gate. Every protected handler takes this extractor, so a
/// request reaches protected code only with a verified identity; downstream
/// queries are parameterized by this id and never by anything the client
/// sent.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenKeys: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::TokenInvalid)?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(AuthError::TokenInvalid)?;

        let keys = TokenKeys::from_ref(state);
        let user_id = service::resolve(&keys, token)?;
        Ok(AuthUser(user_id))
    }
}
