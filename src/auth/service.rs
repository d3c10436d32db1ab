use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::User;
use crate::auth::token::TokenKeys;
use crate::error::AuthError;
use crate::state::AppState;

/// Minimum accepted password length. Enforced here, not in the hasher.
pub const MIN_PASSWORD_LEN: usize = 4;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Create an account. Does not log the caller in; issuing a token is the
/// caller's decision.
pub async fn register(state: &AppState, email: &str, password: &str) -> Result<User, AuthError> {
    let email = normalize_email(email);

    if !is_valid_email(&email) {
        return Err(AuthError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN));
    }

    let hash = hash_password(password).map_err(AuthError::Internal)?;

    match User::create(&state.db, &email, &hash).await {
        Ok(user) => {
            info!(user_id = %user.id, email = %user.email, "user registered");
            Ok(user)
        }
        Err(e)
            if e.as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false) =>
        {
            warn!(email = %email, "registration for existing email");
            Err(AuthError::DuplicateEmail)
        }
        Err(e) => Err(AuthError::StoreUnavailable(e)),
    }
}

/// Verify credentials and issue a session token.
///
/// The limiter is consulted before anything else: a locked identity is
/// rejected without a store lookup or any hashing work. Unknown email and
/// wrong password both count as a limiter failure and surface the same
/// `InvalidCredentials`.
pub async fn login(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<(String, User), AuthError> {
    let email = normalize_email(email);

    if let Err(remaining) = state.limiter.check(&email) {
        warn!(email = %email, "login attempt while rate limited");
        return Err(AuthError::RateLimited {
            retry_after: remaining.as_secs().max(1),
        });
    }

    // A store outage is surfaced as such: it is not a failed attempt, and it
    // never bypasses the limiter, which was already consulted above.
    let user = User::find_by_email(&state.db, &email)
        .await
        .map_err(AuthError::StoreUnavailable)?;

    let Some(user) = user else {
        state.limiter.record_failure(&email);
        warn!(email = %email, "login for unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    // An unreadable stored hash verifies as false rather than erroring out;
    // either way the caller learns nothing beyond "invalid".
    if !verify_password(password, &user.password_hash).unwrap_or(false) {
        state.limiter.record_failure(&email);
        warn!(user_id = %user.id, "login with wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    state.limiter.reset(&email);
    let token = state.keys.sign(user.id).map_err(AuthError::Internal)?;
    info!(user_id = %user.id, "user logged in");
    Ok((token, user))
}

/// SessionGate: map a presented token to a user id, or reject. Every
/// protected operation resolves its identity through this path and nothing
/// else.
pub fn resolve(keys: &TokenKeys, token: &str) -> Result<Uuid, AuthError> {
    keys.verify(token).ok_or(AuthError::TokenInvalid)
}
