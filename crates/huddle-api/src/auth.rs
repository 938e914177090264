use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::{info, warn};

use huddle_gateway::CoordinatorHandle;
use huddle_types::api::{Claims, GuestLoginRequest, SessionResponse};
use huddle_types::models::Identity;

const GUEST_SESSION_HOURS: i64 = 24;

const MAX_NAME_CHARS: usize = 32;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub coordinator: CoordinatorHandle,
    pub jwt_secret: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing session token")]
    MissingToken,

    #[error("invalid session token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

/// Issue a session for a new guest identity.
pub async fn guest_login(
    State(state): State<AppState>,
    Json(req): Json<GuestLoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = req.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(StatusCode::BAD_REQUEST);
    }

    let identity = Identity::guest(name);
    let token = create_token(&state.jwt_secret, &identity, guest_ttl()).map_err(|e| {
        warn!("Failed to sign guest token: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    info!("Guest session issued for {}", identity);
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user: identity,
            token,
        }),
    ))
}

/// The identity behind the caller's session.
pub async fn current_user(Extension(claims): Extension<Claims>) -> Json<Identity> {
    Json(claims.identity())
}

/// Guest sessions expire after a day; there is no refresh.
pub fn guest_ttl() -> chrono::Duration {
    chrono::Duration::hours(GUEST_SESSION_HOURS)
}

pub fn create_token(
    secret: &str,
    identity: &Identity,
    ttl: chrono::Duration,
) -> Result<String, AuthError> {
    let exp = (chrono::Utc::now() + ttl).timestamp() as usize;
    let claims = Claims::for_identity(identity, exp);

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-for-unit-tests";

    #[test]
    fn tokens_round_trip_identity() {
        let identity = Identity::guest("ann");
        let token = create_token(SECRET, &identity, guest_ttl()).unwrap();
        let claims = verify_token(SECRET, &token).unwrap();
        assert_eq!(claims.identity(), identity);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token(SECRET, &Identity::guest("ann"), guest_ttl()).unwrap();
        assert!(matches!(
            verify_token("another-secret", &token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = create_token(
            SECRET,
            &Identity::guest("ann"),
            chrono::Duration::hours(-2),
        )
        .unwrap();
        assert!(verify_token(SECRET, &token).is_err());
    }
}
