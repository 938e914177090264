use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde::Deserialize;

use huddle_types::api::Claims;

use crate::auth::{AppState, AuthError, verify_token};

/// `?token=` on the WebSocket upgrade, for clients that cannot set headers.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Resolve the caller's session. The `Authorization: Bearer` header wins
/// over the query token.
pub fn authenticate(
    secret: &str,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<Claims, AuthError> {
    let bearer = headers.typed_get::<Authorization<Bearer>>();
    let token = match &bearer {
        Some(Authorization(bearer)) => bearer.token(),
        None => query_token.ok_or(AuthError::MissingToken)?,
    };
    verify_token(secret, token)
}

/// Validate the session and stash its claims for the handler.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = authenticate(&state.jwt_secret, req.headers(), None)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use huddle_types::models::Identity;

    use crate::auth::{create_token, guest_ttl};

    const SECRET: &str = "middleware-test-secret";

    #[test]
    fn header_and_query_tokens_are_accepted() {
        let identity = Identity::guest("ann");
        let token = create_token(SECRET, &identity, guest_ttl()).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        assert_eq!(authenticate(SECRET, &headers, None).unwrap().sub, identity.id);

        let empty = HeaderMap::new();
        assert_eq!(authenticate(SECRET, &empty, Some(&token)).unwrap().sub, identity.id);
    }

    #[test]
    fn missing_or_garbage_tokens_fail() {
        let empty = HeaderMap::new();
        assert!(matches!(
            authenticate(SECRET, &empty, None),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            authenticate(SECRET, &empty, Some("not-a-jwt")),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
