use serde::{Deserialize, Serialize};

use crate::models::{Identity, IdentityId, IdentityKind};

// -- Session token claims --

/// Claims carried by session tokens. Shared by huddle-api (issuing guest
/// tokens, REST middleware) and the WebSocket upgrade path. Tokens minted by
/// the external OAuth flow use the same claim set and secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: IdentityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub kind: IdentityKind,
    pub exp: usize,
}

impl Claims {
    pub fn for_identity(identity: &Identity, exp: usize) -> Self {
        Self {
            sub: identity.id.clone(),
            name: identity.display_name.clone(),
            avatar: identity.avatar.clone(),
            kind: identity.kind,
            exp,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: self.sub.clone(),
            display_name: self.name.clone(),
            avatar: self.avatar.clone(),
            kind: self.kind,
        }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuestLoginRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: Identity,
    pub token: String,
}

// -- History --

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    50
}

// -- Health --

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub connections: usize,
}
