pub mod auth;
pub mod messages;
pub mod middleware;

pub use auth::{AppState, AppStateInner, AuthError};
