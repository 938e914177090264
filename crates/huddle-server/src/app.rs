use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::{HeaderMap, HeaderValue, Method, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use huddle_api::auth::{self, AppState, AppStateInner};
use huddle_api::messages;
use huddle_api::middleware::{TokenQuery, authenticate, require_auth};
use huddle_db::{Database, SqliteDirectMessages, SqliteFiles, SqliteMessages, SqliteSearch};
use huddle_gateway::completion::{CompletionService, DisabledCompletion, OpenAiCompletion};
use huddle_gateway::connection;
use huddle_gateway::uploads::{MAX_UPLOAD_SIZE, UploadStore};
use huddle_gateway::{Coordinator, CoordinatorHandle, CoordinatorSettings, Repositories};

use crate::config::ServerConfig;

/// Inbound WebSocket frames above this are refused by the socket layer.
const MAX_INBOUND_FRAME: usize = 16 * 1024 * 1024;

/// Start the coordinator and assemble the HTTP application.
pub async fn build(config: &ServerConfig) -> anyhow::Result<Router> {
    let repos = match &config.db_path {
        Some(path) => {
            let db = Arc::new(Database::open(path)?);
            Repositories {
                messages: Box::new(SqliteMessages::new(db.clone())),
                direct: Box::new(SqliteDirectMessages::new(db.clone())),
                files: Box::new(SqliteFiles::new(db.clone())),
                search: Box::new(SqliteSearch::new(db)),
            }
        }
        None => {
            info!("HUDDLE_DB_PATH not set, keeping state in memory");
            Repositories::in_memory()
        }
    };

    let uploads = Arc::new(
        UploadStore::new(&config.upload_dir, &config.public_upload_path, MAX_UPLOAD_SIZE).await?,
    );

    let completion: Arc<dyn CompletionService> = match &config.completion {
        Some(c) => {
            info!("Assistant backend: {} ({})", c.url, c.model);
            Arc::new(OpenAiCompletion::new(&c.url, c.api_key.clone(), &c.model))
        }
        None => {
            info!("HUDDLE_COMPLETION_URL not set, assistant runs in fallback mode");
            Arc::new(DisabledCompletion)
        }
    };

    let settings = CoordinatorSettings {
        completion_timeout: config.completion_timeout,
        ..CoordinatorSettings::default()
    };
    let coordinator = Coordinator::start(repos, uploads.clone(), completion, settings);

    Ok(router(config, coordinator, &uploads))
}

pub fn router(config: &ServerConfig, coordinator: CoordinatorHandle, uploads: &UploadStore) -> Router {
    let app_state: AppState = Arc::new(AppStateInner {
        coordinator,
        jwt_secret: config.jwt_secret.clone(),
    });

    let public_routes = Router::new()
        .route("/auth/guest", post(auth::guest_login))
        .route("/health", get(messages::health))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/auth/user", get(auth::current_user))
        .route("/messages", get(messages::recent_messages))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(app_state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .nest_service(&config.public_upload_path, ServeDir::new(uploads.public_dir()))
        .layer(cors(config.client_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
}

/// The session is checked before the upgrade; a bad token never gets a socket.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let claims = match authenticate(&state.jwt_secret, &headers, query.token.as_deref()) {
        Ok(claims) => claims,
        Err(e) => {
            warn!("Refused gateway upgrade: {}", e);
            return e.into_response();
        }
    };

    let identity = claims.identity();
    let coordinator = state.coordinator.clone();
    ws.max_message_size(MAX_INBOUND_FRAME)
        .on_upgrade(move |socket| connection::handle_connection(socket, coordinator, identity))
}

fn cors(client_origin: Option<&str>) -> CorsLayer {
    let Some(origin) = client_origin else {
        return CorsLayer::permissive();
    };

    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
        Err(_) => {
            warn!("HUDDLE_CLIENT_ORIGIN {:?} is not a valid origin, allowing any", origin);
            CorsLayer::permissive()
        }
    }
}
