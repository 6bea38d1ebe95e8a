//! Serve command - runs the confvault HTTP server.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};

use confvault::{ConfigStore, ErrorKind, FileType, UserStore, backend::sql::DbKind};

use crate::backend::{create_config_store, display_database_url, open_database};
use crate::cli::ServeArgs;
use crate::settings::Settings;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    users: UserStore,
    configs: Arc<ConfigStore>,
}

impl AppState {
    pub fn new(users: UserStore, configs: ConfigStore) -> Self {
        Self {
            users,
            configs: Arc::new(configs),
        }
    }
}

/// Run the confvault server
pub async fn run(args: &ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::load(&args.config)?;
    settings.apply_overrides(args);

    let db = open_database(&settings).await?;
    let configs = create_config_store(&settings, &db).await?;
    let state = AppState::new(UserStore::new(db.clone()), configs);

    let app = router(state);

    // Bind server
    let addr = settings.http_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    // Print startup message
    println!("confvault server started");
    println!();
    println!("HTTP:     http://localhost:{}", local_addr.port());
    println!("Backend:  {}", settings.backend_kind());
    println!(
        "Database: {}",
        display_database_url(&settings.database_url)
    );
    println!();
    println!("Available endpoints:");
    println!("  POST   /config          - Add a config (authenticated)");
    println!("  PUT    /config          - Update a config (authenticated)");
    println!("  DELETE /config          - Delete a config (authenticated)");
    println!("  GET    /config          - Fetch a config (authenticated)");
    println!("  POST   /user            - Register a user");
    println!("  PUT    /user            - Update a user");
    println!("  DELETE /user/{{user_id}}  - Delete a user");
    println!("  GET    /health          - Health check");
    println!();
    println!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    tracing::info!("Database connections closed");
    println!("Server shut down");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to set up SIGINT handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to set up SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = terminate => tracing::info!("Received SIGTERM, initiating graceful shutdown..."),
        _ = interrupt => tracing::info!("Received SIGINT, initiating graceful shutdown..."),
    }
}

/// Build the HTTP router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/config",
            post(handle_add_config)
                .put(handle_update_config)
                .delete(handle_delete_config)
                .get(handle_get_config),
        )
        .route("/user", post(handle_add_user).put(handle_update_user))
        .route("/user/{user_id}", delete(handle_delete_user))
        .route("/health", get(handle_health_endpoint))
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// An error response
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn authentication_failed() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Authentication failed")
    }
}

/// HTTP status for each error kind
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::InvalidCredential => StatusCode::UNAUTHORIZED,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::BackendFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<confvault::Error> for ApiError {
    fn from(err: confvault::Error) -> Self {
        let status = status_for(err.kind());
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(module = err.module(), "Request failed: {err}");
            // Backend details stay in the log
            return Self::new(status, "Internal server error");
        }
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(format!("Invalid request: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Request and response types
// ============================================================================

/// Credentials carried by every config request
#[derive(Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthRequest {
    pub user_id: String,
    pub password: String,
}

/// Body of POST and PUT /config
#[derive(Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ConfigRequest {
    pub user_id: String,
    pub password: String,
    pub filename: String,
    pub file_type: FileType,
    /// Base64-encoded content
    pub data: String,
}

/// Query of GET /config
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct GetConfigQuery {
    pub user_id: String,
    pub password: String,
    pub filename: String,
}

/// Query of DELETE /config
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct FilenameQuery {
    pub filename: String,
}

/// Response of GET /config
#[derive(Deserialize, Serialize)]
pub struct ConfigResponse {
    pub user_id: String,
    pub filename: String,
    pub file_type: FileType,
    /// Base64-encoded content
    pub data: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Body of POST and PUT /user
#[derive(Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UserRequest {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Health check response
#[derive(Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub database: String,
}

fn require(fields: &[(&str, &str)]) -> Result<(), ApiError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "Missing required parameters: {}",
            missing.join(", ")
        )))
    }
}

/// Gate a config operation on the caller's credentials.
///
/// Every failure is reported as 401, without saying whether the user exists.
async fn authenticate(state: &AppState, user_id: &str, password: &str) -> Result<(), ApiError> {
    match state.users.authenticate_user(user_id, password).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ApiError::authentication_failed()),
        Err(e) => {
            if e.is_backend_failure() {
                tracing::error!(user_id, "Authentication failed: {e}");
            } else {
                tracing::debug!(user_id, "Authentication rejected: {e}");
            }
            Err(ApiError::authentication_failed())
        }
    }
}

fn decode_data(data: &str) -> Result<Vec<u8>, ApiError> {
    Base64::decode_vec(data).map_err(|_| ApiError::bad_request("data must be base64"))
}

// ============================================================================
// Config Handlers
// ============================================================================

/// Handler for POST /config
async fn handle_add_config(
    State(state): State<AppState>,
    body: Result<Json<ConfigRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = body?;
    require(&[
        ("user_id", &req.user_id),
        ("password", &req.password),
        ("filename", &req.filename),
    ])?;
    let content = decode_data(&req.data)?;

    authenticate(&state, &req.user_id, &req.password).await?;
    state
        .configs
        .add_config(&req.user_id, &req.filename, req.file_type, &content)
        .await?;
    Ok(StatusCode::CREATED)
}

/// Handler for PUT /config
async fn handle_update_config(
    State(state): State<AppState>,
    body: Result<Json<ConfigRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = body?;
    require(&[
        ("user_id", &req.user_id),
        ("password", &req.password),
        ("filename", &req.filename),
    ])?;
    let content = decode_data(&req.data)?;

    authenticate(&state, &req.user_id, &req.password).await?;
    state
        .configs
        .update_config(&req.user_id, &req.filename, req.file_type, &content)
        .await?;
    Ok(StatusCode::OK)
}

/// Handler for DELETE /config?filename=
async fn handle_delete_config(
    State(state): State<AppState>,
    query: Result<Query<FilenameQuery>, QueryRejection>,
    body: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Query(query) = query?;
    let Json(auth) = body?;
    require(&[
        ("user_id", &auth.user_id),
        ("password", &auth.password),
        ("filename", &query.filename),
    ])?;

    authenticate(&state, &auth.user_id, &auth.password).await?;
    state
        .configs
        .delete_config(&auth.user_id, &query.filename)
        .await?;
    Ok(StatusCode::OK)
}

/// Handler for GET /config?user_id=&password=&filename=
async fn handle_get_config(
    State(state): State<AppState>,
    query: Result<Query<GetConfigQuery>, QueryRejection>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let Query(query) = query?;
    require(&[
        ("user_id", &query.user_id),
        ("password", &query.password),
        ("filename", &query.filename),
    ])?;

    authenticate(&state, &query.user_id, &query.password).await?;
    let artifact = state
        .configs
        .get_config(&query.user_id, &query.filename)
        .await?;

    Ok(Json(ConfigResponse {
        data: Base64::encode_string(&artifact.content),
        user_id: artifact.owner,
        filename: artifact.filename,
        file_type: artifact.file_type,
        created_at: artifact.created_at,
        updated_at: artifact.updated_at,
    }))
}

// ============================================================================
// User Handlers
// ============================================================================

/// Handler for POST /user
async fn handle_add_user(
    State(state): State<AppState>,
    body: Result<Json<UserRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = body?;
    require(&[("user_id", &req.user_id)])?;

    state
        .users
        .add_user(&req.user_id, &req.email, &req.name, &req.password)
        .await?;
    Ok(StatusCode::CREATED)
}

/// Handler for PUT /user
async fn handle_update_user(
    State(state): State<AppState>,
    body: Result<Json<UserRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = body?;
    require(&[("user_id", &req.user_id)])?;

    state
        .users
        .update_user(&req.user_id, &req.email, &req.name, &req.password)
        .await?;
    Ok(StatusCode::OK)
}

/// Handler for DELETE /user/{user_id}
async fn handle_delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.users.delete_user(&user_id).await?;
    Ok(StatusCode::OK)
}

// ============================================================================
// Health Handler
// ============================================================================

/// Handler for GET /health - Health check endpoint
async fn handle_health_endpoint(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.users.database().kind() {
        DbKind::Sqlite => "sqlite",
        DbKind::Postgres => "postgres",
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        backend: state.configs.backend_kind().to_string(),
        database: database.to_string(),
    })
}
