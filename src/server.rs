//! HTTP server.
//!
//! Exposes the two pass-through functions and the decision store as a JSON
//! API for browser clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/functions/v1/generate-suggestions` | AI pros/cons for `{title, description?}` |
//! | `POST` | `/functions/v1/web-search` | Research answer for `{query}` |
//! | `POST` | `/users` | Register a user, returns the profile |
//! | `GET`  | `/profile` | Caller's profile |
//! | `GET`  | `/decisions` | Caller's decisions, newest first |
//! | `POST` | `/decisions` | Create a decision |
//! | `GET`  | `/decisions/{id}` | Decision with items, tally, and leaning |
//! | `PUT`  | `/decisions/{id}` | Replace title and description |
//! | `DELETE` | `/decisions/{id}` | Delete a decision and its items |
//! | `POST` | `/decisions/{id}/items` | Add a pro or con |
//! | `DELETE` | `/decisions/{id}/items/{item_id}` | Delete an item |
//! | `POST` | `/decisions/{id}/suggestions` | Generate suggestions and store them as items |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Store endpoints identify the caller by the `X-User-Id` header.
//!
//! # Error Contract
//!
//! Every error body is `{ "error": "<message>" }`. The function endpoints
//! answer every failure with `500`, so callers cannot tell error kinds
//! apart. Store endpoints use `400` for bad input, `404` for rows that do
//! not exist or belong to someone else, and `500` otherwise.
//!
//! # CORS
//!
//! Any origin is allowed and every response lists the accepted request
//! headers. `OPTIONS` on any route is answered with an empty `200` before
//! the handler runs.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequestParts, Path, Request, State},
    http::{
        header::{ACCESS_CONTROL_ALLOW_HEADERS, AUTHORIZATION, CONTENT_TYPE},
        request::Parts,
        HeaderName, HeaderValue, Method, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{Config, Credentials};
use crate::db;
use crate::error::{ProxyError, StoreError};
use crate::leaning::{Leaning, Tally};
use crate::llm::{ChatCompletion, HttpChatClient};
use crate::models::{
    Decision, DecisionItem, ItemType, Profile, SearchAnswer, SearchRequest, SuggestionRequest,
    Suggestions,
};
use crate::store;
use crate::suggest::generate_suggestions;
use crate::web_search::run_web_search;

/// Header carrying the caller's user id.
pub const USER_HEADER: &str = "x-user-id";

const ALLOWED_HEADERS: &str = "authorization, x-client-info, apikey, content-type, x-user-id";

fn allowed_header_names() -> [HeaderName; 5] {
    [
        AUTHORIZATION,
        HeaderName::from_static("x-client-info"),
        HeaderName::from_static("apikey"),
        CONTENT_TYPE,
        HeaderName::from_static(USER_HEADER),
    ]
}

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    credentials: Arc<Credentials>,
    pool: SqlitePool,
    chat: Arc<dyn ChatCompletion>,
}

impl AppState {
    pub fn new(
        config: Config,
        credentials: Credentials,
        pool: SqlitePool,
        chat: Arc<dyn ChatCompletion>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            pool,
            chat,
        }
    }
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
///
/// `credentials` are captured once here and shared by every request.
pub async fn run_server(config: &Config, credentials: Credentials) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = db::connect(config).await?;
    let chat = Arc::new(HttpChatClient::new(config.upstream.timeout())?);

    if credentials.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; suggestion requests will fail");
    }
    if credentials.search_api_key.is_none() {
        tracing::warn!("PERPLEXITY_API_KEY is not set; web search requests will fail");
    }

    let app = router(AppState::new(config.clone(), credentials, pool, chat));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the application router with CORS and request tracing attached.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(allowed_header_names());

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/functions/v1/generate-suggestions",
            post(handle_generate_suggestions),
        )
        .route("/functions/v1/web-search", post(handle_web_search))
        .route("/users", post(handle_register))
        .route("/profile", get(handle_profile))
        .route(
            "/decisions",
            get(handle_list_decisions).post(handle_create_decision),
        )
        .route(
            "/decisions/{id}",
            get(handle_get_decision)
                .put(handle_update_decision)
                .delete(handle_delete_decision),
        )
        .route("/decisions/{id}/items", post(handle_add_item))
        .route("/decisions/{id}/items/{item_id}", delete(handle_delete_item))
        .route("/decisions/{id}/suggestions", post(handle_suggest_and_save))
        .layer(middleware::from_fn(preflight))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Answers any `OPTIONS` request with an empty `200` and attaches the
/// allowed request headers to every response.
async fn preflight(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };
    response.headers_mut().insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
            },
            StoreError::Invalid(msg) => bad_request(msg),
            StoreError::Database(e) => {
                tracing::error!(error = %e, "database error");
                internal("database error")
            }
        }
    }
}

/// Function endpoints report every failure the same way.
fn function_error(function: &str, err: ProxyError) -> AppError {
    tracing::error!(function, error = %err, "function call failed");
    internal(err.to_string())
}

// ============ Caller identity ============

/// The caller's user id from the `X-User-Id` header.
pub struct UserId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| UserId(v.to_string()))
            .ok_or_else(|| bad_request("missing X-User-Id header"))
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Functions ============

async fn handle_generate_suggestions(
    State(state): State<AppState>,
    payload: Result<Json<SuggestionRequest>, JsonRejection>,
) -> Result<Json<Suggestions>, AppError> {
    let Json(request) = payload.map_err(|e| {
        tracing::error!(error = %e, "invalid suggestion request body");
        internal(e.body_text())
    })?;

    let suggestions = generate_suggestions(
        state.chat.as_ref(),
        &state.config.suggestions,
        &state.credentials,
        &request,
    )
    .await
    .map_err(|e| function_error("generate-suggestions", e))?;

    Ok(Json(suggestions))
}

async fn handle_web_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchAnswer>, AppError> {
    let Json(request) = payload.map_err(|e| {
        tracing::error!(error = %e, "invalid web search request body");
        internal(e.body_text())
    })?;

    let answer = run_web_search(
        state.chat.as_ref(),
        &state.config.search,
        &state.credentials,
        &request.query,
    )
    .await
    .map_err(|e| function_error("web-search", e))?;

    Ok(Json(answer))
}

// ============ Users ============

#[derive(Deserialize, Default)]
struct RegisterBody {
    #[serde(default)]
    display_name: Option<String>,
}

async fn handle_register(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    // The body is optional; an empty request registers an unnamed user.
    let body: RegisterBody = if body.is_empty() {
        RegisterBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("invalid body: {}", e)))?
    };
    let profile = store::register_user(&state.pool, body.display_name.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn handle_profile(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(store::get_profile(&state.pool, &user).await?))
}

// ============ Decisions ============

#[derive(Deserialize)]
struct DecisionBody {
    title: String,
    #[serde(default)]
    description: Option<String>,
}

/// A decision with its items and the derived leaning.
#[derive(Serialize)]
pub struct DecisionDetail {
    #[serde(flatten)]
    pub decision: Decision,
    pub items: Vec<DecisionItem>,
    pub tally: Tally,
    pub leaning: Leaning,
}

impl DecisionDetail {
    pub fn new(decision: Decision, items: Vec<DecisionItem>) -> Self {
        let tally = Tally::from_items(&items);
        Self {
            decision,
            items,
            tally,
            leaning: tally.leaning(),
        }
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| bad_request(e.body_text()))
}

async fn handle_list_decisions(
    State(state): State<AppState>,
    UserId(user): UserId,
) -> Result<Json<Vec<Decision>>, AppError> {
    Ok(Json(store::list_decisions(&state.pool, &user).await?))
}

async fn handle_create_decision(
    State(state): State<AppState>,
    UserId(user): UserId,
    payload: Result<Json<DecisionBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Decision>), AppError> {
    let body = json_body(payload)?;
    let decision =
        store::create_decision(&state.pool, &user, &body.title, body.description.as_deref())
            .await?;
    Ok((StatusCode::CREATED, Json(decision)))
}

async fn handle_get_decision(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> Result<Json<DecisionDetail>, AppError> {
    let decision = store::get_decision(&state.pool, &user, &id).await?;
    let items = store::list_items(&state.pool, &user, &id).await?;
    Ok(Json(DecisionDetail::new(decision, items)))
}

async fn handle_update_decision(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<String>,
    payload: Result<Json<DecisionBody>, JsonRejection>,
) -> Result<Json<Decision>, AppError> {
    let body = json_body(payload)?;
    let decision = store::update_decision(
        &state.pool,
        &user,
        &id,
        &body.title,
        body.description.as_deref(),
    )
    .await?;
    Ok(Json(decision))
}

async fn handle_delete_decision(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    store::delete_decision(&state.pool, &user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ Items ============

#[derive(Deserialize)]
struct ItemBody {
    content: String,
    item_type: ItemType,
}

async fn handle_add_item(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<String>,
    payload: Result<Json<ItemBody>, JsonRejection>,
) -> Result<(StatusCode, Json<DecisionItem>), AppError> {
    let body = json_body(payload)?;
    let item = store::add_item(&state.pool, &user, &id, body.item_type, &body.content).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn handle_delete_item(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    store::delete_item(&state.pool, &user, &id, &item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Generates pros and cons for a stored decision and saves them in one
/// batch. Nothing is stored if generation or any insert fails.
async fn handle_suggest_and_save(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<DecisionDetail>), AppError> {
    let decision = store::get_decision(&state.pool, &user, &id).await?;

    let request = SuggestionRequest {
        title: decision.title.clone(),
        description: decision.description.clone(),
    };
    let suggestions = generate_suggestions(
        state.chat.as_ref(),
        &state.config.suggestions,
        &state.credentials,
        &request,
    )
    .await
    .map_err(|e| function_error("generate-suggestions", e))?;

    let generated = suggestions.pros.len() + suggestions.cons.len();
    let items = suggestions.into_items();
    if items.len() < generated {
        tracing::warn!(
            decision = %id,
            skipped = generated - items.len(),
            "model returned blank suggestions"
        );
    }
    store::insert_items(&state.pool, &user, &id, &items).await?;

    let items = store::list_items(&state.pool, &user, &id).await?;
    Ok((StatusCode::CREATED, Json(DecisionDetail::new(decision, items))))
}
