use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::campaign::{
    execute_batch_upsert, BatchRequest, BatchSummary, CampaignFilter, CampaignRecord, UpsertError,
    ValidationError,
};
use crate::config::Config;
use crate::store::{campaigns as campaign_store, Database, StoreError};
use crate::users::{self, LoginRequest, NewUserRequest, UserError, UserProfile};

#[derive(Clone)]
pub struct ApiState {
    config: Config,
    db: Database,
}

impl ApiState {
    pub fn new(config: Config, db: Database) -> Self {
        Self { config, db }
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

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

    /// Logs `error` and answers 500 with `message`; store details stay in the log.
    fn internal(error: impl std::fmt::Display, message: &'static str) -> Self {
        error!("request failed: {error}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

const INTERNAL_ERROR: &str = "Internal server error";
const WRITE_FAILED: &str = "Failed to insert/update some data";

type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::internal(err, INTERNAL_ERROR)
    }
}

impl From<UpsertError> for ApiError {
    fn from(err: UpsertError) -> Self {
        match err {
            UpsertError::EmptyBatch => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            UpsertError::BeginFailure(_)
            | UpsertError::PartialWriteFailure { .. }
            | UpsertError::CommitFailure(_) => Self::internal(err, WRITE_FAILED),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        let status = match &err {
            UserError::MissingFields(_) | UserError::UnknownRole(_) => StatusCode::BAD_REQUEST,
            UserError::AlreadyExists(_) => StatusCode::CONFLICT,
            UserError::NotFound(_) => StatusCode::NOT_FOUND,
            UserError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            UserError::Disabled => StatusCode::FORBIDDEN,
            UserError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return Self::internal(err, INTERNAL_ERROR);
        }
        Self::new(status, err.to_string())
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct UpdateResponse {
    message: &'static str,
    #[serde(flatten)]
    summary: BatchSummary,
}

#[derive(Debug, Serialize)]
struct CampaignsResponse {
    records: Vec<CampaignRecord>,
}

#[derive(Debug, Serialize)]
struct LastUpdatedResponse {
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct UsersResponse {
    users: Vec<UserProfile>,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

pub fn router(state: ApiState) -> Router {
    let permissive_cors = state.config.server.permissive_cors;
    let app = Router::new()
        .route("/health", get(health))
        .route("/update", put(update_campaigns))
        .route("/campaigns", get(list_campaigns))
        .route("/campaigns/last-updated", get(last_updated))
        .route("/login", post(login))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:contact", delete(delete_user))
        .route("/users/:contact/enable", put(enable_user))
        .route("/users/:contact/disable", put(disable_user))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if permissive_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app.layer(cors)
    } else {
        app
    }
}

pub async fn run_server(config: Config, db: Database, bind: SocketAddr) -> Result<()> {
    let app = router(ApiState::new(config, db));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("campaign API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse { status: "ok" })
}

async fn update_campaigns(
    State(state): State<ApiState>,
    payload: JsonBody<BatchRequest>,
) -> ApiResult<UpdateResponse> {
    let Json(request) = payload?;
    let batch = request.into_batch(state.config.campaigns.require_user_id)?;
    info!(
        month = %batch.month,
        state = %batch.location.state,
        entries = batch.campaigns.len(),
        "campaign batch accepted"
    );
    let summary = state
        .db
        .run(move |conn| execute_batch_upsert(conn, &batch))
        .await??;
    Ok(ok(UpdateResponse {
        message: "All data inserted/updated successfully!",
        summary,
    }))
}

async fn list_campaigns(
    State(state): State<ApiState>,
    Query(filter): Query<CampaignFilter>,
) -> ApiResult<CampaignsResponse> {
    let records = state
        .db
        .run(move |conn| campaign_store::list_campaigns(conn, &filter))
        .await??;
    Ok(ok(CampaignsResponse { records }))
}

async fn last_updated(
    State(state): State<ApiState>,
    Query(filter): Query<CampaignFilter>,
) -> ApiResult<LastUpdatedResponse> {
    let last_updated = state
        .db
        .run(move |conn| campaign_store::last_updated(conn, &filter))
        .await??;
    Ok(ok(LastUpdatedResponse { last_updated }))
}

async fn login(
    State(state): State<ApiState>,
    payload: JsonBody<LoginRequest>,
) -> ApiResult<UserProfile> {
    let Json(request) = payload?;
    let profile = state
        .db
        .run(move |conn| users::authenticate(conn, &request))
        .await??;
    info!(contact = %profile.contact_number, "login succeeded");
    Ok(ok(profile))
}

async fn list_users(State(state): State<ApiState>) -> ApiResult<UsersResponse> {
    let profiles = state.db.run(|conn| users::list_users(conn)).await??;
    Ok(ok(UsersResponse { users: profiles }))
}

async fn create_user(
    State(state): State<ApiState>,
    payload: JsonBody<NewUserRequest>,
) -> std::result::Result<(StatusCode, Json<ApiResponse<UserProfile>>), ApiError> {
    let Json(request) = payload?;
    let profile = state
        .db
        .run(move |conn| users::create_user(conn, request))
        .await??;
    Ok((StatusCode::CREATED, ok(profile)))
}

async fn enable_user(
    State(state): State<ApiState>,
    Path(contact): Path<String>,
) -> ApiResult<MessageResponse> {
    set_user_enabled(state, contact, true).await
}

async fn disable_user(
    State(state): State<ApiState>,
    Path(contact): Path<String>,
) -> ApiResult<MessageResponse> {
    set_user_enabled(state, contact, false).await
}

async fn set_user_enabled(
    state: ApiState,
    contact: String,
    enable: bool,
) -> ApiResult<MessageResponse> {
    let message = format!(
        "user {contact} {}",
        if enable { "enabled" } else { "disabled" }
    );
    state
        .db
        .run(move |conn| users::set_enabled(conn, &contact, enable))
        .await??;
    Ok(ok(MessageResponse { message }))
}

async fn delete_user(
    State(state): State<ApiState>,
    Path(contact): Path<String>,
) -> ApiResult<MessageResponse> {
    let message = format!("user {contact} deleted");
    state
        .db
        .run(move |conn| users::delete_user(conn, &contact))
        .await??;
    Ok(ok(MessageResponse { message }))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}
