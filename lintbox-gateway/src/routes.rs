//! Axum route handlers for the lintbox API.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use lintbox_core::{FormatOutcome, LintOutcome, RequestConfig, ShareId, SharePayload};

use crate::{error::GatewayError, service::Playground, settings::CorsOrigins};

// ── Request / response types ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LintRequest {
    pub source_code: String,
    pub config: RequestConfig,
    #[serde(default)]
    pub with_fix: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatRequest {
    pub source_code: String,
    pub config: RequestConfig,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub request_id: ShareId,
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the application router, mounting every route under `prefix`.
pub fn create_router(playground: Playground, prefix: &str, cors: &CorsOrigins) -> Router {
    let router = Router::new()
        .route(&format!("{prefix}/lint"), post(lint))
        .route(&format!("{prefix}/format"), post(format))
        .route(&format!("{prefix}/share"), post(share))
        .route(&format!("{prefix}/share/{{id}}"), get(load_share))
        .route(&format!("{prefix}/engine-version"), get(engine_version))
        .route(&format!("{prefix}/health"), get(health))
        .with_state(playground)
        .layer(TraceLayer::new_for_http());

    match cors_layer(cors) {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

fn cors_layer(cors: &CorsOrigins) -> Option<CorsLayer> {
    match cors {
        CorsOrigins::None => None,
        CorsOrigins::Any => Some(CorsLayer::permissive()),
        CorsOrigins::List(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!(%origin, error = %e, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            Some(
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([Method::GET, Method::POST])
                    .allow_headers([header::CONTENT_TYPE]),
            )
        }
    }
}

fn rejected(rejection: &JsonRejection) -> GatewayError {
    GatewayError::InvalidRequest(rejection.body_text())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// `GET {prefix}/health`: liveness check.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// `GET {prefix}/engine-version`: name and version of the engine in use.
pub async fn engine_version(State(playground): State<Playground>) -> impl IntoResponse {
    Json(playground.engine_info())
}

/// `POST {prefix}/lint`: lint a source text.
///
/// # Errors
/// Returns [`GatewayError::InvalidRequest`] for malformed bodies and
/// whatever [`Playground::lint`] reports.
pub async fn lint(
    State(playground): State<Playground>,
    body: Result<Json<LintRequest>, JsonRejection>,
) -> Result<Json<LintOutcome>, GatewayError> {
    let Json(request) = body.map_err(|e| rejected(&e))?;
    let outcome = playground
        .lint(request.source_code, &request.config, request.with_fix)
        .await?;
    Ok(Json(outcome))
}

/// `POST {prefix}/format`: format a source text.
///
/// # Errors
/// Returns [`GatewayError::InvalidRequest`] for malformed bodies and
/// whatever [`Playground::format`] reports.
pub async fn format(
    State(playground): State<Playground>,
    body: Result<Json<FormatRequest>, JsonRejection>,
) -> Result<Json<FormatOutcome>, GatewayError> {
    let Json(request) = body.map_err(|e| rejected(&e))?;
    let outcome = playground.format(request.source_code, &request.config).await?;
    Ok(Json(outcome))
}

/// `POST {prefix}/share`: store a request snapshot and return its ID.
///
/// # Errors
/// Returns [`GatewayError::InvalidRequest`] for malformed bodies and
/// whatever [`Playground::share`] reports.
pub async fn share(
    State(playground): State<Playground>,
    body: Result<Json<SharePayload>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let Json(payload) = body.map_err(|e| rejected(&e))?;
    let request_id = playground.share(payload).await?;
    Ok((StatusCode::CREATED, Json(ShareResponse { request_id })))
}

/// `GET {prefix}/share/{id}`: load a stored snapshot.
///
/// # Errors
/// Returns [`GatewayError::Store`] (404) for unknown or expired IDs.
pub async fn load_share(
    State(playground): State<Playground>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let shared = playground.load(&ShareId::new(id)).await?;
    Ok(Json(shared))
}
