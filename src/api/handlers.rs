use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::GateConfig;
use crate::logic::admin::{self, BatchResult, VersionReport, VersionSummary};
use crate::logic::deletion;
use crate::logic::{AdminError, Clock, Gate, GateError, GraphError};
use crate::model::{BatchAction, DeprecatedFilter, VersionId, WebVersion};
use crate::store::traits::Store;

/// Shared handler state: the store, the gate built over it and the clock.
pub struct ServiceState<S: Store> {
    pub store: Arc<S>,
    pub gate: Gate<S>,
    pub clock: Arc<dyn Clock>,
}

impl<S: Store> ServiceState<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, gate_config: GateConfig) -> Self {
        let gate = Gate::new(Arc::clone(&store), Arc::clone(&clock), gate_config);
        Self { store, gate, clock }
    }
}

pub type AppState<S> = Arc<ServiceState<S>>;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub deprecated: Option<DeprecatedFilter>,
    /// Case-insensitive search term.
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest<K> {
    pub action: BatchAction,
    pub ids: Vec<K>,
}

#[derive(Debug, Deserialize)]
pub struct EdgesRequest {
    #[serde(default)]
    pub previous_versions: BTreeSet<VersionId>,
    #[serde(default)]
    pub incompatible_previous_versions: BTreeSet<VersionId>,
}

pub fn admin_error(err: AdminError) -> ApiError {
    let status = match &err {
        AdminError::Validation(_) => StatusCode::BAD_REQUEST,
        AdminError::NotFound(_) | AdminError::Graph(GraphError::UnknownVersion(_)) => StatusCode::NOT_FOUND,
        AdminError::Restricted { .. } => StatusCode::CONFLICT,
        AdminError::Graph(GraphError::Cycle(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        AdminError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        log::error!("admin operation failed: {:#}", err);
    }
    (status, Json(ErrorResponse::new(&err.to_string())))
}

pub fn gate_error(err: GateError) -> ApiError {
    let status = match &err {
        GateError::NotRegistered(_) => StatusCode::NOT_FOUND,
        GateError::Graph(_) | GateError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        log::error!("gate decision failed: {:#}", err);
    }
    (status, Json(ErrorResponse::new(&err.to_string())))
}

pub fn store_error(err: anyhow::Error) -> ApiError {
    log::error!("store error: {:#}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(&err.to_string())),
    )
}

// Website versions

pub async fn list_versions<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<VersionSummary>>, ApiError> {
    let versions = admin::list_versions(&*state.store, &*state.clock, query.deprecated, query.q.as_deref())
        .await
        .map_err(admin_error)?;
    Ok(Json(versions.into()))
}

pub async fn get_version<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(version_id): Path<VersionId>,
) -> Result<Json<VersionReport>, ApiError> {
    let report = admin::version_report(&*state.store, &*state.clock, version_id)
        .await
        .map_err(admin_error)?;
    Ok(Json(report))
}

pub async fn upsert_version<S: Store + 'static>(
    State(state): State<AppState<S>>,
    RequestJson(version): RequestJson<WebVersion>,
) -> Result<(StatusCode, Json<WebVersion>), ApiError> {
    admin::upsert_version(&*state.store, version.clone())
        .await
        .map_err(admin_error)?;
    Ok((StatusCode::CREATED, Json(version)))
}

pub async fn set_version_edges<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(version_id): Path<VersionId>,
    RequestJson(edges): RequestJson<EdgesRequest>,
) -> Result<Json<WebVersion>, ApiError> {
    let version = admin::set_version_edges(
        &*state.store,
        version_id,
        edges.previous_versions,
        edges.incompatible_previous_versions,
    )
    .await
    .map_err(admin_error)?;
    Ok(Json(version))
}

pub async fn delete_version<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(version_id): Path<VersionId>,
) -> Result<StatusCode, ApiError> {
    deletion::delete_version(&*state.store, version_id)
        .await
        .map_err(admin_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn batch_versions<S: Store + 'static>(
    State(state): State<AppState<S>>,
    RequestJson(request): RequestJson<BatchRequest<VersionId>>,
) -> Result<Json<BatchResult>, ApiError> {
    let result = admin::batch_versions(&*state.store, &*state.clock, &request.ids, request.action)
        .await
        .map_err(admin_error)?;
    Ok(Json(result))
}
