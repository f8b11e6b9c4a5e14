use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::Deserialize;

use crate::api::handlers::{admin_error, store_error, ApiError, AppState, BatchRequest, ListQuery, ListResponse};
use crate::logic::admin::{self, AppVersionReport, BatchResult};
use crate::logic::{deletion, AdminError};
use crate::model::{AppVersion, AppVersionSummary, Searchable, VersionId, ViewCode};
use crate::store::traits::Store;

#[derive(Debug, Deserialize)]
pub struct RequiredEndpointsRequest {
    pub view_codes: Vec<ViewCode>,
}

pub async fn list_app_versions<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<AppVersion>>, ApiError> {
    let now = state.clock.now();
    let apps: Vec<AppVersion> = state
        .store
        .list_app_versions()
        .await
        .map_err(store_error)?
        .into_iter()
        .filter(|app| query.deprecated.map_or(true, |filter| filter.matches(app, now)))
        .filter(|app| query.q.as_deref().map_or(true, |q| app.matches_search(q)))
        .collect();
    Ok(Json(apps.into()))
}

pub async fn get_app_version<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(version_id): Path<VersionId>,
) -> Result<Json<AppVersionReport>, ApiError> {
    let report = admin::app_version_report(&*state.store, &*state.clock, version_id)
        .await
        .map_err(admin_error)?;
    Ok(Json(report))
}

pub async fn upsert_app_version<S: Store + 'static>(
    State(state): State<AppState<S>>,
    RequestJson(app): RequestJson<AppVersion>,
) -> Result<(StatusCode, Json<AppVersion>), ApiError> {
    admin::upsert_app_version(&*state.store, app.clone())
        .await
        .map_err(admin_error)?;
    Ok((StatusCode::CREATED, Json(app)))
}

pub async fn set_required_endpoints<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(version_id): Path<VersionId>,
    RequestJson(request): RequestJson<RequiredEndpointsRequest>,
) -> Result<Json<AppVersionReport>, ApiError> {
    admin::set_required_endpoints(&*state.store, version_id, request.view_codes)
        .await
        .map_err(admin_error)?;
    let report = admin::app_version_report(&*state.store, &*state.clock, version_id)
        .await
        .map_err(admin_error)?;
    Ok(Json(report))
}

pub async fn delete_app_version<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(version_id): Path<VersionId>,
) -> Result<StatusCode, ApiError> {
    deletion::delete_app_version(&*state.store, version_id)
        .await
        .map_err(admin_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn batch_app_versions<S: Store + 'static>(
    State(state): State<AppState<S>>,
    RequestJson(request): RequestJson<BatchRequest<VersionId>>,
) -> Result<Json<BatchResult>, ApiError> {
    let result = admin::batch_app_versions(&*state.store, &*state.clock, &request.ids, request.action)
        .await
        .map_err(admin_error)?;
    Ok(Json(result))
}

// Public read API

pub async fn list_applications<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<AppVersionSummary>>, ApiError> {
    let apps = state.store.list_app_versions().await.map_err(store_error)?;
    Ok(Json(apps.into_iter().map(AppVersionSummary::from).collect()))
}

pub async fn get_application<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(version_id): Path<VersionId>,
) -> Result<Json<AppVersionSummary>, ApiError> {
    match state.store.get_app_version(version_id).await {
        Ok(Some(app)) => Ok(Json(app.into())),
        Ok(None) => Err(admin_error(AdminError::NotFound(format!("app version {}", version_id)))),
        Err(e) => Err(store_error(e)),
    }
}
