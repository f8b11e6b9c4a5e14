use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};

use crate::api::handlers::{
    admin_error, gate_error, store_error, ApiError, AppState, BatchRequest, ListQuery, ListResponse,
};
use crate::api::middleware::gate_response;
use crate::logic::admin::{self, BatchResult};
use crate::logic::{deletion, AdminError, GateSnapshot, Outcome, RedirectResolver, ViewRegistration};
use crate::model::{EndpointRecord, Searchable, ViewCode};
use crate::store::traits::Store;

#[derive(Debug, Default, Deserialize)]
pub struct GateQuery {
    pub is_api: Option<bool>,
    pub require_register: Option<bool>,
    pub view_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChainReport {
    pub view_code_name: ViewCode,
    pub updates: Vec<ViewCode>,
    pub last_update: Option<ViewCode>,
    pub available_updates: Vec<ViewCode>,
    pub last_available_update: Option<ViewCode>,
    pub url: Option<String>,
    pub available: bool,
    pub deprecated: bool,
    pub outcome: Outcome,
}

/// Ask the gate about a view without serving anything behind it.
pub async fn check_view<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(view_code): Path<ViewCode>,
    Query(query): Query<GateQuery>,
) -> Result<Response, ApiError> {
    let registration = ViewRegistration {
        view_code,
        view_name: query.view_name,
        is_api: query.is_api,
        require_register: query.require_register,
    };
    let verdict = state.gate.decide(&registration).await.map_err(gate_error)?;
    Ok(match gate_response(&verdict) {
        Some(response) => response,
        None => Json(verdict).into_response(),
    })
}

pub async fn list_endpoints<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<EndpointRecord>>, ApiError> {
    let now = state.clock.now();
    let records: Vec<EndpointRecord> = state
        .store
        .list_endpoints()
        .await
        .map_err(store_error)?
        .into_iter()
        .filter(|record| query.deprecated.map_or(true, |filter| filter.matches(record, now)))
        .filter(|record| query.q.as_deref().map_or(true, |q| record.matches_search(q)))
        .collect();
    Ok(Json(records.into()))
}

pub async fn get_endpoint<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(view_code): Path<ViewCode>,
) -> Result<Json<EndpointRecord>, ApiError> {
    match state.store.get_endpoint(&view_code).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(admin_error(AdminError::NotFound(format!("view '{}'", view_code)))),
        Err(e) => Err(store_error(e)),
    }
}

pub async fn upsert_endpoint<S: Store + 'static>(
    State(state): State<AppState<S>>,
    RequestJson(record): RequestJson<EndpointRecord>,
) -> Result<(StatusCode, Json<EndpointRecord>), ApiError> {
    let code = record.view_code_name.clone();
    admin::upsert_endpoint(&*state.store, record)
        .await
        .map_err(admin_error)?;
    // Return the stored form, which may carry a derived relative path.
    let stored = state
        .store
        .get_endpoint(&code)
        .await
        .map_err(store_error)?
        .ok_or_else(|| admin_error(AdminError::NotFound(format!("view '{}'", code))))?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn delete_endpoint<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(view_code): Path<ViewCode>,
) -> Result<StatusCode, ApiError> {
    deletion::delete_endpoint(&*state.store, &view_code)
        .await
        .map_err(admin_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn batch_endpoints<S: Store + 'static>(
    State(state): State<AppState<S>>,
    RequestJson(request): RequestJson<BatchRequest<ViewCode>>,
) -> Result<Json<BatchResult>, ApiError> {
    let result = admin::batch_endpoints(&*state.store, &*state.clock, &request.ids, request.action)
        .await
        .map_err(admin_error)?;
    Ok(Json(result))
}

/// Where a view's `new_compatible_view` chain leads right now.
pub async fn endpoint_chain<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(view_code): Path<ViewCode>,
) -> Result<Json<ChainReport>, ApiError> {
    let snapshot = GateSnapshot::load(&*state.store, &view_code)
        .await
        .map_err(store_error)?;
    let record = snapshot
        .catalog
        .get(&view_code)
        .ok_or_else(|| admin_error(AdminError::NotFound(format!("view '{}'", view_code))))?;
    chain_report(&snapshot, record, state.clock.now())
        .map(Json)
        .map_err(admin_error)
}

fn chain_report(
    snapshot: &GateSnapshot,
    record: &EndpointRecord,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<ChainReport, AdminError> {
    let codes = |records: Vec<&EndpointRecord>| -> Vec<ViewCode> {
        records.into_iter().map(|r| r.view_code_name.clone()).collect()
    };

    let mut resolver = RedirectResolver::new(&snapshot.graph, &snapshot.catalog, now);
    let updates = codes(resolver.updates(record)?);
    let last_update = resolver.last_update(record)?.map(|r| r.view_code_name.clone());
    let available_updates = codes(resolver.available_updates(record)?);
    let last_available_update = resolver
        .last_available_update(record)?
        .map(|r| r.view_code_name.clone());
    let outcome = resolver.resolve(record)?;
    let available = resolver.availability().endpoint_available(record)?;
    let deprecated = resolver.availability().endpoint_deprecated(record)?;

    Ok(ChainReport {
        view_code_name: record.view_code_name.clone(),
        url: resolver.url(record),
        updates,
        last_update,
        available_updates,
        last_available_update,
        available,
        deprecated,
        outcome,
    })
}
