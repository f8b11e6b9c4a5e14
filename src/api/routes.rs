use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::api::middleware::{version_control, ViewGuard};
use crate::api::{app_handlers, view_handlers};
use crate::logic::ViewRegistration;
use crate::store::traits::Store;

/// View codes under which the public API registers itself with the gate.
pub const APPLICATION_LIST_VIEW: &str = "api_v1_application_list";
pub const APPLICATION_DETAIL_VIEW: &str = "api_v1_application_detail";

pub fn create_router<S: Store + 'static>(state: AppState<S>) -> Router {
    let guard = |code: &str| {
        let registration = ViewRegistration::new(code).api(true);
        ViewGuard::new(state.gate.clone(), registration)
    };

    let public_api = Router::new()
        .route(
            "/api/v1/application",
            get(app_handlers::list_applications::<S>)
                .route_layer(from_fn_with_state(guard(APPLICATION_LIST_VIEW), version_control::<S>)),
        )
        .route(
            "/api/v1/application/:version_id",
            get(app_handlers::get_application::<S>)
                .route_layer(from_fn_with_state(guard(APPLICATION_DETAIL_VIEW), version_control::<S>)),
        );

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Gate
        .route("/views/:view_code", get(view_handlers::check_view::<S>))
        // Website versions
        .route("/admin/versions", get(handlers::list_versions::<S>))
        .route("/admin/versions", post(handlers::upsert_version::<S>))
        .route("/admin/versions/batch", post(handlers::batch_versions::<S>))
        .route("/admin/versions/:version_id", get(handlers::get_version::<S>))
        .route("/admin/versions/:version_id", delete(handlers::delete_version::<S>))
        .route("/admin/versions/:version_id/edges", put(handlers::set_version_edges::<S>))
        // Views
        .route("/admin/endpoints", get(view_handlers::list_endpoints::<S>))
        .route("/admin/endpoints", post(view_handlers::upsert_endpoint::<S>))
        .route("/admin/endpoints/batch", post(view_handlers::batch_endpoints::<S>))
        .route("/admin/endpoints/:view_code", get(view_handlers::get_endpoint::<S>))
        .route("/admin/endpoints/:view_code", delete(view_handlers::delete_endpoint::<S>))
        .route("/admin/endpoints/:view_code/chain", get(view_handlers::endpoint_chain::<S>))
        // App versions
        .route("/admin/app-versions", get(app_handlers::list_app_versions::<S>))
        .route("/admin/app-versions", post(app_handlers::upsert_app_version::<S>))
        .route("/admin/app-versions/batch", post(app_handlers::batch_app_versions::<S>))
        .route("/admin/app-versions/:version_id", get(app_handlers::get_app_version::<S>))
        .route("/admin/app-versions/:version_id", delete(app_handlers::delete_app_version::<S>))
        .route(
            "/admin/app-versions/:version_id/endpoints",
            put(app_handlers::set_required_endpoints::<S>),
        )
        .merge(public_api)
        .with_state(state)
}
