pub mod app_handlers;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod view_handlers;

pub use handlers::{AppState, ErrorResponse, ServiceState};
pub use routes::*;
