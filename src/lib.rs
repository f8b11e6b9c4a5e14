pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

pub use api::routes::create_router;
pub use api::{AppState, ServiceState};

pub use logic::{
    AvailabilityResolver, Clock, FixedClock, Gate, GateDecision, GateError, GateVerdict, GraphCycleError,
    GraphError, NotRegisteredError, Outcome, RedirectResolver, SystemClock, ViewRegistration,
};

pub use model::*;

pub use seed::*;

pub use store::{MemoryStore, PostgresStore, Store};

use std::sync::Arc;

use crate::config::{AppConfig, StoreBackend};

/// Seed when asked to, then serve the router for `store` until the listener closes.
pub async fn serve_store<S: Store + 'static>(store: Arc<S>, config: &AppConfig) -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    if config.store.load_seed_data || std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        log::info!("loading seed data");
        seed::load_seed_data(&*store).await?;
    }

    let state = Arc::new(ServiceState::new(store, Arc::new(SystemClock), config.gate.clone()));
    let app = create_router(state);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("version gate listening on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}

/// Load configuration, open the configured store and serve.
pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    match config.store.backend {
        StoreBackend::Memory => {
            log::info!("using the in-memory store");
            serve_store(Arc::new(MemoryStore::new()), &config).await
        }
        StoreBackend::Postgres => {
            let database_url = config.database_url()?;
            let max_connections = config.database.max_connections.unwrap_or(20);
            let postgres_store = PostgresStore::new(&database_url, max_connections).await?;
            postgres_store.migrate().await?;
            serve_store(Arc::new(postgres_store), &config).await
        }
    }
}
