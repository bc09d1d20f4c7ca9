mod catalog;
mod communities;
mod config;
mod error;
mod models;
mod mongo;
mod neo4j;
mod outcome;
mod pipelines;
mod recommender;
mod routes;
mod templates;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    catalog::Services, communities::GdsLouvain, config::Config, mongo::FilmStore,
    neo4j::GraphStore,
};

pub struct AppState {
    pub services: Services,
}

impl AppState {
    /// Store handles are created here but connect lazily, so a store that is
    /// down only fails the interactions that need it.
    pub fn new(config: &Config) -> Self {
        let services = Services {
            films: FilmStore::new(config.mongo.clone(), config.query_timeout),
            graph: GraphStore::new(config.neo4j.clone(), Box::new(GdsLouvain::default())),
            query_timeout: config.query_timeout,
        };
        Self { services }
    }
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/run/{id}", get(routes::run))
        .route("/api/run/{id}", get(routes::api_run))
        .route("/health", get(routes::health))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "info,cinegraph=debug,neo4rs=warn,mongodb=warn".to_string()
        }))
        .init();

    let config = Config::from_env()?;
    let state = Arc::new(AppState::new(&config));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(
        addr = %config.addr,
        database = %config.mongo.database,
        graph = %config.neo4j.uri,
        query_timeout_secs = config.query_timeout.as_secs(),
        "listening"
    );
    axum::serve(listener, app(state)).await?;

    Ok(())
}
