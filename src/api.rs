//! Application router for Persona Hub
//!
//! Merges the module routers into a single axum `Router` with CORS and
//! request tracing.
//!
//! ## Endpoint Map
//!
//! | Prefix            | Module   | Description                         |
//! |-------------------|----------|-------------------------------------|
//! | `/health`         | api      | Health probe                        |
//! | `/admin/persona*` | personas | Visibility, ordering, admin listing |
//! | `/persona*`       | personas | Persona CRUD, prompt explorer       |

use crate::auth::PrincipalResolver;
use crate::config::PersonaHubConfig;
use crate::error::Result;
use crate::personas::{personas_router, PersonaStore, PersonasState};
use axum::{
    http::{header, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Open the store described by `config` and build the application
pub async fn build_from_config(config: &PersonaHubConfig) -> Result<Router> {
    let store = PersonaStore::open(config.storage.dir.clone(), &config.personas).await?;
    let state = PersonasState {
        store: Arc::new(store),
        resolver: Arc::new(PrincipalResolver::from_config(&config.auth)),
    };
    Ok(build_app(state, &config.server.cors_origins))
}

/// Build the complete Persona Hub HTTP application
pub fn build_app(personas_state: PersonasState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(personas_router(personas_state))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(cors_origins))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let parsed: Vec<_> = origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect();
        cors.allow_origin(parsed)
    }
}
