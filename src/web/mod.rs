pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{
    http::{header, request::Parts, HeaderValue, Method},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::config::WebConfig;
use state::AppState;

/// Builds the full router with middleware attached.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.web.cors_origins);

    Router::new()
        .merge(routes::root_routes())
        .merge(routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let patterns = origins.to_vec();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _request: &Parts| match origin.to_str() {
                Ok(origin) => patterns.iter().any(|p| origin_matches(p, origin)),
                Err(_) => false,
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Matches an origin against a configured entry. A `*` in the entry stands for
/// any run of characters between the fixed prefix and suffix.
pub fn origin_matches(pattern: &str, origin: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == origin,
        Some((prefix, suffix)) => {
            origin.len() >= prefix.len() + suffix.len()
                && origin.starts_with(prefix)
                && origin.ends_with(suffix)
        }
    }
}

pub async fn run_server(
    config: WebConfig,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return Err(e.into());
        }
    };
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_matching() {
        assert!(origin_matches("http://localhost:3000", "http://localhost:3000"));
        assert!(!origin_matches("http://localhost:3000", "http://localhost:3001"));

        assert!(origin_matches("https://*.vercel.app", "https://sqlsense.vercel.app"));
        assert!(origin_matches("https://*.vercel.app", "https://a-b.c.vercel.app"));
        assert!(!origin_matches("https://*.vercel.app", "http://sqlsense.vercel.app"));
        assert!(!origin_matches("https://*.vercel.app", "https://evil.com"));
        assert!(!origin_matches("https://*.vercel.app", "https:/.vercel.app"));
    }
}
