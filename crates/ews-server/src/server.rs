//! `EwsServer`: axum router for the WebSocket upgrade and health endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use ews_settings::ServerSettings;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::health::{self, HealthResponse};
use crate::hub::Hub;
use crate::session::{self, SessionConfig};
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast hub.
    pub hub: Hub,
    /// Session timers.
    pub session: SessionConfig,
    /// Maximum inbound WebSocket message size.
    pub max_message_size: usize,
    /// Shutdown coordinator (token and session tracker).
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
}

/// The HTTP / WebSocket server.
pub struct EwsServer {
    settings: ServerSettings,
    hub: Hub,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl EwsServer {
    /// Create a server around an already running hub.
    pub fn new(settings: ServerSettings, hub: Hub) -> Self {
        Self {
            settings,
            hub,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            session: SessionConfig::from(&self.settings),
            max_message_size: self.settings.max_message_size,
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/api/health", get(health_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Get the hub handle.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Bind and serve in a background task until the shutdown token fires.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "server listening");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            match served {
                Ok(()) => info!("server stopped accepting connections"),
                Err(e) => error!(error = %e, "server error"),
            }
        });

        Ok((local_addr, handle))
    }
}

/// GET /api/health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.hub.count()))
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }

    let AppState {
        hub,
        session: config,
        max_message_size,
        shutdown,
        ..
    } = state;

    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| {
            let (sink, stream) = socket.split();
            shutdown
                .tracker()
                .track_future(async move {
                    let _ = session::run_session(sink, stream, hub, config).await;
                })
        })
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use ews_settings::HubSettings;
    use tower::ServiceExt;

    use super::*;

    fn make_server() -> EwsServer {
        let (hub, _task) = Hub::spawn(&HubSettings::default());
        let settings = ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
            ..ServerSettings::default()
        };
        EwsServer::new(settings, hub)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    #[tokio::test]
    async fn health_endpoint_reports_client_count() {
        let server = make_server();
        let (_id, _queue) = server.hub().register().await.unwrap();

        let (status, body) = get_json(server.router(), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["wsClients"], 1);
        assert!(body["timestamp"].is_string());
        assert!(body["uptimeSecs"].is_number());
    }

    #[tokio::test]
    async fn ws_without_upgrade_headers_is_rejected() {
        let server = make_server();
        let (status, _) = get_json(server.router(), "/ws").await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let (status, _) = get_json(server.router(), "/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port_and_stops_on_shutdown() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        server.shutdown().shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
