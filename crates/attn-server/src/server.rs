//! HTTP server implementation using axum.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use attn_core::{ClientId, ClientMessage, ServerMessage};
use attn_session::Session;
use attn_telemetry::Metrics;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::types::SnapshotResponse;

/// Caps concurrent WebSocket connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Take a slot. The slot is released when the guard drops.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    session: Session,
    connection_limiter: Arc<ConnectionLimiter>,
    config: ServerConfig,
}

impl AppState {
    pub fn new(session: Session, config: ServerConfig) -> Self {
        Self {
            session,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            config,
        }
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/snapshot", get(get_snapshot))
        .route("/metrics", get(get_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn get_snapshot(State(state): State<AppState>) -> Json<SnapshotResponse> {
    Json(SnapshotResponse {
        timestamp: chrono::Utc::now(),
        connected_clients: state.session.clients().len(),
        active_profile_streams: state.session.profiles().active_count(),
        session: state.session.snapshot(),
    })
}

async fn get_metrics() -> Response {
    match Metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let guard = match state.connection_limiter.try_acquire() {
        Some(guard) => guard,
        None => {
            warn!(
                current = state.connection_limiter.current_count(),
                max = state.config.max_connections,
                "WebSocket connection limit reached"
            );
            return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, guard))
}

/// Run one observer connection until either side closes it.
async fn handle_ws_connection(socket: WebSocket, state: AppState, _guard: ConnectionGuard) {
    let session = state.session.clone();
    let (client, mut outbound) = session.connect();
    let (mut sender, mut receiver) = socket.split();

    info!(
        client = %client,
        connections = state.connection_limiter.current_count(),
        "New WebSocket connection"
    );

    // Writer: drain the client's queue into the socket.
    let mut writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let json = match message.to_json() {
                Ok(json) => json,
                Err(e) => {
                    warn!(client = %client, error = %e, "Failed to encode message");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                debug!(client = %client, "Failed to send message, client disconnected");
                break;
            }
        }
        let _ = sender.close().await;
    });

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_text(&session, client, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!(client = %client, "Client closed connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(client = %client, error = %e, "WebSocket receive error");
                    break;
                }
            },
            _ = &mut writer => {
                debug!(client = %client, "Writer finished, closing connection");
                break;
            }
            () = session.cancelled() => {
                debug!(client = %client, "Session shutting down, closing connection");
                break;
            }
        }
    }

    session.disconnect(client).await;
    writer.abort();

    info!(
        client = %client,
        connections = state.connection_limiter.current_count().saturating_sub(1),
        "WebSocket connection closed"
    );
}

/// Apply one text frame. Rejected requests are answered with an `error`
/// message and leave the session untouched.
async fn handle_text(session: &Session, client: ClientId, text: &str) {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(client = %client, error = %e, "Malformed client frame");
            reply(session, client, ServerMessage::error(format!("malformed message: {e}")));
            return;
        }
    };

    debug!(client = %client, message = ?message, "Client request");
    if let Err(e) = session.handle_message(client, message).await {
        warn!(client = %client, error = %e, "Request rejected");
        reply(session, client, ServerMessage::error(e.to_string()));
    }
}

fn reply(session: &Session, client: ClientId, message: ServerMessage) {
    if let Some(tx) = session.clients().sender(client) {
        if tx.try_send(message).is_err() {
            debug!(client = %client, "Could not queue error reply");
        }
    }
}

/// Bind the configured listener.
pub async fn bind(config: &ServerConfig) -> ServerResult<TcpListener> {
    let addr = config.socket_addr()?;
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    session: Session,
    config: ServerConfig,
    shutdown: F,
) -> ServerResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    let app = create_router(AppState::new(session, config));

    info!(addr = %local_addr, "Starting replay server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Replay server stopped");
    Ok(())
}

/// Bind and run the server until `shutdown` resolves.
pub async fn run_server<F>(session: Session, config: ServerConfig, shutdown: F) -> ServerResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind(&config).await?;
    serve(listener, session, config, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use attn_core::{AttentionLevel, SubjectId, WindowSequence};
    use attn_session::SessionConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn session() -> Session {
        let windows: WindowSequence = vec![AttentionLevel::High, AttentionLevel::Low].into();
        Session::new(
            SessionConfig::default(),
            [(SubjectId::new(1), windows.clone()), (SubjectId::new(2), windows)],
        )
    }

    #[test]
    fn test_connection_limiter() {
        let limiter = Arc::new(ConnectionLimiter::new(2));
        let a = limiter.try_acquire();
        let b = limiter.try_acquire();
        assert!(a.is_some() && b.is_some());
        assert!(limiter.try_acquire().is_none());

        drop(a);
        assert_eq!(limiter.current_count(), 1);
        assert!(limiter.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_snapshot_endpoint() {
        let app = create_router(AppState::new(session(), ServerConfig::default()));
        let response = app
            .oneshot(Request::builder().uri("/api/snapshot").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["connected_clients"], 0);
        assert_eq!(json["subjects"].as_array().unwrap().len(), 2);
        assert_eq!(json["subjects"][0]["attention_level"], "Mid");
        assert!(json["active_profile"].is_null());
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        Metrics::resync();
        let app = create_router(AppState::new(session(), ServerConfig::default()));
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("attn_resync_total"));
    }

    async fn next_error(rx: &mut tokio::sync::mpsc::Receiver<ServerMessage>) -> String {
        loop {
            match rx.recv().await.unwrap() {
                ServerMessage::Error { message } => return message,
                ServerMessage::DashboardUpdate { .. } => continue,
                other => panic!("unexpected message {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_rejected_request_gets_error_reply() {
        let session = session();
        let (client, mut rx) = session.connect();

        handle_text(&session, client, r#"{"type":"start_stream","child_id":99}"#).await;
        assert!(next_error(&mut rx).await.contains("99"));
        assert!(session.state().suppressed().is_empty());

        handle_text(&session, client, "not json").await;
        assert!(next_error(&mut rx).await.starts_with("malformed message"));
        session.shutdown().await;
    }
}
