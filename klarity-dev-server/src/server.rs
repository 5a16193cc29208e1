use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::{
        Request, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{
        StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::services::ServeDir;

use crate::hub::{ClientHub, ClientId, WRITE_DEADLINE};

pub const LIVERELOAD_PATH: &str = "/klarity-livereload";

const LIVERELOAD_SCRIPT: &str = r#"<script>
(function() {
    const protocol = location.protocol === 'https:' ? 'wss:' : 'ws:';
    const socket = new WebSocket(protocol + '//' + location.host + '/klarity-livereload');
    socket.onmessage = function(event) {
        if (event.data === 'reload') {
            location.reload();
        }
    };
    socket.onclose = function() {
        console.log('Klarity live reload disconnected');
    };
})();
</script>
"#;

#[derive(Clone)]
struct AppState {
    hub: Arc<ClientHub>,
}

/// Router serving `site_dir` with the live reload endpoint and script.
pub fn router(site_dir: PathBuf, hub: Arc<ClientHub>) -> Router {
    Router::new()
        .route(LIVERELOAD_PATH, get(websocket_handler))
        .fallback_service(ServeDir::new(site_dir))
        .layer(middleware::from_fn(inject_reload_client))
        .with_state(AppState { hub })
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket_connection(socket, state.hub))
}

/// Forward queued messages to the socket until either side goes away. The
/// read side is only drained to notice disconnects.
async fn websocket_connection(mut socket: WebSocket, hub: Arc<ClientHub>) {
    let (id, mut outbox) = hub.register();

    loop {
        tokio::select! {
            msg = outbox.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                if !write_within(id, WRITE_DEADLINE, socket.send(Message::Text(msg.into()))).await {
                    break;
                }
            }
            msg = socket.recv() => {
                if !matches!(msg, Some(Ok(_))) {
                    break;
                }
            }
        }
    }

    hub.remove(id);
}

/// Await one socket write for at most `deadline`. Returns false when the
/// write failed or timed out and the client should be dropped.
async fn write_within<F, E>(id: ClientId, deadline: Duration, write: F) -> bool
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(deadline, write).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(client = id, "Live reload write failed: {e}");
            false
        }
        Err(_) => {
            tracing::warn!(client = id, "Live reload write timed out");
            false
        }
    }
}

async fn inject_reload_client(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"));
    if response.status() != StatusCode::OK || !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Could not read page body: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_livereload_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// Insert the reload client before the last `</body>`, or append it.
pub fn inject_livereload_script(html: &str) -> String {
    let mut result = String::with_capacity(html.len() + LIVERELOAD_SCRIPT.len());
    match html.rfind("</body>") {
        Some(pos) => {
            result.push_str(&html[..pos]);
            result.push_str(LIVERELOAD_SCRIPT);
            result.push_str(&html[pos..]);
        }
        None => {
            result.push_str(html);
            result.push_str(LIVERELOAD_SCRIPT);
        }
    }
    result
}
