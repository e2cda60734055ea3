// src/reload/server.rs

//! WebSocket endpoint for the live-preview channel.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::reload::broadcaster::{ReloadBroadcaster, ReloadSignal};

/// Handle for the running live-reload server.
#[derive(Debug)]
pub struct ReloadServerHandle {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ReloadServerHandle {
    /// Address the server actually bound (useful with port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

/// Bind `addr` and serve the live-reload endpoints:
///
/// - `GET /ws`: WebSocket; one JSON [`ReloadSignal`] per settled run.
/// - `GET /reload.js`: the client snippet pages include in development.
pub async fn spawn_reload_server(
    addr: &str,
    broadcaster: ReloadBroadcaster,
) -> Result<ReloadServerHandle> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/reload.js", get(client_script))
        .with_state(broadcaster);

    let task = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            error!(error = %err, "live-reload server exited");
        }
    });

    info!(addr = %local, "live-reload server listening");

    Ok(ReloadServerHandle { addr: local, task })
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(broadcaster): State<ReloadBroadcaster>,
) -> impl IntoResponse {
    let rx = broadcaster.subscribe();
    ws.on_upgrade(move |socket| client_session(socket, rx))
}

/// Forward reload signals to one connected client until either side hangs up.
async fn client_session(socket: WebSocket, mut rx: broadcast::Receiver<ReloadSignal>) {
    let (mut sender, mut receiver) = socket.split();

    debug!("preview client connected");

    loop {
        tokio::select! {
            signal = rx.recv() => match signal {
                Ok(signal) => {
                    let text = match serde_json::to_string(&signal) {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(error = %err, "failed to serialize reload signal");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // The client only needs the *latest* state; skipping
                    // stale signals is harmless.
                    warn!(skipped, "preview client lagged; dropping stale reload signals");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    // Clients don't speak to us; pings are handled by axum.
                }
                Some(Err(_)) => break,
            }
        }
    }

    debug!("preview client disconnected");
}

async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        CLIENT_SNIPPET,
    )
}

/// Minimal browser-side client: full reload by default, in-place stylesheet
/// swap for style-scoped signals.
const CLIENT_SNIPPET: &str = r#"(function () {
  var proto = location.protocol === 'https:' ? 'wss' : 'ws';
  var sock = new WebSocket(proto + '://' + location.host + '/ws');
  sock.onmessage = function (ev) {
    var signal = JSON.parse(ev.data);
    if (signal.scope === 'styles') {
      document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {
        link.href = link.href.split('?')[0] + '?t=' + Date.now();
      });
    } else {
      location.reload();
    }
  };
})();
"#;
