use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{Html, IntoResponse},
    routing::get,
};
use bus::Stamp;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::cors::CorsLayer;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub labels: Vec<String>,
    pub stamp: Stamp,
}

#[derive(Debug, Clone)]
pub(crate) struct FramePacket {
    pub metadata: FrameMetadata,
    pub jpeg: Arc<[u8]>,
}

impl FramePacket {
    /// `u32 LE metadata length ‖ JSON metadata ‖ JPEG`
    pub fn to_binary(&self) -> serde_json::Result<Vec<u8>> {
        let json = serde_json::to_vec(&self.metadata)?;

        let mut binary_msg = Vec::with_capacity(4 + json.len() + self.jpeg.len());
        binary_msg.extend_from_slice(&(json.len() as u32).to_le_bytes());
        binary_msg.extend_from_slice(&json);
        binary_msg.extend_from_slice(&self.jpeg);

        Ok(binary_msg)
    }
}

#[derive(Clone)]
pub(crate) struct PreviewState {
    pub tx: broadcast::Sender<FramePacket>,
    pub title: Arc<str>,
}

pub(crate) fn router(state: PreviewState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index(State(state): State<PreviewState>) -> Html<String> {
    Html(PAGE.replace("{{title}}", &escape_html(&state.title)))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<PreviewState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: PreviewState) {
    tracing::info!("Preview viewer connected");

    let mut rx = state.tx.subscribe();

    loop {
        let packet = match rx.recv().await {
            Ok(packet) => packet,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Preview viewer lagging, frames skipped");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let binary_msg = match packet.to_binary() {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!(error = %e, "Preview metadata serialization failed");
                continue;
            }
        };

        if socket.send(Message::Binary(binary_msg)).await.is_err() {
            tracing::info!("Preview viewer disconnected");
            break;
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{title}}</title>
<style>
  body { margin: 0; background: #111; color: #ddd; font-family: monospace; }
  header { padding: 8px 12px; }
  img { display: block; max-width: 100vw; max-height: calc(100vh - 40px); margin: 0 auto; }
</style>
</head>
<body>
<header><span>{{title}}</span> <span id="status">connecting</span> <span id="labels"></span></header>
<img id="feed" alt="">
<script>
  const feed = document.getElementById("feed");
  const status = document.getElementById("status");
  const labels = document.getElementById("labels");
  let current = null;

  function connect() {
    const ws = new WebSocket(`ws://${location.host}/ws`);
    ws.binaryType = "arraybuffer";
    ws.onopen = () => { status.textContent = "live"; };
    ws.onclose = () => { status.textContent = "disconnected"; setTimeout(connect, 1000); };
    ws.onmessage = (event) => {
      const buf = event.data;
      const len = new DataView(buf).getUint32(0, true);
      const meta = JSON.parse(new TextDecoder().decode(new Uint8Array(buf, 4, len)));
      const blob = new Blob([new Uint8Array(buf, 4 + len)], { type: "image/jpeg" });
      const url = URL.createObjectURL(blob);
      feed.onload = () => { if (current) URL.revokeObjectURL(current); current = url; };
      feed.src = url;
      labels.textContent = `#${meta.sequence} ${meta.labels.join(" ")}`;
    };
  }

  connect();
</script>
</body>
</html>
"#;
