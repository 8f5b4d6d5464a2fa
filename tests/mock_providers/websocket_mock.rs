//! WebSocket mock of the live endpoint
//!
//! Speaks just enough of the protocol to drive a real client: answers `setup`
//! with `setupComplete`, answers each `clientContent` turn with one model
//! turn (text plus a short audio part) followed by `turnComplete`, and records
//! everything it receives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::accept_async;

/// Text the mock model answers every turn with.
pub const MOCK_REPLY_TEXT: &str = "Hello from the mock model";

/// PCM the mock model answers every turn with.
pub const MOCK_REPLY_AUDIO: &[u8] = &[1, 0, 2, 0, 3, 0, 4, 0];

/// Mock server state
#[derive(Default)]
pub struct LiveMockState {
    /// Frames received from clients, parsed as JSON
    pub received: Mutex<Vec<Value>>,
    pub connection_count: AtomicU64,
    /// Close every connection with this code and reason right after
    /// `setupComplete`
    pub close_after_setup: Option<(u16, String)>,
}

impl LiveMockState {
    pub fn received_of_kind(&self, kind: &str) -> Vec<Value> {
        self.received
            .lock()
            .iter()
            .filter(|frame| frame.get(kind).is_some())
            .cloned()
            .collect()
    }
}

/// Running mock server.
pub struct LiveMockServer {
    pub addr: SocketAddr,
    pub state: Arc<LiveMockState>,
    handle: JoinHandle<()>,
}

impl LiveMockServer {
    pub async fn start(state: LiveMockState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock server");
        let addr = listener.local_addr().expect("mock server has no address");
        let state = Arc::new(state);

        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = server_state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        eprintln!("Mock connection error: {}", e);
                    }
                });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Client URL, key included.
    pub fn url(&self) -> String {
        format!("ws://{}/ws/live?key=test-key", self.addr)
    }

    pub fn connection_count(&self) -> u64 {
        self.state.connection_count.load(Ordering::SeqCst)
    }
}

impl Drop for LiveMockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<LiveMockState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();
    state.connection_count.fetch_add(1, Ordering::SeqCst);

    while let Some(msg) = read.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(data)) => {
                write.send(Message::Pong(data)).await?;
                continue;
            }
            Ok(_) => continue,
            Err(e) => {
                eprintln!("WebSocket error: {}", e);
                break;
            }
        };

        let frame: Value = serde_json::from_str(&text)?;
        state.received.lock().push(frame.clone());

        if frame.get("setup").is_some() {
            // Binary on purpose: the real service mixes both frame types
            let reply = json!({ "setupComplete": {} }).to_string();
            write.send(Message::Binary(Bytes::from(reply))).await?;

            if let Some((code, reason)) = &state.close_after_setup {
                let close = CloseFrame {
                    code: CloseCode::from(*code),
                    reason: reason.clone().into(),
                };
                write.send(Message::Close(Some(close))).await?;
                break;
            }
        } else if frame.get("clientContent").is_some() {
            let turn = json!({
                "serverContent": {
                    "modelTurn": {
                        "parts": [
                            { "text": MOCK_REPLY_TEXT },
                            {
                                "inlineData": {
                                    "mimeType": "audio/pcm;rate=24000",
                                    "data": BASE64_STANDARD.encode(MOCK_REPLY_AUDIO),
                                }
                            }
                        ]
                    }
                }
            });
            write.send(Message::Text(turn.to_string().into())).await?;
            let done = json!({ "serverContent": { "turnComplete": true } });
            write.send(Message::Text(done.to_string().into())).await?;
        }
    }

    Ok(())
}
