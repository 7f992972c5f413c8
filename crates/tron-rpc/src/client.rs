//! Client-side RPC transport: a persistent WebSocket connection with
//! request/response correlation, event subscriptions, and auto-reconnect.
//!
//! This is the counterpart to the server's `websocket` module in
//! `tron-server` — it speaks the same [`crate::types::RpcRequest`] /
//! [`crate::types::RpcResponse`] / [`crate::types::RpcEvent`] envelope over
//! one long-lived connection. Intended for internal tooling and tests that
//! need to drive the RPC surface the way the (out-of-scope) UI clients do;
//! the UI itself is not implemented here.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use crate::types::{RpcErrorBody, RpcEvent, RpcRequest, RpcResponse};

/// Close code used for intentional client-initiated disconnects.
///
/// Matches the server's convention: 1000 ("normal closure") suppresses
/// reconnect; any other close code triggers the backoff loop.
pub const INTENTIONAL_CLOSE_CODE: u16 = 1000;

/// Error surfaced to callers of [`Client::call`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request timed out waiting for a response.
    #[error("RPC_TIMEOUT: request {0} timed out")]
    Timeout(String),
    /// The connection closed (or was never established) while the request
    /// was pending.
    #[error("CONNECTION_CLOSED: {0}")]
    ConnectionClosed(String),
    /// The server returned a structured RPC error.
    #[error("{}: {}", .0.code, .0.message)]
    Rpc(RpcErrorBody),
    /// Transport-level failure (dial, send, or frame decode).
    #[error("transport error: {0}")]
    Transport(String),
}

/// Reconnect policy: exponential backoff bounded by a max attempt count.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    /// Initial delay before the first reconnect attempt.
    pub initial_backoff: Duration,
    /// Upper bound on the backoff delay.
    pub max_backoff: Duration,
    /// Multiplier applied to the backoff after each failed attempt.
    pub multiplier: f64,
    /// Maximum number of reconnect attempts before giving up. `None` retries
    /// forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: Some(10),
        }
    }
}

impl ReconnectPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max_backoff.as_secs_f64()))
    }
}

/// Default per-request timeout used by [`Client::call`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type PendingTable = Arc<DashMap<String, oneshot::Sender<RpcResponse>>>;
type EventSubs = Arc<DashMap<String, Vec<mpsc::UnboundedSender<RpcEvent>>>>;

/// Marker key under which subscribers to every event type are stored.
const WILDCARD: &str = "*";

/// Persistent bidirectional RPC client.
///
/// Owns a pending-request table keyed by request id, an event subscription
/// table keyed by event type (plus a wildcard), and drives a reconnect loop
/// with exponential backoff. A single `Client` instance may be reused across
/// reconnects — subscriptions survive, in-flight requests at the moment of
/// disconnect are rejected uniformly.
pub struct Client {
    url: String,
    outbound: mpsc::UnboundedSender<WsMessage>,
    pending: PendingTable,
    subscribers: EventSubs,
    intentional_close: Arc<std::sync::atomic::AtomicBool>,
}

impl Client {
    /// Connect to `url` and start the read/write/reconnect loop in the
    /// background. Returns once the initial connection succeeds.
    pub async fn connect(url: impl Into<String>, policy: ReconnectPolicy) -> Result<Self, ClientError> {
        let url = url.into();
        let pending: PendingTable = Arc::new(DashMap::new());
        let subscribers: EventSubs = Arc::new(DashMap::new());
        let intentional_close = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        tokio::spawn(run_connection(
            url.clone(),
            ws,
            outbound_rx,
            outbound_tx.clone(),
            pending.clone(),
            subscribers.clone(),
            intentional_close.clone(),
            policy,
        ));

        Ok(Self {
            url,
            outbound: outbound_tx,
            pending,
            subscribers,
            intentional_close,
        })
    }

    /// Send a request and await its response, or a uniform error if the
    /// connection drops or the call times out.
    pub async fn call(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value, ClientError> {
        self.call_with_timeout(method, params, DEFAULT_REQUEST_TIMEOUT).await
    }

    /// Like [`Client::call`] with an explicit per-request timeout.
    pub async fn call_with_timeout(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        request_timeout: Duration,
    ) -> Result<Value, ClientError> {
        let id = format!("req_{}", uuid::Uuid::now_v7());
        let request = RpcRequest {
            id: id.clone(),
            method: method.into(),
            params,
            idempotency_key: None,
        };

        let (tx, rx) = oneshot::channel();
        let _ = self.pending.insert(id.clone(), tx);

        let frame = serde_json::to_string(&request).map_err(|e| ClientError::Transport(e.to_string()))?;
        if self.outbound.send(WsMessage::Text(frame.into())).is_err() {
            self.pending.remove(&id);
            return Err(ClientError::ConnectionClosed(self.url.clone()));
        }

        match timeout(request_timeout, rx).await {
            Ok(Ok(response)) => {
                if response.success {
                    Ok(response.result.unwrap_or(Value::Null))
                } else {
                    Err(ClientError::Rpc(response.error.unwrap_or(RpcErrorBody {
                        code: "INTERNAL_ERROR".into(),
                        message: "missing error body".into(),
                        details: None,
                    })))
                }
            }
            Ok(Err(_)) => Err(ClientError::ConnectionClosed(self.url.clone())),
            Err(_) => {
                self.pending.remove(&id);
                Err(ClientError::Timeout(id))
            }
        }
    }

    /// Subscribe to server-pushed events of `event_type`, or `"*"` for all
    /// event types. Returns a channel of matching [`RpcEvent`]s.
    pub fn subscribe(&self, event_type: impl Into<String>) -> mpsc::UnboundedReceiver<RpcEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(event_type.into()).or_default().push(tx);
        rx
    }

    /// Close the connection intentionally (close code 1000, "normal
    /// closure"). Suppresses the reconnect loop and rejects any
    /// still-pending requests.
    pub fn close(&self) {
        self.intentional_close
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let _ = self.outbound.send(WsMessage::Close(None));
    }
}

/// Reject every currently-pending request with a uniform connection-closed
/// error, draining the table so stale senders don't linger.
fn reject_all_pending(pending: &PendingTable, reason: &str) {
    let ids: Vec<String> = pending.iter().map(|e| e.key().clone()).collect();
    for id in ids {
        if let Some((_, tx)) = pending.remove(&id) {
            let _ = tx.send(RpcResponse {
                id,
                success: false,
                result: None,
                error: Some(RpcErrorBody {
                    code: "CONNECTION_CLOSED".into(),
                    message: reason.to_string(),
                    details: None,
                }),
            });
        }
    }
}

fn dispatch_event(subscribers: &EventSubs, event: RpcEvent) {
    if let Some(mut subs) = subscribers.get_mut(&event.event_type) {
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }
    if let Some(mut subs) = subscribers.get_mut(WILDCARD) {
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_connection(
    url: String,
    mut ws: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    mut outbound_rx: mpsc::UnboundedReceiver<WsMessage>,
    outbound_tx: mpsc::UnboundedSender<WsMessage>,
    pending: PendingTable,
    subscribers: EventSubs,
    intentional_close: Arc<std::sync::atomic::AtomicBool>,
    policy: ReconnectPolicy,
) {
    let mut attempt: u32 = 0;

    loop {
        loop {
            tokio::select! {
                outgoing = outbound_rx.recv() => {
                    match outgoing {
                        Some(msg) => {
                            let is_close = matches!(msg, WsMessage::Close(_));
                            if ws.send(msg).await.is_err() {
                                break;
                            }
                            if is_close {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                incoming = ws.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => {
                            handle_frame(&text, &pending, &subscribers);
                        }
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "client websocket error");
                            break;
                        }
                    }
                }
            }
        }

        reject_all_pending(&pending, "connection closed");

        if intentional_close.load(std::sync::atomic::Ordering::SeqCst) {
            debug!("client closed intentionally, not reconnecting");
            return;
        }

        if let Some(max) = policy.max_attempts {
            if attempt >= max {
                warn!(attempts = attempt, "giving up reconnecting");
                return;
            }
        }

        let delay = policy.delay_for(attempt);
        attempt += 1;
        warn!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
        tokio::time::sleep(delay).await;

        match tokio_tungstenite::connect_async(&url).await {
            Ok((new_ws, _)) => {
                ws = new_ws;
                attempt = 0;
                // outbound_tx kept alive so `Client::call`/`close` callers
                // can keep enqueueing across the reconnect.
                let _ = &outbound_tx;
            }
            Err(e) => {
                warn!(error = %e, "reconnect attempt failed");
            }
        }
    }
}

fn handle_frame(text: &str, pending: &PendingTable, subscribers: &EventSubs) {
    // A frame is either a response (has `id` + `success`) or a pushed event
    // (has `type`, no `id`). Try response first since it's the common case
    // for request/response-shaped clients.
    if let Ok(response) = serde_json::from_str::<RpcResponse>(text) {
        if let Some((_, tx)) = pending.remove(&response.id) {
            let _ = tx.send(response);
            return;
        }
    }
    if let Ok(event) = serde_json::from_str::<RpcEvent>(text) {
        dispatch_event(subscribers, event);
        return;
    }
    debug!(frame = %text, "unrecognized RPC frame");
}
