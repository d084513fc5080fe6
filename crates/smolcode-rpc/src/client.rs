//! The multiplexing JSON-RPC client.
//!
//! One background listener task owns the receive side of the transport and
//! routes responses to pending calls by id. Sends are serialized under a
//! single writer lock; id allocation happens inside that lock so ids hit
//! the wire in order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, RpcError};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::transport::Transport;

/// Buffered server-initiated notifications before the subscriber lags.
const SUBSCRIPTION_BUFFER: usize = 64;

/// A call waiting for its response. Exactly one of a response or a
/// cancellation reaches the caller.
struct PendingCall {
    tx: oneshot::Sender<Result<Value>>,
    method: String,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    pending: DashMap<u64, PendingCall>,
    /// Writer lock; the wrapped value is the next request id.
    send_lock: Mutex<u64>,
    subscriber: std::sync::Mutex<Option<mpsc::Sender<JsonRpcNotification>>>,
    closed: CancellationToken,
    listening: AtomicBool,
}

#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                pending: DashMap::new(),
                send_lock: Mutex::new(1),
                subscriber: std::sync::Mutex::new(None),
                closed: CancellationToken::new(),
                listening: AtomicBool::new(false),
            }),
        }
    }

    /// Start the background receive loop. At most one listener runs per
    /// client; later calls are no-ops.
    pub fn listen(&self) {
        if self.inner.listening.swap(true, Ordering::SeqCst) {
            debug!("listener already running");
            return;
        }
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                let line = tokio::select! {
                    _ = inner.closed.cancelled() => break,
                    line = inner.transport.receive() => line,
                };
                match line {
                    Ok(line) => route_message(&inner, &line),
                    Err(RpcError::Closed) => break,
                    Err(RpcError::Eof) => {
                        debug!("transport reached end of stream");
                        close_inner(&inner).await;
                        break;
                    }
                    Err(RpcError::EmptyFrame) => {
                        warn!("dropping empty frame from server");
                    }
                    Err(e) => {
                        warn!(error = %e, "receive failed, closing client");
                        close_inner(&inner).await;
                        break;
                    }
                }
            }
        });
    }

    /// Issue a request and block until its response arrives, the token is
    /// cancelled, or the client closes.
    pub async fn call_with_cancel(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        if self.inner.closed.is_cancelled() {
            return Err(RpcError::Closed);
        }

        let (tx, rx) = oneshot::channel();
        let id = {
            let mut next_id = self.inner.send_lock.lock().await;
            let id = *next_id;
            *next_id += 1;

            self.inner.pending.insert(
                id,
                PendingCall {
                    tx,
                    method: method.to_string(),
                },
            );

            let request = JsonRpcRequest::new(id, method, params);
            let line = serde_json::to_string(&request)?;
            debug!(id, method, "sending request");
            if let Err(e) = self.inner.transport.send(&line).await {
                self.inner.pending.remove(&id);
                return Err(e);
            }
            id
        };

        tokio::select! {
            result = rx => match result {
                Ok(result) => result,
                // The sender was dropped without a verdict; treat as closed.
                Err(_) => Err(RpcError::Closed),
            },
            _ = cancel.cancelled() => {
                // A response landing after this point finds no pending
                // record and is dropped by the listener.
                self.inner.pending.remove(&id);
                debug!(id, method, "call cancelled");
                Err(RpcError::Cancelled)
            }
            _ = self.inner.closed.cancelled() => {
                self.inner.pending.remove(&id);
                Err(RpcError::Closed)
            }
        }
    }

    /// Issue a request with no external cancellation.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let cancel = CancellationToken::new();
        self.call_with_cancel(method, params, &cancel).await
    }

    /// Fire-and-forget notification; awaits no response and creates no
    /// pending record.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if self.inner.closed.is_cancelled() {
            return Err(RpcError::Closed);
        }
        let notification = JsonRpcNotification::new(method, params);
        let line = serde_json::to_string(&notification)?;
        let _guard = self.inner.send_lock.lock().await;
        debug!(method, "sending notification");
        self.inner.transport.send(&line).await
    }

    /// Lazy stream of server-initiated notifications. Installing a new
    /// subscriber replaces the previous one.
    pub fn subscribe(&self) -> mpsc::Receiver<JsonRpcNotification> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        *self.inner.subscriber.lock().unwrap() = Some(tx);
        rx
    }

    /// Stop the listener, fail all in-flight calls with `Closed`, and close
    /// the transport. Idempotent.
    pub async fn close(&self) {
        close_inner(&self.inner).await;
    }

    /// Number of calls currently awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }
}

async fn close_inner(inner: &ClientInner) {
    if inner.closed.is_cancelled() {
        return;
    }
    inner.closed.cancel();

    let ids: Vec<u64> = inner.pending.iter().map(|e| *e.key()).collect();
    for id in ids {
        if let Some((_, call)) = inner.pending.remove(&id) {
            debug!(id, method = %call.method, "failing pending call: client closed");
            let _ = call.tx.send(Err(RpcError::Closed));
        }
    }

    if let Err(e) = inner.transport.close().await {
        warn!(error = %e, "transport close reported an error");
    }
}

/// Dispatch one incoming frame: a response routes to its pending call, a
/// notification goes to the subscriber, anything else is logged and
/// dropped. An unmatched response id never crashes the listener.
fn route_message(inner: &ClientInner, line: &str) {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "dropping unparseable frame");
            return;
        }
    };

    if value.get("id").is_some() {
        let response: JsonRpcResponse = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "dropping malformed response");
                return;
            }
        };
        let id = response.id;
        match inner.pending.remove(&id) {
            Some((_, call)) => {
                let result = response.into_result().map_err(RpcError::Remote);
                let _ = call.tx.send(result);
            }
            None => {
                debug!(id, "dropping response with no matching call");
            }
        }
        return;
    }

    if value.get("method").is_some() {
        let notification: JsonRpcNotification = match serde_json::from_value(value) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "dropping malformed notification");
                return;
            }
        };
        let subscriber = inner.subscriber.lock().unwrap().clone();
        match subscriber {
            Some(tx) => {
                if tx.try_send(notification).is_err() {
                    warn!("subscriber full or gone, dropping notification");
                }
            }
            None => debug!(method = %notification.method, "no subscriber, dropping notification"),
        }
        return;
    }

    warn!("dropping frame that is neither response nor notification");
}
