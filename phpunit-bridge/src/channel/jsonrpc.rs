// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    Channel, ChannelSubscription, NotificationHandler,
    framing::{read_message, write_message},
};
use crate::{emitter::Emitter, errors::ChannelError};
use serde_json::{Map, Value, json};
use std::{
    collections::HashMap,
    process::Stdio,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicI64, Ordering},
    },
};
use tokio::{
    io::{AsyncRead, AsyncWrite, BufReader},
    process::{Child, Command},
    sync::{mpsc, oneshot, watch},
    task::AbortHandle,
};
use tracing::{debug, trace, warn};

const JSONRPC_VERSION: &str = "2.0";

/// A [`Channel`] speaking JSON-RPC 2.0 over a byte stream, framed with `Content-Length`
/// headers.
///
/// Creating the channel spawns a reader task and a writer task on the current tokio runtime,
/// and starts the `initialize` handshake. The channel becomes ready once the server has
/// answered `initialize` and the `initialized` notification has been sent.
#[derive(Debug)]
pub struct JsonRpcChannel {
    inner: Arc<Inner>,
    tasks: Vec<AbortHandle>,
    child: Option<Child>,
}

impl JsonRpcChannel {
    /// Connects over the given stream halves, using default `initialize` params.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::with_initialize_params(reader, writer, default_initialize_params())
    }

    /// Connects over the given stream halves, sending `initialize_params` in the handshake.
    pub fn with_initialize_params<R, W>(reader: R, writer: W, initialize_params: Value) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ChannelState::Starting);
        let inner = Arc::new(Inner {
            next_id: AtomicI64::new(1),
            pending: Mutex::new(Pending::default()),
            handlers: Mutex::new(HashMap::new()),
            outgoing: outgoing_tx,
            state: state_tx,
        });

        let writer_task = tokio::spawn(write_loop(inner.clone(), writer, outgoing_rx));
        let reader_task = tokio::spawn(read_loop(inner.clone(), BufReader::new(reader)));
        let handshake_task = tokio::spawn(handshake(inner.clone(), initialize_params));

        Self {
            inner,
            tasks: vec![
                writer_task.abort_handle(),
                reader_task.abort_handle(),
                handshake_task.abort_handle(),
            ],
            child: None,
        }
    }

    /// Starts the language server as a child process and connects to its stdio.
    ///
    /// The child is killed when the channel is dropped.
    pub fn spawn<I, S>(command: &str, args: I) -> Result<Self, ChannelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ChannelError::Spawn {
                command: command.to_owned(),
                err,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ChannelError::protocol("child process stdio was not piped"));
        };
        debug!(command, pid = ?child.id(), "spawned language server");

        let mut channel = Self::new(stdout, stdin);
        channel.child = Some(child);
        Ok(channel)
    }

    /// Sends a notification. Fails only if the channel is closed.
    pub fn send_notification(&self, method: &str, params: Value) -> Result<(), ChannelError> {
        self.inner.notify(method, params)
    }

    /// Returns true once the connection has closed.
    pub fn is_closed(&self) -> bool {
        *self.inner.state.borrow() == ChannelState::Closed
    }
}

impl Drop for JsonRpcChannel {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        self.inner.close();
    }
}

impl Channel for JsonRpcChannel {
    async fn ready(&self) -> Result<(), ChannelError> {
        let mut rx = self.inner.state.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                ChannelState::Ready => return Ok(()),
                ChannelState::Closed => return Err(ChannelError::Closed),
                ChannelState::Starting => {}
            }
            rx.changed().await.map_err(|_| ChannelError::Closed)?;
        }
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ChannelError> {
        self.inner.request(method, params).await
    }

    fn on_notification(&self, method: &str, handler: NotificationHandler) -> ChannelSubscription {
        let emitter = self
            .inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method.to_owned())
            .or_insert_with(|| Arc::new(Emitter::new()))
            .clone();
        emitter.subscribe(move |params: &Value| handler(params.clone()))
    }
}

/// Default params for the `initialize` request.
pub fn default_initialize_params() -> Value {
    json!({
        "processId": std::process::id(),
        "rootUri": null,
        "capabilities": {},
    })
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ChannelState {
    Starting,
    Ready,
    Closed,
}

type ResponseSender = oneshot::Sender<Result<Value, ChannelError>>;

#[derive(Debug, Default)]
struct Pending {
    closed: bool,
    requests: HashMap<i64, ResponseSender>,
}

#[derive(Debug)]
struct Inner {
    next_id: AtomicI64,
    pending: Mutex<Pending>,
    handlers: Mutex<HashMap<String, Arc<Emitter<Value>>>>,
    outgoing: mpsc::UnboundedSender<Value>,
    state: watch::Sender<ChannelState>,
}

impl Inner {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ChannelError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.closed {
                return Err(ChannelError::Closed);
            }
            pending.requests.insert(id, tx);
        }

        debug!(id, method, "sending request");
        let message = json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id,
            "method": method,
            "params": params,
        });
        if self.outgoing.send(message).is_err() {
            self.take_pending(id);
            return Err(ChannelError::Closed);
        }

        rx.await.unwrap_or(Err(ChannelError::Closed))
    }

    fn notify(&self, method: &str, params: Value) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        debug!(method, "sending notification");
        self.outgoing
            .send(json!({
                "jsonrpc": JSONRPC_VERSION,
                "method": method,
                "params": params,
            }))
            .map_err(|_| ChannelError::Closed)
    }

    fn is_closed(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    fn take_pending(&self, id: i64) -> Option<ResponseSender> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .remove(&id)
    }

    /// Marks the channel closed and fails every pending request. Idempotent.
    fn close(&self) {
        let drained = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.closed {
                return;
            }
            pending.closed = true;
            std::mem::take(&mut pending.requests)
        };
        self.state.send_replace(ChannelState::Closed);
        debug!(pending = drained.len(), "channel closed");
        for (_, tx) in drained {
            _ = tx.send(Err(ChannelError::Closed));
        }
    }

    fn dispatch(&self, method: &str, params: Value) {
        let emitter = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .cloned();
        match emitter {
            Some(emitter) if emitter.listener_count() > 0 => emitter.emit(&params),
            _ => trace!(method, "no handler registered"),
        }
    }

    fn handle_incoming(&self, message: Value) {
        let Value::Object(mut message) = message else {
            warn!("ignoring non-object JSON-RPC message");
            return;
        };

        let method = match message.remove("method") {
            Some(Value::String(method)) => Some(method),
            Some(_) => {
                warn!("ignoring JSON-RPC message with a non-string method");
                return;
            }
            None => None,
        };
        let id = message.remove("id");

        match (method, id) {
            (Some(method), id) => {
                let params = message.remove("params").unwrap_or(Value::Null);
                debug!(%method, is_request = id.is_some(), "received message");
                self.dispatch(&method, params);
                if let Some(id) = id {
                    // Server-to-client requests are acknowledged after the handlers ran.
                    _ = self.outgoing.send(json!({
                        "jsonrpc": JSONRPC_VERSION,
                        "id": id,
                        "result": null,
                    }));
                }
            }
            (None, Some(id)) => self.handle_response(id, message),
            (None, None) => warn!("ignoring JSON-RPC message without method or id"),
        }
    }

    fn handle_response(&self, id: Value, mut message: Map<String, Value>) {
        let Some(id) = id.as_i64() else {
            warn!(%id, "ignoring response with a non-integer id");
            return;
        };
        let Some(tx) = self.take_pending(id) else {
            warn!(id, "ignoring response to an unknown request");
            return;
        };

        let result = match message.remove("error") {
            Some(error) => Err(remote_error(&error)),
            None => Ok(message.remove("result").unwrap_or(Value::Null)),
        };
        debug!(id, ok = result.is_ok(), "received response");
        _ = tx.send(result);
    }
}

fn remote_error(error: &Value) -> ChannelError {
    ChannelError::Remote {
        code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
        message: error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
    }
}

/// Closes the channel when dropped, including when the reader task panics or is aborted.
struct CloseOnDrop(Arc<Inner>);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

async fn read_loop<R>(inner: Arc<Inner>, mut reader: BufReader<R>)
where
    R: AsyncRead + Unpin,
{
    // Handlers run on this task.
    let inner = CloseOnDrop(inner);
    loop {
        match read_message(&mut reader).await {
            Ok(Some(message)) => inner.0.handle_incoming(message),
            Ok(None) => {
                debug!("language server closed the stream");
                break;
            }
            Err(ChannelError::Serialize(error)) => {
                // The body was consumed, so the next frame can still be read.
                warn!(%error, "skipping message that isn't valid JSON");
            }
            Err(error) => {
                warn!(%error, "failed to read from the language server");
                break;
            }
        }
    }
}

async fn write_loop<W>(inner: Arc<Inner>, mut writer: W, mut rx: mpsc::UnboundedReceiver<Value>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        if let Err(error) = write_message(&mut writer, &message).await {
            warn!(%error, "failed to write to the language server");
            inner.close();
            break;
        }
    }
}

async fn handshake(inner: Arc<Inner>, initialize_params: Value) {
    match inner.request("initialize", initialize_params).await {
        Ok(_) => {
            if inner.notify("initialized", json!({})).is_ok() {
                inner.state.send_if_modified(|state| {
                    if *state == ChannelState::Starting {
                        *state = ChannelState::Ready;
                        true
                    } else {
                        false
                    }
                });
                debug!("channel ready");
            }
        }
        Err(error) => warn!(%error, "initialize handshake failed"),
    }
}
