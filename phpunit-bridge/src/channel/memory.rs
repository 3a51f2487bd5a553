// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Channel, ChannelSubscription, NotificationHandler};
use crate::{emitter::Emitter, errors::ChannelError};
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

/// An in-process [`Channel`] with no server behind it.
///
/// It is ready immediately, answers every request with `null` and records it, and delivers
/// notifications passed to [`push`](Self::push) synchronously. Useful for replaying recorded
/// sessions.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    closed: AtomicBool,
    requests: Mutex<Vec<(String, Value)>>,
    handlers: Mutex<HashMap<String, Arc<Emitter<Value>>>>,
}

impl MemoryChannel {
    /// Creates an open channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a notification to the handlers registered for `method`.
    ///
    /// Returns false if nothing is listening on `method`.
    pub fn push(&self, method: &str, params: Value) -> bool {
        let emitter = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .cloned();
        match emitter {
            Some(emitter) if emitter.listener_count() > 0 => {
                emitter.emit(&params);
                true
            }
            _ => false,
        }
    }

    /// Closes the channel. Later requests fail with [`ChannelError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// The requests sent so far, as `(method, params)` pairs.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Channel for MemoryChannel {
    async fn ready(&self) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        Ok(())
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((method.to_owned(), params));
        Ok(Value::Null)
    }

    fn on_notification(&self, method: &str, handler: NotificationHandler) -> ChannelSubscription {
        let emitter = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method.to_owned())
            .or_insert_with(|| Arc::new(Emitter::new()))
            .clone();
        emitter.subscribe(move |params: &Value| handler(params.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn records_requests_and_delivers_pushes() {
        let channel = MemoryChannel::new();
        channel.ready().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let sub = channel.on_notification(
            "TestRunFinishedEvent",
            Arc::new(move |params: Value| seen2.lock().unwrap().push(params)),
        );

        assert_eq!(
            channel.send_request("TestRunStartedEvent", json!({ "tests": [] })).await.unwrap(),
            Value::Null
        );
        assert!(channel.push("TestRunFinishedEvent", json!({ "events": [] })));
        assert!(!channel.push("TestLoadFinishedEvent", json!({})));

        drop(sub);
        assert!(!channel.push("TestRunFinishedEvent", json!({})));

        assert_eq!(*seen.lock().unwrap(), vec![json!({ "events": [] })]);
        assert_eq!(
            channel.requests(),
            vec![("TestRunStartedEvent".to_owned(), json!({ "tests": [] }))]
        );
    }

    #[tokio::test]
    async fn closed_channel() {
        let channel = MemoryChannel::new();
        channel.close();
        assert!(matches!(channel.ready().await, Err(ChannelError::Closed)));
        assert!(matches!(
            channel.send_request("TestLoadStartedEvent", json!({})).await,
            Err(ChannelError::Closed)
        ));
    }
}
