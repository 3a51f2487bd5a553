// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session bridge between a test explorer and the PHPUnit language server.
//!
//! A [`SessionBridge`] turns requests from the explorer (`load`, `run`) into requests on a
//! [`Channel`], and turns notifications pushed by the server into events on three streams:
//! [`tests`](SessionBridge::tests), [`test_states`](SessionBridge::test_states) and
//! [`autorun`](SessionBridge::autorun). Every per-item result is also recorded in a
//! [`SharedResultIndex`].

use crate::{
    channel::{Channel, ChannelSubscription, Notification},
    config::BridgeConfig,
    emitter::Emitter,
    errors::{BridgeError, ChannelError},
    index::{ResultIndexView, SharedResultIndex},
};
use phpunit_metadata::{
    SERVER_NOTIFICATIONS, TEST_LOAD_STARTED, TEST_RUN_STARTED, TestLoadStartedParams,
    TestRunStartedParams, TestStateEvent, TestStatesEvent, TestsEvent,
};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Adapts a [`Channel`] to the push contract of a test explorer.
#[derive(Debug)]
pub struct SessionBridge<C> {
    channel: C,
    index: SharedResultIndex,
    ready_timeout: Option<Duration>,
    ready: OnceCell<()>,
    streams: Arc<Streams>,
    subscriptions: Mutex<BTreeMap<&'static str, ChannelSubscription>>,
}

#[derive(Debug, Default)]
struct Streams {
    tests: Emitter<TestsEvent>,
    test_states: Emitter<TestStatesEvent>,
    autorun: Emitter<()>,
    disposed: AtomicBool,
}

impl<C: Channel> SessionBridge<C> {
    /// Creates a bridge over `channel` and starts listening for server notifications.
    pub fn new(channel: C, index: SharedResultIndex, config: &BridgeConfig) -> Self {
        let bridge = Self {
            channel,
            index,
            ready_timeout: config.ready_timeout(),
            ready: OnceCell::new(),
            streams: Arc::new(Streams::default()),
            subscriptions: Mutex::new(BTreeMap::new()),
        };
        bridge.listen();
        bridge
    }

    /// Registers handlers for the server notifications.
    ///
    /// Each method is registered at most once; repeated calls are no-ops. Does nothing after
    /// [`dispose`](Self::dispose).
    pub fn listen(&self) {
        if self.streams.is_disposed() {
            return;
        }
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for method in SERVER_NOTIFICATIONS {
            if subscriptions.contains_key(method) {
                continue;
            }
            let streams = self.streams.clone();
            let index = self.index.clone();
            let subscription = self.channel.on_notification(
                method,
                Arc::new(move |params: Value| {
                    handle_notification(method, params, &streams, &index)
                }),
            );
            debug!(method, "listening for notifications");
            subscriptions.insert(method, subscription);
        }
    }

    /// Starts test discovery.
    ///
    /// [`TestsEvent::Started`] is emitted when this is called, before the returned future is
    /// first polled. The discovered tree arrives later as [`TestsEvent::Finished`], when the
    /// server pushes it.
    pub fn load(&self) -> impl Future<Output = Result<Value, BridgeError>> {
        self.streams.emit_tests(&TestsEvent::Started);
        async move {
            self.ensure_ready().await?;
            info!("loading tests");
            let params =
                serde_json::to_value(TestLoadStartedParams {}).map_err(ChannelError::Serialize)?;
            Ok(self.channel.send_request(TEST_LOAD_STARTED, params).await?)
        }
    }

    /// Runs the given tests or suites.
    ///
    /// Resolves when the server acknowledges the request. Results are delivered on
    /// [`test_states`](Self::test_states), ending with [`TestStatesEvent::RunFinished`].
    pub async fn run(&self, tests: Vec<String>) -> Result<Value, BridgeError> {
        self.ensure_ready().await?;
        info!(count = tests.len(), "running tests");
        let params =
            serde_json::to_value(TestRunStartedParams { tests }).map_err(ChannelError::Serialize)?;
        Ok(self.channel.send_request(TEST_RUN_STARTED, params).await?)
    }

    /// Cancelling a run is not supported.
    pub fn cancel(&self) -> Result<(), BridgeError> {
        Err(BridgeError::UnsupportedOperation {
            operation: "cancel",
        })
    }

    /// Releases every channel subscription. No events are emitted afterwards.
    pub fn dispose(&self) {
        if self.streams.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let subscriptions = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        debug!(count = subscriptions.len(), "disposing channel subscriptions");
        drop(subscriptions);
        self.streams.tests.clear();
        self.streams.test_states.clear();
        self.streams.autorun.clear();
    }

    /// Test discovery events.
    pub fn tests(&self) -> &Emitter<TestsEvent> {
        &self.streams.tests
    }

    /// Test execution events.
    pub fn test_states(&self) -> &Emitter<TestStatesEvent> {
        &self.streams.test_states
    }

    /// Requests from the server to re-run tests. Currently never fired.
    pub fn autorun(&self) -> &Emitter<()> {
        &self.streams.autorun
    }

    /// A read-only view of the results recorded by this bridge.
    pub fn index(&self) -> ResultIndexView {
        self.index.view()
    }

    /// The underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Returns the number of live channel subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn ensure_ready(&self) -> Result<(), BridgeError> {
        self.ready
            .get_or_try_init(|| async {
                let ready = self.channel.ready();
                match self.ready_timeout {
                    Some(timeout) => tokio::time::timeout(timeout, ready)
                        .await
                        .map_err(|_| BridgeError::ChannelNotReady { timeout })??,
                    None => ready.await?,
                }
                debug!("channel ready");
                Ok::<_, BridgeError>(())
            })
            .await?;
        Ok(())
    }
}

impl<C> Drop for SessionBridge<C> {
    fn drop(&mut self) {
        self.streams.disposed.store(true, Ordering::SeqCst);
        // Subscriptions unregister themselves as they are dropped.
    }
}

impl Streams {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn emit_tests(&self, event: &TestsEvent) {
        if !self.is_disposed() {
            self.tests.emit(event);
        }
    }

    fn emit_test_states(&self, event: &TestStatesEvent) {
        if !self.is_disposed() {
            self.test_states.emit(event);
        }
    }
}

fn handle_notification(
    method: &'static str,
    params: Value,
    streams: &Streams,
    index: &SharedResultIndex,
) {
    if streams.is_disposed() {
        return;
    }
    let notification = match Notification::decode(method, params) {
        Ok(decoded) => {
            for error in &decoded.rejected {
                warn!(method, %error, "skipping undecodable event");
            }
            decoded.notification
        }
        Err(error) => {
            warn!(method, %error, "dropping undecodable notification");
            return;
        }
    };

    match notification {
        Notification::TestLoadFinished(params) => {
            debug!(
                tests = params.suite.as_ref().map(|suite| suite.test_count()),
                "test load finished"
            );
            streams.emit_tests(&TestsEvent::Finished {
                suite: params.suite,
                error_message: params.error_message,
            });
        }
        Notification::TestRunStarted(params) => {
            streams.emit_test_states(&TestStatesEvent::RunStarted {
                tests: params.tests,
            });
            apply_batch(params.events, streams, index);
        }
        Notification::TestRunFinished(params) => {
            apply_batch(params.events, streams, index);
            info!("test run finished");
            streams.emit_test_states(&TestStatesEvent::RunFinished);
        }
    }
}

/// Records the whole batch in the index, then forwards each event in order.
fn apply_batch(events: Vec<TestStateEvent>, streams: &Streams, index: &SharedResultIndex) {
    if events.is_empty() {
        return;
    }
    index
        .write()
        .put(events.iter().filter_map(TestStateEvent::to_message));
    debug!(count = events.len(), "applied result batch");
    for event in events {
        streams.emit_test_states(&event.into());
    }
}
