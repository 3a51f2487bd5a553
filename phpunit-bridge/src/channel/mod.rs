// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The request/notification channel to the PHPUnit language server.
//!
//! [`Channel`] is the seam the [`SessionBridge`](crate::bridge::SessionBridge) is written
//! against. [`JsonRpcChannel`] implements it over a JSON-RPC 2.0 byte stream, and
//! [`MemoryChannel`] implements it in-process.

mod framing;
mod jsonrpc;
mod memory;
mod notification;

pub use jsonrpc::*;
pub use memory::*;
pub use notification::*;

use crate::{emitter::Subscription, errors::ChannelError};
use serde_json::Value;
use std::{future::Future, sync::Arc};

/// A handler for notifications on a single method. It receives the raw params.
pub type NotificationHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// A registration made through [`Channel::on_notification`].
pub type ChannelSubscription = Subscription;

/// A bidirectional connection to the language server.
pub trait Channel: Send + Sync + 'static {
    /// Resolves once the connection has completed its startup handshake.
    ///
    /// Returns [`ChannelError::Closed`] if the connection closed before becoming ready.
    fn ready(&self) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Sends a request and waits for the matching response.
    fn send_request(
        &self,
        method: &str,
        params: Value,
    ) -> impl Future<Output = Result<Value, ChannelError>> + Send;

    /// Registers `handler` for notifications (and requests) on `method`.
    ///
    /// Handlers are called in arrival order. The registration lasts until the returned
    /// subscription is disposed or dropped.
    fn on_notification(&self, method: &str, handler: NotificationHandler) -> ChannelSubscription;
}
