// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the messages and events exchanged between a PHPUnit language server and
//! a test explorer.
//!
//! The types in this crate are plain serializable data. They are shared between
//! [`phpunit-bridge`](https://docs.rs/phpunit-bridge), which moves them across a JSON-RPC
//! channel, and any tool that wants to read recorded results.
//!
//! Field names follow the wire format used by the language server, so JSON produced by the
//! server deserializes directly into these types.

mod events;
mod exit_codes;
mod message;
mod methods;
mod params;
#[cfg(feature = "proptest1")]
mod proptest_helpers;
mod state;
mod suite;

pub use events::*;
pub use exit_codes::*;
pub use message::*;
pub use methods::*;
pub use params::*;
pub use state::*;
pub use suite::*;
