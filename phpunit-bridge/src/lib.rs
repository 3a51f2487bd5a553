// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for a PHPUnit test explorer backed by a language server.
//!
//! The main pieces are:
//!
//! * [`bridge::SessionBridge`], which adapts a [`channel::Channel`] into the push-style
//!   `tests` / `testStates` / `autorun` contract of a test explorer;
//! * [`index::ResultIndex`], which stores the latest results per source file;
//! * [`resolver::ExecutableResolver`], which finds executables on the `PATH` and deletes files
//!   that may still be locked by a running process.

pub mod bridge;
pub mod channel;
pub mod config;
pub mod emitter;
pub mod errors;
pub mod index;
pub mod resolver;
