// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line tools for the PHPUnit session bridge.
//!
//! The `phpunit-bridge` binary resolves executables the same way the editor extension does,
//! deletes stale artifacts, replays recorded language server sessions, and queries stored
//! results.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter};
