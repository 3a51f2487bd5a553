// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for phpunit-bridge.

mod bridge;
mod fixtures;
mod resolver;
