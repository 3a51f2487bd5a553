// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for phpunit-bridge.
//!
//! There are two layers:
//!
//! * [`BridgeConfig`] holds runtime knobs for the bridge itself (readiness timeout, deletion
//!   retries). It is read from an embedded default config, overlaid with an optional
//!   `.config/phpunit-bridge.toml`.
//! * [`Configuration`] holds the PHPUnit settings for a workspace, fetched from a
//!   [`SettingsSource`] such as the editor's settings store.

mod bridge_config;
mod settings;

pub use bridge_config::*;
pub use settings::*;
