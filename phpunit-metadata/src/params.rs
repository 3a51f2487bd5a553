// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{TestStateEvent, TestSuiteInfo};
use serde::{Deserialize, Serialize};

/// Parameters for a `TestLoadStartedEvent` request. Always empty.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TestLoadStartedParams {}

/// Parameters for a `TestRunStartedEvent` request.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TestRunStartedParams {
    /// The identifiers of the tests or suites to run.
    pub tests: Vec<String>,
}

/// Parameters for a `TestLoadFinishedEvent` notification.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestLoadFinishedParams {
    /// The discovered suite tree.
    #[serde(default)]
    pub suite: Option<TestSuiteInfo>,

    /// The reason discovery failed, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Parameters for a `TestRunStartedEvent` notification pushed by the server.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TestRunStartedNotification {
    /// The identifiers of the tests that are about to run.
    #[serde(default)]
    pub tests: Vec<String>,

    /// Events that are already known at the start of the run.
    #[serde(default)]
    pub events: Vec<TestStateEvent>,
}

/// Parameters for a `TestRunFinishedEvent` notification.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TestRunFinishedParams {
    /// The results of the run.
    #[serde(default)]
    pub events: Vec<TestStateEvent>,
}
