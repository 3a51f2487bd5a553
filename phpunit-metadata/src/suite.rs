// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A node in the discovered test tree: either a suite or a single test.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TestNode {
    /// A suite, which may contain further suites and tests.
    Suite(TestSuiteInfo),

    /// A single test.
    Test(TestInfo),
}

impl TestNode {
    /// The identifier of this node.
    pub fn id(&self) -> &str {
        match self {
            Self::Suite(suite) => &suite.id,
            Self::Test(test) => &test.id,
        }
    }
}

/// A test suite, as discovered by the language server.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteInfo {
    /// The unique identifier of this suite.
    pub id: String,

    /// The label shown in the test explorer.
    pub label: String,

    /// The source file the suite is defined in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// The 0-based line the suite is defined at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// An optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// An optional tooltip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,

    /// The suites and tests within this suite.
    #[serde(default)]
    pub children: Vec<TestNode>,

    /// Any other fields sent by the server, such as `debuggable`. A root suite also keeps its
    /// `type` here, since it isn't wrapped in a [`TestNode`].
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TestSuiteInfo {
    /// Returns the number of tests in this suite, recursively.
    pub fn test_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                TestNode::Suite(suite) => suite.test_count(),
                TestNode::Test(_) => 1,
            })
            .sum()
    }
}

/// A single test, as discovered by the language server.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestInfo {
    /// The unique identifier of this test.
    pub id: String,

    /// The label shown in the test explorer.
    pub label: String,

    /// The source file the test is defined in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// The 0-based line the test is defined at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// An optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// An optional tooltip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,

    /// Whether the test is marked as skipped ahead of time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,

    /// Any other fields sent by the server.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
