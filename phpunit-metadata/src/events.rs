// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{Message, TestOutcomeState, TestSuiteInfo};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The state of a suite, as reported in a [`TestSuiteEvent`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SuiteState {
    /// The suite started running.
    Running,

    /// The suite finished running.
    Completed,

    /// The suite could not be run.
    Errored,
}

impl SuiteState {
    /// The outcome state used when indexing a suite in this state.
    pub fn to_outcome(self) -> TestOutcomeState {
        match self {
            Self::Running => TestOutcomeState::Running,
            Self::Completed => TestOutcomeState::Passed,
            Self::Errored => TestOutcomeState::Errored,
        }
    }
}

/// A state change for a suite.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteEvent {
    /// The identifier of the suite.
    pub suite: String,

    /// The new state of the suite.
    pub state: SuiteState,

    /// The source file of the suite, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// The line of the suite, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// An updated description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// An updated tooltip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,

    /// Any other fields sent by the server.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A state change for a single test.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestEvent {
    /// The identifier of the test.
    pub test: String,

    /// The new state of the test.
    pub state: TestOutcomeState,

    /// The source file of the test, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// The line of the test, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// Output or failure text for the test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// An updated description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// An updated tooltip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,

    /// Inline decorations to show in the editor, e.g. at the failing assertion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorations: Vec<TestDecoration>,

    /// Any other fields sent by the server, such as `duration`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An inline decoration attached to a [`TestEvent`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TestDecoration {
    /// The 0-based line to decorate.
    pub line: u32,

    /// The text to show.
    pub message: String,

    /// Any other fields sent by the server, such as `hover`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A per-suite or per-test event, forwarded to the test explorer as it was received.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TestStateEvent {
    /// A suite event.
    Suite(TestSuiteEvent),

    /// A test event.
    Test(TestEvent),
}

impl TestStateEvent {
    /// The source file this event was reported against, if any.
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::Suite(event) => event.file.as_deref(),
            Self::Test(event) => event.file.as_deref(),
        }
    }

    /// Converts this event into a [`Message`] suitable for indexing.
    ///
    /// Returns `None` if the event doesn't carry a source file, since such events can't be
    /// addressed by file.
    pub fn to_message(&self) -> Option<Message> {
        let message = match self {
            Self::Suite(event) => {
                let mut message = Message::new(event.file.clone()?, event.state.to_outcome())
                    .with_name(event.suite.clone())
                    .with_extra("type", "suite");
                if let Some(line) = event.line {
                    message = message.with_line(line);
                }
                if let Some(description) = &event.description {
                    message = message.with_description(description.clone());
                }
                message
            }
            Self::Test(event) => {
                let mut message = Message::new(event.file.clone()?, event.state)
                    .with_name(event.test.clone())
                    .with_extra("type", "test");
                if let Some(line) = event.line {
                    message = message.with_line(line);
                }
                if let Some(description) = &event.description {
                    message = message.with_description(description.clone());
                }
                if let Some(text) = &event.message {
                    message = message.with_extra("message", text.clone());
                }
                message
            }
        };
        Some(message)
    }
}

/// An event on the `tests` stream of a test explorer: test discovery.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TestsEvent {
    /// Test discovery started.
    Started,

    /// Test discovery finished.
    #[serde(rename_all = "camelCase")]
    Finished {
        /// The discovered suite tree, if discovery succeeded.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suite: Option<TestSuiteInfo>,

        /// The reason discovery failed, if it did.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

/// An event on the `testStates` stream of a test explorer: test execution.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TestStatesEvent {
    /// A test run started.
    #[serde(rename = "started")]
    RunStarted {
        /// The identifiers of the tests that were requested.
        tests: Vec<String>,
    },

    /// A test run finished.
    #[serde(rename = "finished")]
    RunFinished,

    /// A suite event.
    Suite(TestSuiteEvent),

    /// A test event.
    Test(TestEvent),
}

impl From<TestStateEvent> for TestStatesEvent {
    fn from(event: TestStateEvent) -> Self {
        match event {
            TestStateEvent::Suite(event) => Self::Suite(event),
            TestStateEvent::Test(event) => Self::Test(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn state_event_tagging() {
        let events: Vec<TestStateEvent> = serde_json::from_value(json!([
            { "type": "suite", "suite": "FooTest", "state": "running", "file": "/FooTest.php" },
            { "type": "test", "test": "FooTest::test_a", "state": "failed", "message": "boom" },
        ]))
        .unwrap();

        assert!(matches!(&events[0], TestStateEvent::Suite(e) if e.state == SuiteState::Running));
        assert!(
            matches!(&events[1], TestStateEvent::Test(e) if e.state == TestOutcomeState::Failed)
        );
        assert_eq!(events[0].file(), Some("/FooTest.php"));
        assert_eq!(events[1].file(), None);
    }

    #[test]
    fn to_message() {
        let event = TestStateEvent::Test(TestEvent {
            test: "FooTest::test_a".to_owned(),
            state: TestOutcomeState::Failed,
            file: Some("C:/FooTest.php".to_owned()),
            line: Some(7),
            message: Some("Failed asserting that false is true.".to_owned()),
            description: None,
            tooltip: None,
            decorations: Vec::new(),
            extra: Map::new(),
        });

        let expected = Message::new("C:/FooTest.php", TestOutcomeState::Failed)
            .with_name("FooTest::test_a")
            .with_line(7)
            .with_extra("type", "test")
            .with_extra("message", "Failed asserting that false is true.");
        assert_eq!(event.to_message(), Some(expected));

        let suite = TestStateEvent::Suite(TestSuiteEvent {
            suite: "FooTest".to_owned(),
            state: SuiteState::Completed,
            file: Some("/FooTest.php".to_owned()),
            line: None,
            description: None,
            tooltip: None,
            extra: Map::new(),
        });
        let message = suite.to_message().expect("suite has a file");
        assert_eq!(message.state(), TestOutcomeState::Passed);
    }

    #[test]
    fn state_events_keep_wire_shape() {
        let wire = json!([
            {
                "type": "test",
                "test": "FooTest::test_a",
                "state": "failed",
                "file": "/FooTest.php",
                "duration": 12.5,
                "decorations": [{ "line": 7, "message": "boom", "hover": "Failed asserting" }],
            },
            { "type": "suite", "suite": "FooTest", "state": "completed", "errored": false },
        ]);

        let events: Vec<TestStateEvent> = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(serde_json::to_value(&events).unwrap(), wire);

        let forwarded: Vec<TestStatesEvent> = events.into_iter().map(Into::into).collect();
        assert_eq!(serde_json::to_value(&forwarded).unwrap(), wire);
    }

    #[test]
    fn lifecycle_event_shapes() {
        assert_eq!(
            serde_json::to_value(TestsEvent::Started).unwrap(),
            json!({ "type": "started" })
        );
        assert_eq!(
            serde_json::to_value(TestStatesEvent::RunStarted {
                tests: vec!["root".to_owned()]
            })
            .unwrap(),
            json!({ "type": "started", "tests": ["root"] })
        );
        assert_eq!(
            serde_json::to_value(TestStatesEvent::RunFinished).unwrap(),
            json!({ "type": "finished" })
        );
        assert_eq!(
            serde_json::to_value(TestsEvent::Finished {
                suite: None,
                error_message: Some("no phpunit.xml".to_owned()),
            })
            .unwrap(),
            json!({ "type": "finished", "errorMessage": "no phpunit.xml" })
        );
    }
}
