// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::NotificationDecodeError;
use phpunit_metadata::{
    TEST_LOAD_FINISHED, TEST_RUN_FINISHED, TEST_RUN_STARTED, TestLoadFinishedParams,
    TestRunFinishedParams, TestRunStartedNotification, TestStateEvent,
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

/// A notification pushed by the language server, decoded into its typed form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// Test discovery has finished.
    TestLoadFinished(TestLoadFinishedParams),

    /// A test run has started.
    TestRunStarted(TestRunStartedNotification),

    /// A test run has finished.
    TestRunFinished(TestRunFinishedParams),
}

/// The result of [`Notification::decode`].
#[derive(Debug)]
pub struct DecodedNotification {
    /// The notification, holding every event that could be decoded.
    pub notification: Notification,

    /// Events that were left out of the notification because they couldn't be decoded.
    pub rejected: Vec<NotificationDecodeError>,
}

impl Notification {
    /// Decodes the params of a notification with the given method.
    ///
    /// A `null` params value is treated as an empty object. The events of a run are decoded one
    /// at a time: an event that doesn't decode is reported in
    /// [`rejected`](DecodedNotification::rejected) and the rest of the batch is kept. The
    /// notification as a whole fails to decode only if its envelope is invalid.
    pub fn decode(
        method: &str,
        params: Value,
    ) -> Result<DecodedNotification, NotificationDecodeError> {
        match method {
            TEST_LOAD_FINISHED => {
                let params = decode_params(TEST_LOAD_FINISHED, params)?;
                Ok(DecodedNotification {
                    notification: Self::TestLoadFinished(params),
                    rejected: Vec::new(),
                })
            }
            TEST_RUN_STARTED => {
                let envelope: RunEnvelope = decode_params(TEST_RUN_STARTED, params)?;
                let (events, rejected) = decode_events(TEST_RUN_STARTED, envelope.events);
                Ok(DecodedNotification {
                    notification: Self::TestRunStarted(TestRunStartedNotification {
                        tests: envelope.tests,
                        events,
                    }),
                    rejected,
                })
            }
            TEST_RUN_FINISHED => {
                let envelope: RunEnvelope = decode_params(TEST_RUN_FINISHED, params)?;
                let (events, rejected) = decode_events(TEST_RUN_FINISHED, envelope.events);
                Ok(DecodedNotification {
                    notification: Self::TestRunFinished(TestRunFinishedParams { events }),
                    rejected,
                })
            }
            other => Err(NotificationDecodeError::UnknownMethod {
                method: other.to_owned(),
            }),
        }
    }

    /// The method this notification was received on.
    pub fn method(&self) -> &'static str {
        match self {
            Self::TestLoadFinished(_) => TEST_LOAD_FINISHED,
            Self::TestRunStarted(_) => TEST_RUN_STARTED,
            Self::TestRunFinished(_) => TEST_RUN_FINISHED,
        }
    }
}

/// The params of a run notification, with the events left undecoded.
#[derive(Debug, Deserialize)]
struct RunEnvelope {
    #[serde(default)]
    tests: Vec<String>,
    #[serde(default)]
    events: Vec<Value>,
}

fn decode_params<T: DeserializeOwned>(
    method: &'static str,
    params: Value,
) -> Result<T, NotificationDecodeError> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_path_to_error::deserialize(params)
        .map_err(|err| NotificationDecodeError::InvalidParams { method, err })
}

fn decode_events(
    method: &'static str,
    events: Vec<Value>,
) -> (Vec<TestStateEvent>, Vec<NotificationDecodeError>) {
    let mut decoded = Vec::with_capacity(events.len());
    let mut rejected = Vec::new();
    for (index, event) in events.into_iter().enumerate() {
        match serde_path_to_error::deserialize(event) {
            Ok(event) => decoded.push(event),
            Err(err) => {
                rejected.push(NotificationDecodeError::InvalidEvent { method, index, err })
            }
        }
    }
    (decoded, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use phpunit_metadata::TestOutcomeState;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decode_run_finished() {
        let decoded = Notification::decode(
            TEST_RUN_FINISHED,
            json!({
                "events": [
                    { "type": "test", "test": "FooTest::test_a", "state": "passed", "file": "/FooTest.php" },
                ],
            }),
        )
        .unwrap();
        assert!(decoded.rejected.is_empty());
        let notification = decoded.notification;

        let Notification::TestRunFinished(params) = &notification else {
            panic!("unexpected notification: {notification:?}");
        };
        assert_eq!(params.events.len(), 1);
        assert!(
            matches!(&params.events[0], TestStateEvent::Test(e) if e.state == TestOutcomeState::Passed)
        );
        assert_eq!(notification.method(), TEST_RUN_FINISHED);
    }

    #[test]
    fn decode_null_params() {
        assert_eq!(
            Notification::decode(TEST_LOAD_FINISHED, Value::Null)
                .unwrap()
                .notification,
            Notification::TestLoadFinished(TestLoadFinishedParams::default()),
        );
    }

    #[test]
    fn decode_unknown_method() {
        let err = Notification::decode("window/logMessage", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "unknown notification method `window/logMessage`");
    }

    #[test]
    fn decode_skips_invalid_events() {
        let decoded = Notification::decode(
            TEST_RUN_STARTED,
            json!({
                "tests": ["FooTest"],
                "events": [
                    { "type": "test", "test": "FooTest::test_a", "state": "passed" },
                    { "type": "test", "test": "FooTest::test_b", "state": "passed", "line": -1 },
                    { "type": "output", "text": "..." },
                    { "type": "suite", "suite": "FooTest", "state": "completed" },
                ],
            }),
        )
        .unwrap();

        let Notification::TestRunStarted(params) = &decoded.notification else {
            panic!("unexpected notification: {:?}", decoded.notification);
        };
        assert_eq!(params.tests, vec!["FooTest".to_owned()]);
        assert_eq!(params.events.len(), 2);
        assert!(matches!(&params.events[1], TestStateEvent::Suite(_)));

        assert_eq!(decoded.rejected.len(), 2);
        for (err, index) in decoded.rejected.iter().zip([1, 2]) {
            assert!(
                matches!(err, NotificationDecodeError::InvalidEvent { index: i, .. } if *i == index),
                "unexpected error: {err:?}"
            );
            let prefix = format!("invalid event {index} in `TestRunStartedEvent` at ");
            assert!(err.to_string().starts_with(&prefix), "{err}");
        }
    }

    #[test]
    fn decode_invalid_params() {
        let err = Notification::decode(
            TEST_RUN_STARTED,
            json!({ "tests": "FooTest::test_a", "events": [] }),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid params for `TestRunStartedEvent` at `tests`"
        );
    }
}
