// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::TestOutcomeState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One reported fact about one test or suite.
///
/// A message is keyed by the source file it was reported against. Apart from the file name and
/// the outcome state, its contents are opaque: the language server can attach arbitrary extra
/// fields, which are preserved verbatim through serialization.
///
/// Messages are immutable once constructed.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    file_name: String,
    state: TestOutcomeState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Message {
    /// Creates a new message for the given file and state, with no metadata attached.
    pub fn new(file_name: impl Into<String>, state: TestOutcomeState) -> Self {
        Self {
            file_name: file_name.into(),
            state,
            name: None,
            line: None,
            description: None,
            extra: Map::new(),
        }
    }

    /// Sets the name of the test or suite this message is about.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the (1-based) line this message points at.
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Sets a free-form description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attaches an extra field, preserved verbatim on serialization.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// The source file this message was reported against, as sent by the server.
    ///
    /// This may be qualified with a drive letter, e.g. `C:/src/FooTest.php`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The outcome state.
    pub fn state(&self) -> TestOutcomeState {
        self.state
    }

    /// The name of the test or suite, if known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The line number, if known.
    pub fn line(&self) -> Option<u32> {
        self.line
    }

    /// The description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Extra fields not otherwise interpreted.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deserialize_minimal() {
        let message: Message =
            serde_json::from_value(json!({ "fileName": "/x.php", "state": "failed" })).unwrap();
        assert_eq!(message, Message::new("/x.php", TestOutcomeState::Failed));
    }

    #[test]
    fn extra_fields_are_preserved() {
        let input = json!({
            "fileName": "C:/tests/FooTest.php",
            "state": "passed",
            "name": "test_it_works",
            "line": 12,
            "duration": 0.25,
            "files": [{ "file": "C:/src/Foo.php", "line": 3 }],
        });
        let message: Message = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(message.file_name(), "C:/tests/FooTest.php");
        assert_eq!(message.name(), Some("test_it_works"));
        assert_eq!(message.line(), Some(12));
        assert_eq!(message.extra().get("duration"), Some(&json!(0.25)));

        assert_eq!(serde_json::to_value(&message).unwrap(), input);
    }
}
