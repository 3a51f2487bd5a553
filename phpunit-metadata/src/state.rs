// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The outcome of a single test, as reported by the language server.
///
/// The declaration order is significant: it is the order in which
/// [`TestOutcomeState::ALL`] lists states, and the order in which per-state groupings are
/// presented.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcomeState {
    /// The test is currently running.
    Running,

    /// The test passed.
    Passed,

    /// The test failed an assertion.
    Failed,

    /// The test was skipped or marked incomplete.
    Skipped,

    /// The test could not be run, or raised an unexpected error.
    Errored,
}

impl TestOutcomeState {
    /// All known states, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Running,
        Self::Passed,
        Self::Failed,
        Self::Skipped,
        Self::Errored,
    ];

    /// Returns the wire name for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Errored => "errored",
        }
    }

    /// Returns the wire names of all known states.
    pub fn variants() -> [&'static str; 5] {
        Self::ALL.map(Self::as_str)
    }

    /// Returns true if this state is final, i.e. the test is no longer running.
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for TestOutcomeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestOutcomeState {
    type Err = TestOutcomeStateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TestOutcomeStateParseError {
                input: s.to_owned(),
            })
    }
}

/// Error returned while parsing a [`TestOutcomeState`] from a string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestOutcomeStateParseError {
    input: String,
}

impl TestOutcomeStateParseError {
    /// The input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for TestOutcomeStateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unrecognized test outcome state: {}\n(known values: {})",
            self.input,
            TestOutcomeState::variants().join(", "),
        )
    }
}

impl std::error::Error for TestOutcomeStateParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("running", TestOutcomeState::Running)]
    #[test_case("passed", TestOutcomeState::Passed)]
    #[test_case("FAILED", TestOutcomeState::Failed)]
    #[test_case("Skipped", TestOutcomeState::Skipped)]
    #[test_case("errored", TestOutcomeState::Errored)]
    fn parse_state(input: &str, expected: TestOutcomeState) {
        assert_eq!(input.parse::<TestOutcomeState>(), Ok(expected));
    }

    #[test]
    fn parse_unknown_state() {
        let err = "completed".parse::<TestOutcomeState>().unwrap_err();
        assert_eq!(err.input(), "completed");
        assert_eq!(
            err.to_string(),
            "unrecognized test outcome state: completed\n\
             (known values: running, passed, failed, skipped, errored)"
        );
    }

    #[test]
    fn all_is_sorted() {
        let mut sorted = TestOutcomeState::ALL;
        sorted.sort();
        assert_eq!(sorted, TestOutcomeState::ALL, "ALL is in declaration order");
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&TestOutcomeState::Errored).unwrap();
        assert_eq!(json, r#""errored""#);
    }
}
