// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-RPC method names exchanged with the language server.

/// Sent by the client to start test discovery. Params: [`TestLoadStartedParams`](crate::TestLoadStartedParams).
pub const TEST_LOAD_STARTED: &str = "TestLoadStartedEvent";

/// Sent by the server once discovery is complete. Params:
/// [`TestLoadFinishedParams`](crate::TestLoadFinishedParams).
pub const TEST_LOAD_FINISHED: &str = "TestLoadFinishedEvent";

/// Sent by the client to start a run, and by the server to report that the run started.
///
/// Client params: [`TestRunStartedParams`](crate::TestRunStartedParams). Server params:
/// [`TestRunStartedNotification`](crate::TestRunStartedNotification).
pub const TEST_RUN_STARTED: &str = "TestRunStartedEvent";

/// Sent by the server once a run is complete. Params:
/// [`TestRunFinishedParams`](crate::TestRunFinishedParams).
pub const TEST_RUN_FINISHED: &str = "TestRunFinishedEvent";

/// The methods the server may push to the client.
pub const SERVER_NOTIFICATIONS: [&str; 3] = [TEST_LOAD_FINISHED, TEST_RUN_STARTED, TEST_RUN_FINISHED];
