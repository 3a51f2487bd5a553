// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `phpunit-bridge` failures.
///
/// Unknown or unexpected failures always result in exit code 1.
pub enum BridgeExitCode {}

impl BridgeExitCode {
    /// No errors occurred and the command exited normally.
    pub const OK: i32 = 0;

    /// One or more executables could not be found.
    pub const NOT_FOUND: i32 = 1;

    /// A file could not be deleted because it stayed locked.
    pub const DELETION_TIMEOUT: i32 = 60;

    /// Communicating with the language server failed.
    pub const CHANNEL_ERROR: i32 = 70;

    /// An input file (transcript or results) could not be read or parsed.
    pub const INPUT_ERROR: i32 = 95;

    /// A user issue happened while setting up an invocation, e.g. an invalid config file.
    pub const SETUP_ERROR: i32 = 96;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
