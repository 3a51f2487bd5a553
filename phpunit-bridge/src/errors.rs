// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by phpunit-bridge.

use camino::{Utf8Path, Utf8PathBuf};
use config::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// An error returned by a [`SessionBridge`](crate::bridge::SessionBridge) operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BridgeError {
    /// The channel did not signal readiness within the configured timeout.
    #[error("channel to the language server was not ready after {}", humantime::format_duration(*.timeout))]
    ChannelNotReady {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The operation is not supported by this bridge.
    #[error("operation `{operation}` is not implemented")]
    UnsupportedOperation {
        /// The name of the operation.
        operation: &'static str,
    },

    /// The underlying channel failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// An error that occurred while talking to the language server over a
/// [`Channel`](crate::channel::Channel).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChannelError {
    /// The language server process has terminated, or the connection was closed.
    #[error("channel to the language server is closed")]
    Closed,

    /// The language server answered a request with an error.
    #[error("language server returned error {code}: {message}")]
    Remote {
        /// The JSON-RPC error code.
        code: i64,

        /// The error message.
        message: String,
    },

    /// An I/O error occurred on the underlying stream.
    #[error("I/O error communicating with the language server")]
    Io(#[source] std::io::Error),

    /// A message could not be serialized or deserialized.
    #[error("failed to (de)serialize JSON-RPC message")]
    Serialize(#[source] serde_json::Error),

    /// The language server sent something that isn't valid JSON-RPC.
    #[error("protocol error: {message}")]
    Protocol {
        /// A description of the problem.
        message: String,
    },

    /// The language server process could not be started.
    #[error("failed to spawn language server `{command}`")]
    Spawn {
        /// The command that was run.
        command: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },
}

impl ChannelError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

/// An error that occurred while decoding a notification pushed by the language server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotificationDecodeError {
    /// The method isn't one the bridge listens to.
    #[error("unknown notification method `{method}`")]
    UnknownMethod {
        /// The method name.
        method: String,
    },

    /// The params didn't match the shape expected for the method.
    #[error("invalid params for `{method}` at `{}`", .err.path())]
    InvalidParams {
        /// The method name.
        method: &'static str,

        /// The underlying error, including the path to the offending field.
        #[source]
        err: serde_path_to_error::Error<serde_json::Error>,
    },

    /// One event in a run notification didn't decode. The other events are unaffected.
    #[error("invalid event {index} in `{method}` at `{}`", .err.path())]
    InvalidEvent {
        /// The method name.
        method: &'static str,

        /// The position of the event within the notification's `events`.
        index: usize,

        /// The underlying error.
        #[source]
        err: serde_path_to_error::Error<serde_json::Error>,
    },
}

/// An error returned by [`ExecutableResolver::unlink`](crate::resolver::ExecutableResolver::unlink).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UnlinkError {
    /// The file stayed locked for every attempt.
    #[error("timed out deleting `{path}` after {attempts} attempts")]
    DeletionTimeout {
        /// The file that couldn't be deleted.
        path: Utf8PathBuf,

        /// The number of attempts made.
        attempts: u32,

        /// The error from the last attempt, if there was one.
        #[source]
        last_error: Option<std::io::Error>,
    },
}

/// An error that occurred while fetching workspace settings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsError {
    /// The settings source failed.
    #[error("failed to fetch settings section `{section}`")]
    Fetch {
        /// The section requested.
        section: String,

        /// The underlying error.
        #[source]
        err: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The settings didn't match the expected shape.
    #[error("invalid settings in section `{section}` at `{}`", .err.path())]
    Deserialize {
        /// The section requested.
        section: String,

        /// The underlying error, including the path to the offending field.
        #[source]
        err: serde_path_to_error::Error<serde_json::Error>,
    },
}

/// An error that occurred while parsing the bridge config.
#[derive(Debug, Error)]
#[error("failed to parse phpunit-bridge config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of bridge config parse error that occurred.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_not_ready_display() {
        let err = BridgeError::ChannelNotReady {
            timeout: Duration::from_secs(30),
        };
        assert_eq!(
            err.to_string(),
            "channel to the language server was not ready after 30s"
        );

        let err = BridgeError::ChannelNotReady {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(
            err.to_string(),
            "channel to the language server was not ready after 250ms"
        );
    }

    #[test]
    fn unsupported_operation_display() {
        let err = BridgeError::UnsupportedOperation {
            operation: "cancel",
        };
        assert_eq!(err.to_string(), "operation `cancel` is not implemented");
    }
}
