// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::StderrStyles;
use camino::Utf8PathBuf;
use itertools::Itertools;
use owo_colors::OwoColorize;
use phpunit_bridge::errors::{BridgeError, ConfigParseError, SettingsError, UnlinkError};
use phpunit_metadata::BridgeExitCode;
use std::error::Error;
use thiserror::Error;

// The #[error()] strings are placeholders. Errors are printed with `display_to_stderr`, which
// adds colors and the chain of causes.

/// An expected failure: bad input, an unreachable server, or a file that stayed locked.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("current directory is invalid")]
    CurrentDirInvalid {
        #[source]
        err: std::io::Error,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("argument file read error")]
    ArgumentFileReadError {
        arg_name: &'static str,
        file_name: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("argument json parse error")]
    ArgumentJsonParseError {
        arg_name: &'static str,
        file_name: Utf8PathBuf,
        #[source]
        err: serde_json::Error,
    },
    #[error("transcript parse error")]
    TranscriptParseError {
        file_name: Utf8PathBuf,
        line_number: usize,
        #[source]
        err: serde_json::Error,
    },
    #[error("settings error")]
    SettingsError {
        file_name: Utf8PathBuf,
        #[source]
        err: SettingsError,
    },
    #[error("deletion timed out")]
    UnlinkError {
        #[from]
        err: UnlinkError,
    },
    #[error("bridge error")]
    BridgeError {
        #[from]
        err: BridgeError,
    },
    #[error("runtime build error")]
    RuntimeBuildError {
        #[source]
        err: std::io::Error,
    },
    #[error("write output error")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn argument_file_read_error(
        arg_name: &'static str,
        file_name: impl Into<Utf8PathBuf>,
        err: std::io::Error,
    ) -> Self {
        Self::ArgumentFileReadError {
            arg_name,
            file_name: file_name.into(),
            err,
        }
    }

    pub(crate) fn argument_json_parse_error(
        arg_name: &'static str,
        file_name: impl Into<Utf8PathBuf>,
        err: serde_json::Error,
    ) -> Self {
        Self::ArgumentJsonParseError {
            arg_name,
            file_name: file_name.into(),
            err,
        }
    }

    pub(crate) fn transcript_parse_error(
        file_name: impl Into<Utf8PathBuf>,
        line_number: usize,
        err: serde_json::Error,
    ) -> Self {
        Self::TranscriptParseError {
            file_name: file_name.into(),
            line_number,
            err,
        }
    }

    pub(crate) fn write_output_error(err: std::io::Error) -> Self {
        Self::WriteOutputError { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirInvalid { .. }
            | Self::ConfigParseError { .. }
            | Self::RuntimeBuildError { .. } => BridgeExitCode::SETUP_ERROR,
            Self::ArgumentFileReadError { .. }
            | Self::ArgumentJsonParseError { .. }
            | Self::TranscriptParseError { .. }
            | Self::SettingsError { .. } => BridgeExitCode::INPUT_ERROR,
            Self::UnlinkError { .. } => BridgeExitCode::DELETION_TIMEOUT,
            Self::BridgeError { .. } => BridgeExitCode::CHANNEL_ERROR,
            Self::WriteOutputError { .. } => BridgeExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr, along with its chain of causes.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirInvalid { err } => {
                tracing::error!("current directory is invalid");
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                tracing::error!(
                    "failed to parse config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::ArgumentFileReadError {
                arg_name,
                file_name,
                err,
            } => {
                tracing::error!(
                    "argument {} specified file `{}` that couldn't be read",
                    format!("--{arg_name}").style(styles.bold),
                    file_name.style(styles.bold),
                );
                Some(err as &dyn Error)
            }
            Self::ArgumentJsonParseError {
                arg_name,
                file_name,
                err,
            } => {
                tracing::error!(
                    "argument {} specified JSON file `{}` that couldn't be deserialized",
                    format!("--{arg_name}").style(styles.bold),
                    file_name.style(styles.bold),
                );
                Some(err as &dyn Error)
            }
            Self::TranscriptParseError {
                file_name,
                line_number,
                err,
            } => {
                tracing::error!(
                    "transcript `{}` has an invalid entry on line {}",
                    file_name.style(styles.bold),
                    line_number.style(styles.bold),
                );
                Some(err as &dyn Error)
            }
            Self::SettingsError { file_name, err } => {
                tracing::error!(
                    "settings file `{}` couldn't be applied",
                    file_name.style(styles.bold),
                );
                Some(err as &dyn Error)
            }
            Self::UnlinkError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::BridgeError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::RuntimeBuildError { err } => {
                tracing::error!("failed to start the async runtime");
                Some(err as &dyn Error)
            }
            Self::WriteOutputError { err } => {
                tracing::error!("error writing output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            tracing::error!(
                "{} {}",
                "caused by:".style(styles.warning_text),
                err.to_string().lines().join("\n  ")
            );
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let err = ExpectedError::transcript_parse_error(
            "session.jsonl",
            3,
            serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        );
        assert_eq!(err.process_exit_code(), BridgeExitCode::INPUT_ERROR);

        let err = ExpectedError::from(BridgeError::UnsupportedOperation {
            operation: "cancel",
        });
        assert_eq!(err.process_exit_code(), BridgeExitCode::CHANNEL_ERROR);

        let err = ExpectedError::write_output_error(std::io::ErrorKind::BrokenPipe.into());
        assert_eq!(err.process_exit_code(), BridgeExitCode::WRITE_OUTPUT_ERROR);
    }
}
