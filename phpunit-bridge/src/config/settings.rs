// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::SettingsError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// A source of workspace-scoped settings, such as the editor's settings store.
pub trait SettingsSource {
    /// Fetches the settings section `section` for the workspace identified by `scope_uri`.
    fn configuration(
        &self,
        scope_uri: &str,
        section: &str,
    ) -> impl Future<Output = Result<Value, SettingsError>> + Send;
}

/// A static JSON object of sections, keyed by section name. The scope is ignored.
impl SettingsSource for Value {
    fn configuration(
        &self,
        _scope_uri: &str,
        section: &str,
    ) -> impl Future<Output = Result<Value, SettingsError>> + Send {
        let value = self.get(section).cloned().unwrap_or(Value::Null);
        std::future::ready(Ok(value))
    }
}

/// PHPUnit settings for a workspace.
///
/// Values start out as the defaults and are replaced wholesale by [`Configuration::update`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default = "default_max_number_of_problems")]
    max_number_of_problems: u32,
    #[serde(default = "default_files")]
    files: String,
    #[serde(default)]
    relative_file_path: bool,
    #[serde(default)]
    remote_cwd: String,
    #[serde(default)]
    shell: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    php: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phpunit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    docker: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    docker_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    docker_command: Option<String>,
}

fn default_max_number_of_problems() -> u32 {
    10000
}

fn default_files() -> String {
    "**/*.php".to_owned()
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            max_number_of_problems: default_max_number_of_problems(),
            files: default_files(),
            relative_file_path: false,
            remote_cwd: String::new(),
            shell: String::new(),
            php: None,
            phpunit: None,
            args: None,
            docker: None,
            docker_image: None,
            docker_command: None,
        }
    }
}

impl Configuration {
    /// The settings section holding PHPUnit settings.
    pub const SECTION: &'static str = "phpunit";

    /// Refreshes settings from `source` for the workspace at `scope_uri`.
    ///
    /// If `configuration_capability` is false, the source is not consulted and the current
    /// values are kept. A null or missing section resets every setting to its default.
    pub async fn update<S: SettingsSource>(
        &mut self,
        source: &S,
        scope_uri: &str,
        configuration_capability: bool,
    ) -> Result<&mut Self, SettingsError> {
        if !configuration_capability {
            return Ok(self);
        }

        let value = source.configuration(scope_uri, Self::SECTION).await?;
        let value = match value {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        *self = serde_path_to_error::deserialize(value).map_err(|err| {
            SettingsError::Deserialize {
                section: Self::SECTION.to_owned(),
                err,
            }
        })?;
        Ok(self)
    }

    /// The maximum number of problems reported per file.
    pub fn max_number_of_problems(&self) -> u32 {
        self.max_number_of_problems
    }

    /// The glob of test files.
    pub fn files(&self) -> &str {
        &self.files
    }

    /// Whether to pass file paths relative to the workspace.
    pub fn relative_file_path(&self) -> bool {
        self.relative_file_path
    }

    /// The working directory on the remote (e.g. inside a container).
    pub fn remote_cwd(&self) -> &str {
        &self.remote_cwd
    }

    /// The shell used to run commands, if not the default.
    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// The PHP binary to use.
    pub fn php(&self) -> Option<&str> {
        self.php.as_deref()
    }

    /// The PHPUnit binary to use.
    pub fn phpunit(&self) -> Option<&str> {
        self.phpunit.as_deref()
    }

    /// Extra arguments passed to PHPUnit.
    pub fn args(&self) -> Option<&[String]> {
        self.args.as_deref()
    }

    /// Whether to run PHPUnit inside Docker.
    pub fn docker(&self) -> Option<bool> {
        self.docker
    }

    /// The Docker image to run PHPUnit in.
    pub fn docker_image(&self) -> Option<&str> {
        self.docker_image.as_deref()
    }

    /// The Docker command to use.
    pub fn docker_command(&self) -> Option<&str> {
        self.docker_command.as_deref()
    }
}
