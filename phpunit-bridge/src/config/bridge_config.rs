// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::{Deserialize, de::IntoDeserializer};
use std::{collections::BTreeSet, fmt, time::Duration};

/// Runtime configuration for the session bridge and the executable resolver.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BridgeConfig {
    ready_timeout: Option<Duration>,
    unlink: UnlinkPolicy,
}

impl BridgeConfig {
    /// The default location of the config within a workspace.
    pub const CONFIG_PATH: &'static str = ".config/phpunit-bridge.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Reads the config from the given file, or from [`Self::CONFIG_PATH`] under
    /// `workspace_root` if `config_file` is `None`.
    ///
    /// An explicitly provided file must exist; the default location is optional. Unknown keys
    /// are passed to `unknown_callback`.
    pub fn from_sources(
        workspace_root: &Utf8Path,
        config_file: Option<&Utf8Path>,
        mut unknown_callback: impl FnMut(&Utf8Path, &BTreeSet<String>),
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (config, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            unknown_callback(&config_file, &unknown);
        }

        Ok(config.into_config())
    }

    /// Reads the config from a TOML string layered over the defaults.
    pub fn from_toml_str(
        contents: &str,
        mut unknown_callback: impl FnMut(&Utf8Path, &BTreeSet<String>),
    ) -> Result<Self, ConfigParseError> {
        let config_file = Utf8PathBuf::from("<inline>");
        let builder =
            Self::make_default_config().add_source(File::from_str(contents, FileFormat::Toml));
        let (config, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            unknown_callback(&config_file, &unknown);
        }

        Ok(config.into_config())
    }

    /// Returns the default config.
    pub fn default_config() -> Self {
        let (config, _) = Self::build_and_deserialize_config(&Self::make_default_config())
            .unwrap_or_else(|err| panic!("default config is always valid: {err}"));
        config.into_config()
    }

    /// How long to wait for the channel to become ready. `None` means no limit.
    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout
    }

    /// The retry policy for deleting locked files.
    pub fn unlink(&self) -> UnlinkPolicy {
        self.unlink
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(BridgeConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: BridgeConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // The config crate also reports the key. Drop it, since
                // serde_path_to_error already tracks the path.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

/// The retry policy for [`ExecutableResolver::unlink`](crate::resolver::ExecutableResolver::unlink).
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct UnlinkPolicy {
    /// The maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// The delay between attempts.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for UnlinkPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct BridgeConfigDeserialize {
    #[serde(deserialize_with = "deserialize_ready_timeout")]
    ready_timeout: Option<Duration>,
    unlink: UnlinkPolicy,
}

impl BridgeConfigDeserialize {
    fn into_config(self) -> BridgeConfig {
        BridgeConfig {
            ready_timeout: self.ready_timeout,
            unlink: self.unlink,
        }
    }
}

fn deserialize_ready_timeout<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct V;

    impl<'de2> serde::de::Visitor<'de2> for V {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a duration (\"30s\") or \"none\"")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if v == "none" {
                return Ok(None);
            }
            let timeout: Duration = humantime_serde::deserialize(v.into_deserializer())?;
            if timeout.is_zero() {
                return Err(serde::de::Error::custom(
                    "`ready-timeout` cannot be zero (use \"none\" to disable it)",
                ));
            }
            Ok(Some(timeout))
        }
    }

    deserializer.deserialize_str(V)
}
