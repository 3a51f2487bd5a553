// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use regex::Regex;
use std::sync::LazyLock;

/// The host OS family, as far as executable lookup is concerned.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Platform {
    /// Windows, including Cygwin and MinGW environments: executables are looked up with a fixed
    /// list of extensions and `where`.
    Windows,

    /// Everything else: executables are looked up as-is and with `which`.
    Posix,
}

static WINDOWS_PLATFORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(?i)win32|mswin|mingw|bccwin|cygwin").expect("platform regex is valid")
});

impl Platform {
    /// Detects the platform from an identifier such as `win32`, `x64-mingw32` or `linux`.
    ///
    /// Matching is case-insensitive and looks for `win32`, `mswin`, `mingw`, `bccwin` or `cygwin`
    /// anywhere in the identifier. `mswince` (Windows CE) does not count as Windows.
    pub fn from_identifier(identifier: &str) -> Self {
        let is_windows = WINDOWS_PLATFORM.find_iter(identifier).any(|m| {
            // The regex crate has no lookahead, so reject "mswin" followed by "ce" here.
            !(m.as_str().eq_ignore_ascii_case("mswin")
                && identifier[m.end()..]
                    .get(..2)
                    .is_some_and(|next| next.eq_ignore_ascii_case("ce")))
        });

        if is_windows {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    /// Detects the platform of the host this binary was built for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::from_identifier("win32")
        } else {
            Self::from_identifier(std::env::consts::OS)
        }
    }

    /// The extensions tried, in order, when looking up an executable on this platform.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Windows => &[".bat", ".exe", ".cmd", ""],
            Self::Posix => &[""],
        }
    }

    /// The command used to locate executables on the `PATH`.
    pub fn locator(self) -> &'static str {
        match self {
            Self::Windows => "where",
            Self::Posix => "which",
        }
    }

    /// Returns true if this is [`Platform::Windows`].
    pub fn is_windows(self) -> bool {
        matches!(self, Self::Windows)
    }
}
