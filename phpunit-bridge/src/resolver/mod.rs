// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Locating executables on the host, and deleting stale artifacts.
//!
//! The [`ExecutableResolver`] finds commands such as `php` or `phpunit` by name, memoizing
//! successful lookups. How a name is looked up depends on the [`Platform`]: Windows tries a fixed
//! list of extensions and `where`, everything else uses the name as-is and `which`.

mod platform;
mod probe;

pub use platform::*;
pub use probe::*;

use crate::{config::UnlinkPolicy, errors::UnlinkError};
use camino::Utf8Path;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::debug;

type CacheSlot = Arc<Mutex<Option<String>>>;

/// Locates executables by name and caches the answers.
///
/// Only successful lookups are cached: a miss is retried on every call, since a tool may become
/// available later. Concurrent first-time lookups of the same key run the probe once, while
/// lookups of distinct keys proceed independently.
#[derive(Debug)]
pub struct ExecutableResolver<P = SystemProbe> {
    platform: Platform,
    probe: P,
    unlink_policy: UnlinkPolicy,
    cache: Mutex<HashMap<String, CacheSlot>>,
}

impl ExecutableResolver<SystemProbe> {
    /// Creates a resolver for the current host.
    pub fn new(unlink_policy: UnlinkPolicy) -> Self {
        Self::with_probe(Platform::current(), SystemProbe, unlink_policy)
    }
}

impl<P: HostProbe> ExecutableResolver<P> {
    /// Creates a resolver for the given platform, backed by the given probe.
    pub fn with_probe(platform: Platform, probe: P, unlink_policy: UnlinkPolicy) -> Self {
        Self {
            platform,
            probe,
            unlink_policy,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The platform this resolver was created for.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The probe backing this resolver.
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Finds an executable by name, returning its path.
    ///
    /// Returns an empty string if the executable could not be found. This is a normal outcome,
    /// not an error.
    pub fn find(&self, name: &str) -> String {
        self.cached(name.to_owned(), || {
            let found = match self.platform {
                Platform::Windows => self.find_windows(name),
                Platform::Posix => self.find_posix(name),
            };
            (!found.is_empty()).then_some(found)
        })
        .unwrap_or_default()
    }

    /// Returns true if the given path exists, trying each platform extension in turn.
    pub fn exists(&self, name: &str) -> bool {
        self.cached(format!("{name}-exists"), || {
            self.platform
                .extensions()
                .iter()
                .any(|extension| self.probe.exists(&format!("{name}{extension}")))
                .then(|| name.to_owned())
        })
        .is_some()
    }

    /// Deletes a file, waiting for it to be unlocked if necessary.
    ///
    /// If the file doesn't exist, this returns [`UnlinkOutcome::NotPresent`]. If the file exists
    /// but is locked, or checking it fails, the deletion is retried every
    /// [`UnlinkPolicy::interval`] until [`UnlinkPolicy::max_attempts`] attempts have been made,
    /// after which [`UnlinkError::DeletionTimeout`] is returned.
    pub async fn unlink(&self, path: &Utf8Path) -> Result<UnlinkOutcome, UnlinkError> {
        let max_attempts = self.unlink_policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.probe.file_status(path) {
                Ok(FileStatus::Missing) => return Ok(UnlinkOutcome::NotPresent),
                Ok(FileStatus::Accessible) => match self.probe.remove_file(path) {
                    Ok(()) => {
                        debug!(%path, attempt, "removed file");
                        return Ok(UnlinkOutcome::Removed { attempts: attempt });
                    }
                    Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                        return Ok(UnlinkOutcome::NotPresent);
                    }
                    Err(error) => {
                        debug!(%path, attempt, %error, "removing file failed");
                        last_error = Some(error);
                    }
                },
                Ok(FileStatus::Locked) => {
                    debug!(%path, attempt, "file is locked");
                    last_error = None;
                }
                Err(error) => {
                    debug!(%path, attempt, %error, "checking file failed");
                    last_error = Some(error);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.unlink_policy.interval).await;
            }
        }

        Err(UnlinkError::DeletionTimeout {
            path: path.to_owned(),
            attempts: max_attempts,
            last_error,
        })
    }

    // ---
    // Helper methods
    // ---

    fn find_posix(&self, name: &str) -> String {
        if self.probe.exists(name) {
            return self.probe.absolute(name);
        }

        self.probe
            .locate(self.platform.locator(), name)
            .map(|output| normalize_output(&output))
            .unwrap_or_default()
    }

    fn find_windows(&self, name: &str) -> String {
        let extensions = self.platform.extensions();

        for extension in extensions {
            let candidate = format!("{name}{extension}");
            if self.probe.exists(&candidate) {
                return self.probe.absolute(&candidate);
            }
        }

        for extension in extensions {
            let candidate = format!("{name}{extension}");
            if let Some(output) = self.probe.locate(self.platform.locator(), &candidate) {
                let found = normalize_output(&output);
                if !found.is_empty() {
                    return found;
                }
            }
        }

        String::new()
    }

    fn cached(&self, key: String, lookup: impl FnOnce() -> Option<String>) -> Option<String> {
        let slot = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache.entry(key.clone()).or_default().clone()
        };

        // Holding the slot lock while probing serializes lookups of this key only.
        let mut value = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = &*value {
            debug!(key, hit, "resolver cache hit");
            return Some(hit.clone());
        }

        let found = lookup();
        match &found {
            Some(found) => {
                debug!(key, found, "resolved");
                *value = Some(found.clone());
            }
            None => {
                debug!(key, "not found, will retry on next lookup");
                drop(value);
                self.evict_empty(&key, &slot);
            }
        }
        found
    }

    /// Removes `key` if it still maps to `slot` and nothing was stored in it.
    fn evict_empty(&self, key: &str, slot: &CacheSlot) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = cache.get(key) else {
            return;
        };
        if !Arc::ptr_eq(current, slot) {
            return;
        }
        // A concurrent lookup of the same key may hold the slot; leave it to that lookup.
        let is_empty = match current.try_lock() {
            Ok(value) => value.is_none(),
            Err(_) => false,
        };
        if is_empty {
            cache.remove(key);
        }
    }

    #[cfg(test)]
    fn cache_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// The result of a successful [`ExecutableResolver::unlink`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnlinkOutcome {
    /// The file was removed.
    Removed {
        /// The number of attempts it took, starting from 1.
        attempts: u32,
    },

    /// There was no file to remove.
    NotPresent,
}
