// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::Result;
use phpunit_bridge::{
    config::UnlinkPolicy,
    resolver::{ExecutableResolver, Platform, UnlinkOutcome},
};
use std::time::Duration;

fn policy() -> UnlinkPolicy {
    UnlinkPolicy {
        max_attempts: 3,
        interval: Duration::from_millis(10),
    }
}

#[test]
fn finds_existing_file_by_path() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let script = dir.path().join("phpunit");
    fs_err::write(&script, "#!/bin/sh\n")?;

    let resolver = ExecutableResolver::new(policy());
    if resolver.platform() == Platform::Windows {
        // Extension probing for bare names is covered by unit tests.
        return Ok(());
    }

    assert_eq!(resolver.find(script.as_str()), script.as_str());
    assert!(resolver.exists(script.as_str()));
    Ok(())
}

#[cfg(unix)]
#[test]
fn finds_executable_on_path() {
    let resolver = ExecutableResolver::new(policy());
    let found = resolver.find("sh");
    assert!(found.ends_with("/sh"), "unexpected path: {found:?}");
    // Served from the cache the second time.
    assert_eq!(resolver.find("sh"), found);
}

#[test]
fn missing_executable_resolves_to_empty() {
    let resolver = ExecutableResolver::new(policy());
    assert_eq!(resolver.find("phpunit-bridge-definitely-missing"), "");
    assert!(!resolver.exists("phpunit-bridge-definitely-missing"));
}

#[tokio::test]
async fn unlink_removes_file() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let report = dir.path().join("junit.xml");
    fs_err::write(&report, "<testsuites/>")?;

    let resolver = ExecutableResolver::new(policy());
    assert_eq!(
        resolver.unlink(&report).await?,
        UnlinkOutcome::Removed { attempts: 1 }
    );
    assert!(!report.exists());
    assert_eq!(resolver.unlink(&report).await?, UnlinkOutcome::NotPresent);
    Ok(())
}
