// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The result index: the latest test messages, addressable by source file and by outcome state.
//!
//! The index is keyed by a normalized form of each message's file name (see
//! [`normalize_file_key`]), so that the same logical path matches whether or not it was reported
//! with a drive letter. Each key holds exactly the most recent batch put for that file.

use indexmap::IndexMap;
use phpunit_metadata::{Message, TestOutcomeState};
use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// An in-memory index of test messages, grouped by source file.
#[derive(Clone, Debug, Default)]
pub struct ResultIndex {
    items: IndexMap<String, Vec<Message>>,
}

impl ResultIndex {
    /// Creates a new index seeded with the given messages.
    pub fn new(messages: impl IntoIterator<Item = Message>) -> Self {
        let mut index = Self::default();
        index.put(messages);
        index
    }

    /// Puts a batch of messages into the index.
    ///
    /// Messages are grouped by normalized file name, preserving their relative order. For each
    /// file in the batch, the stored messages are replaced wholesale: the previous batch for that
    /// file is discarded, not merged. Files not mentioned in this batch are left alone.
    pub fn put(&mut self, messages: impl IntoIterator<Item = Message>) -> &mut Self {
        let mut groups: IndexMap<String, Vec<Message>> = IndexMap::new();
        for message in messages {
            groups
                .entry(normalize_file_key(message.file_name()).to_owned())
                .or_default()
                .push(message);
        }

        for (key, messages) in groups {
            // IndexMap::insert keeps the original position of an existing key.
            self.items.insert(key, messages);
        }

        self
    }

    /// Returns the normalized file keys currently present, in first-insertion order.
    pub fn keys(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.items.keys().map(String::as_str)
    }

    /// Returns true if messages are stored for this file.
    pub fn has(&self, file_name: &str) -> bool {
        self.items.contains_key(normalize_file_key(file_name))
    }

    /// Returns the messages stored for this file, if any.
    pub fn get(&self, file_name: &str) -> Option<&[Message]> {
        self.items
            .get(normalize_file_key(file_name))
            .map(Vec::as_slice)
    }

    /// Returns the messages stored for this file, grouped by outcome state.
    ///
    /// Every [`TestOutcomeState`] is present as a key, with an empty bucket if no message is in
    /// that state. A file that isn't indexed produces all-empty buckets.
    pub fn get_by_state(&self, file_name: &str) -> BTreeMap<TestOutcomeState, Vec<Message>> {
        let mut buckets: BTreeMap<_, _> = TestOutcomeState::ALL
            .into_iter()
            .map(|state| (state, Vec::new()))
            .collect();

        for message in self.get(file_name).unwrap_or_default() {
            buckets
                .entry(message.state())
                .or_default()
                .push(message.clone());
        }

        buckets
    }

    /// Calls `f` with each file's messages and its normalized key, in insertion order.
    pub fn for_each(&self, mut f: impl FnMut(&[Message], &str)) {
        for (key, messages) in &self.items {
            f(messages, key);
        }
    }

    /// Iterates over `(key, messages)` pairs in insertion order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &[Message])> + '_ {
        self.items
            .iter()
            .map(|(key, messages)| (key.as_str(), messages.as_slice()))
    }

    /// Returns the number of files indexed.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no files are indexed.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Removes every entry. The index can be used again afterwards.
    pub fn dispose(&mut self) {
        self.items.clear();
    }
}

/// Normalizes a file name into an index key by stripping a leading drive prefix such as `C:`.
///
/// A drive prefix is a single word character (ASCII letter, digit or underscore) followed by a
/// colon. Normalization is idempotent.
pub fn normalize_file_key(file_name: &str) -> &str {
    let bytes = file_name.as_bytes();
    match bytes {
        [drive, b':', ..] if drive.is_ascii_alphanumeric() || *drive == b'_' => &file_name[2..],
        _ => file_name,
    }
}

/// A result index shared between the session bridge, which writes to it, and any number of
/// readers.
#[derive(Clone, Debug, Default)]
pub struct SharedResultIndex {
    inner: Arc<RwLock<ResultIndex>>,
}

impl SharedResultIndex {
    /// Wraps an existing index.
    pub fn new(index: ResultIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    /// Returns a read-only view of this index.
    pub fn view(&self) -> ResultIndexView {
        ResultIndexView {
            inner: self.inner.clone(),
        }
    }

    /// Acquires a read guard.
    pub fn read(&self) -> RwLockReadGuard<'_, ResultIndex> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, ResultIndex> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears the index.
    pub fn dispose(&self) {
        self.write().dispose();
    }
}

/// A read-only handle to a [`SharedResultIndex`].
///
/// Views are handed out to external callers so that only the session bridge can mutate the
/// index.
#[derive(Clone, Debug)]
pub struct ResultIndexView {
    inner: Arc<RwLock<ResultIndex>>,
}

impl ResultIndexView {
    /// Acquires a read guard.
    ///
    /// Each batch is applied under a single write lock, so a guard never observes a partially
    /// applied batch.
    pub fn read(&self) -> RwLockReadGuard<'_, ResultIndex> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}
