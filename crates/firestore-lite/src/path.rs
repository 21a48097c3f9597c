//! Path-segment resolution.
//!
//! A reference path is an alternating sequence of collection and document
//! ids: `["users", "alice", "posts"]` names a collection, one more segment
//! names a document. Resolution walks that alternation once and yields the
//! typed target together with its slash-joined resource path relative to
//! the database's `documents` root.

use std::collections::VecDeque;

use crate::error::{FirestoreError, FirestoreResult};

/// A resolved reference target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// Odd number of segments: a collection.
    Collection(String),
    /// Even number of segments: a document.
    Document(String),
}

impl ResolvedTarget {
    /// The slash-joined resource path, whatever the target kind.
    pub fn resource_path(&self) -> &str {
        match self {
            Self::Collection(path) | Self::Document(path) => path,
        }
    }
}

/// Resolve a flat segment sequence into a typed reference target.
///
/// Performs `ceil(L/2)` collection descents and `floor(L/2)` document
/// descents, consuming the queue completely. Either parity is accepted;
/// an empty sequence is an error.
pub fn resolve(mut segments: VecDeque<String>) -> FirestoreResult<ResolvedTarget> {
    if segments.is_empty() {
        return Err(FirestoreError::invalid_path("empty path"));
    }

    let rounds = segments.len().div_ceil(2);
    let mut parts: Vec<String> = Vec::with_capacity(segments.len());
    let mut target_is_document = false;

    for _ in 0..rounds {
        // Collection descent.
        parts.push(segments.pop_front().expect("segment available"));
        target_is_document = false;

        // Document descent, if a segment remains.
        if let Some(doc_id) = segments.pop_front() {
            parts.push(doc_id);
            target_is_document = true;
        }
    }

    debug_assert!(segments.is_empty());

    let path = parts.join("/");
    if target_is_document {
        Ok(ResolvedTarget::Document(path))
    } else {
        Ok(ResolvedTarget::Collection(path))
    }
}
