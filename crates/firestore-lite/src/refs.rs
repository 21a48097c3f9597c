//! Collection and document references.
//!
//! References are immutable path builders: each navigation call returns a
//! new reference whose segment vector is the parent's plus one segment.
//! Nothing is shared mutably, so a reference stays valid across any number
//! of terminal operations.

use std::sync::Arc;

use serde_json::Map;

use crate::client::ClientInner;
use crate::error::{FirestoreError, FirestoreResult};
use crate::path::{resolve, ResolvedTarget};

// =============================================================================
// Collection Reference
// =============================================================================

/// Reference to a collection (odd number of path segments).
#[derive(Clone)]
pub struct CollectionReference {
    inner: Arc<ClientInner>,
    path: Vec<String>,
}

impl CollectionReference {
    pub(crate) fn new(inner: Arc<ClientInner>, path: Vec<String>) -> Self {
        Self { inner, path }
    }

    /// Collection ID (last path segment).
    pub fn id(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// Slash-joined path relative to the database's documents root.
    pub fn path(&self) -> String {
        self.path.join("/")
    }

    /// Get a reference to a document in this collection. No I/O, and no
    /// validation of the id; a malformed id fails at the transport layer.
    pub fn document(&self, document_id: impl Into<String>) -> DocumentReference {
        let mut path = self.path.clone();
        path.push(document_id.into());
        DocumentReference {
            inner: Arc::clone(&self.inner),
            path,
        }
    }
}

impl std::fmt::Debug for CollectionReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionReference")
            .field("path", &self.path())
            .finish()
    }
}

// =============================================================================
// Document Reference
// =============================================================================

/// Reference to a document (even number of path segments).
#[derive(Clone)]
pub struct DocumentReference {
    inner: Arc<ClientInner>,
    path: Vec<String>,
}

impl DocumentReference {
    /// Document ID (last path segment).
    pub fn id(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// Slash-joined path relative to the database's documents root.
    pub fn path(&self) -> String {
        self.path.join("/")
    }

    /// Get a reference to a subcollection of this document. No I/O.
    pub fn collection(&self, collection_id: impl Into<String>) -> CollectionReference {
        let mut path = self.path.clone();
        path.push(collection_id.into());
        CollectionReference::new(Arc::clone(&self.inner), path)
    }

    /// Resolve the segment alternation into this document's resource path.
    fn resource_path(&self) -> FirestoreResult<String> {
        match resolve(self.path.clone().into())? {
            ResolvedTarget::Document(path) => Ok(path),
            ResolvedTarget::Collection(path) => Err(FirestoreError::invalid_path(format!(
                "{} names a collection, not a document",
                path
            ))),
        }
    }

    /// Read the document, returning its fields as a plain mapping.
    ///
    /// `field_paths` limits the read to the given dot-delimited field
    /// paths; `token` is a Firebase user ID token (API-key mode only).
    /// A missing document is a [`FirestoreError::NotFound`].
    pub async fn get(
        &self,
        field_paths: Option<&[&str]>,
        token: Option<&str>,
    ) -> FirestoreResult<Map<String, serde_json::Value>> {
        let path = self.resource_path()?;
        self.inner.get_document(&path, field_paths, token).await
    }

    /// Write the document, overwriting any existing content. No merge.
    pub async fn set(
        &self,
        data: &Map<String, serde_json::Value>,
        token: Option<&str>,
    ) -> FirestoreResult<()> {
        let path = self.resource_path()?;
        self.inner.set_document(&path, data, token).await
    }

    /// Delete the document.
    pub async fn delete(&self, token: Option<&str>) -> FirestoreResult<()> {
        let path = self.resource_path()?;
        self.inner.delete_document(&path, token).await
    }
}

impl std::fmt::Debug for DocumentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentReference")
            .field("path", &self.path())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::client::{Firestore, FirestoreConfig};

    fn db() -> Firestore {
        Firestore::with_api_key(FirestoreConfig::new("test-project"), "key").unwrap()
    }

    #[test]
    fn test_chained_navigation_accumulates_path() {
        let posts = db().collection("users").document("alice").collection("posts");
        assert_eq!(posts.path(), "users/alice/posts");
        assert_eq!(posts.id(), "posts");
    }

    #[test]
    fn test_navigation_does_not_mutate_parent() {
        let db = db();
        let users = db.collection("users");
        let alice = users.document("alice");
        let bob = users.document("bob");

        assert_eq!(users.path(), "users");
        assert_eq!(alice.path(), "users/alice");
        assert_eq!(bob.path(), "users/bob");
    }

    #[test]
    fn test_deep_nesting_alternates_kinds() {
        let deep = db()
            .collection("a")
            .document("b")
            .collection("c")
            .document("d");
        assert_eq!(deep.path(), "a/b/c/d");
        assert_eq!(deep.id(), "d");
    }

    #[test]
    fn test_empty_document_id_passes_through() {
        let doc = db().collection("users").document("");
        assert_eq!(doc.path(), "users/");
    }
}
