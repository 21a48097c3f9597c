//! Thin Firestore client with path references and dual-mode auth.
//!
//! This crate provides:
//! - Collection/document reference navigation over a Firestore database
//! - Terminal `get`/`set`/`delete` operations via the Firestore REST API
//! - Service-account (admin) auth via `gcp_auth` with token caching
//! - API-key auth with optional per-call Firebase user ID tokens
//! - Typed wire values translated to and from plain JSON mappings
//!
//! ```no_run
//! use firestore_lite::{Firestore, FirestoreConfig};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), firestore_lite::FirestoreError> {
//! let db = Firestore::with_api_key(FirestoreConfig::new("my-project"), "web-api-key")?;
//!
//! let alice = db.collection("users").document("alice");
//! alice.set(json!({"name": "Alice"}).as_object().unwrap(), None).await?;
//! let data = alice.get(None, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod metrics;
pub mod path;
pub mod refs;
pub mod token_cache;
pub mod types;

pub use client::{Firestore, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use refs::{CollectionReference, DocumentReference};
pub use types::Value;
