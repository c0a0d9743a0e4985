//! Core traits for the audit system
//!
//! - [`DocumentStore`]: Narrow read/write contract of the backing document database
//! - [`SaveHook`](crate::hooks::SaveHook) lives with the dispatcher in [`crate::hooks`]

pub mod document_store;

pub use document_store::{DOCUMENT_ID_KEY, DocumentStore, Filter, Record};
