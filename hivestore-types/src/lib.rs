//! Core type definitions for Hivestore.
//!
//! This crate defines the fundamental types shared by the store and sync
//! layers:
//! - Object identifiers (UUID v7) and their external URI form
//! - Change records (identifiers grouped by operation kind)
//!
//! Everything domain-specific (what an object's payload means, how it is
//! rendered) belongs to the application, not here.

mod ids;
mod record;

pub use ids::{ObjectId, OBJECT_URI_SCHEME};
pub use record::ChangeRecord;
