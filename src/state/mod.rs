//! Persistent state
//!
//! This module handles everything that outlives a sync pass:
//! - Record store of processed assets (library.rs)
//! - Blob archive of processed sprites (blob.rs)
//! - Shared data structures (data.rs)

pub mod blob;
pub mod data;
pub mod library;
