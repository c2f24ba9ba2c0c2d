//! Larold catalog sync
//!
//! Reconciles the curated Larold catalog with a record store and blob
//! archive, normalizing each sprite into two-tone pixel art, and packages the
//! result as a zip of `larolds.json` plus a composite strip.

pub mod archive;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod scratch;
pub mod source;
pub mod sprite;
pub mod state;
pub mod sync;
pub mod trigger;

pub use error::{Result, SyncError};
pub use sync::{Collaborators, SyncOrchestrator};
