//! Sprite image pipeline
//!
//! This module handles:
//! - The two-color reference palette (palette.rs)
//! - Color counting, shrinking, remapping and strip composition (transform.rs)
//! - Per-asset download, convert and upload (processor.rs)
//! - The composite strip for a whole pass (composite.rs)

pub mod composite;
pub mod palette;
pub mod processor;
pub mod transform;
