//! Deterministic, pure logic: change-set model, patch rendering, path and
//! pipeline rules.
//!
//! Nothing in here touches the filesystem or spawns processes.

pub mod diff_range;
pub mod manifest;
pub mod patch;
pub mod pipeline;
pub mod rel_path;
pub mod types;
