//! Apply structured change-sets to a git working tree and verify requirements.
//!
//! An external collaborator (typically an LLM agent loop) describes edits as
//! a [`ChangeBatch`](core::types::ChangeBatch) of patches and file/directory
//! actions. This crate renders patches as unified diffs, applies everything
//! through `git`, commits, and checks a
//! [`Requirement`](core::types::Requirement) by running shell commands.
//!
//! - **[`core`]**: Pure logic (types, diff rendering, path and pipeline rules).
//! - **[`io`]**: Process execution, the git-backed [`Repo`](io::repo::Repo)
//!   adapter, configuration and JSON loading.
//!
//! [`apply`], [`verify`] and [`round`] combine the two into the operations the
//! CLI exposes.

pub mod apply;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod round;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod verify;
