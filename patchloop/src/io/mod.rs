//! Side-effecting adapters: processes, git, configuration and wire loading.

pub mod config;
pub mod process;
pub mod repo;
pub mod shell;
pub mod wire;
