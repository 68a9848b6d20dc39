//! Validation of repository-relative paths supplied by the collaborator.

use std::ffi::OsStr;
use std::path::{Component, Path};

/// Check that `raw` names something strictly inside the working tree.
///
/// Returns the reason on failure. `.` components are tolerated; `..`, roots
/// and drive prefixes are not, and neither is the `.git` directory.
pub fn check_relative(raw: &str) -> Result<&Path, String> {
    if raw.trim().is_empty() {
        return Err("path is empty".to_string());
    }
    let path = Path::new(raw);
    let mut normal = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                if normal == 0 && part == OsStr::new(".git") {
                    return Err("path points into the .git directory".to_string());
                }
                normal += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => return Err("path must not contain '..'".to_string()),
            Component::RootDir | Component::Prefix(_) => {
                return Err("path must be relative to the repository root".to_string());
            }
        }
    }
    if normal == 0 {
        return Err("path does not name anything below the repository root".to_string());
    }
    Ok(path)
}
