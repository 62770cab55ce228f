//! Test helpers for the photon counter workspace
//!
//! Locates the workspace root and hands out scratch directories under
//! `test_output/` for tests that write CSV streams or library files.

use once_cell::sync::Lazy;
use std::env;
use std::path::{Path, PathBuf};

/// Error type for test helper operations
#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    #[error("Failed to find workspace root: {0}")]
    WorkspaceRootNotFound(String),

    #[error("Failed to prepare scratch directory {path}: {source}")]
    Scratch {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Returns the path to the workspace root directory.
///
/// Walks up from the current directory until a `Cargo.toml` declaring
/// `[workspace]` is found.
pub fn find_workspace_root() -> Result<PathBuf, TestHelperError> {
    let mut current_dir = env::current_dir().map_err(|e| {
        TestHelperError::WorkspaceRootNotFound(format!("Failed to get current directory: {e}"))
    })?;

    loop {
        let cargo_toml = current_dir.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = std::fs::read_to_string(&cargo_toml).map_err(|e| {
                TestHelperError::WorkspaceRootNotFound(format!("Failed to read Cargo.toml: {e}"))
            })?;

            if content.contains("[workspace]") {
                return Ok(current_dir);
            }
        }

        if !current_dir.pop() {
            break;
        }
    }

    Err(TestHelperError::WorkspaceRootNotFound(
        "Workspace root not found".to_string(),
    ))
}

static WORKSPACE_ROOT: Lazy<PathBuf> =
    Lazy::new(|| find_workspace_root().expect("Failed to find workspace root directory"));

/// Returns `<workspace>/test_output`, creating it if needed.
pub fn get_output_dir() -> PathBuf {
    let output_dir = WORKSPACE_ROOT.join("test_output");

    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir).expect("Failed to create output directory");
    }

    output_dir
}

/// Returns a path within the output directory.
pub fn output_path<P: AsRef<Path>>(path: P) -> PathBuf {
    get_output_dir().join(path)
}

/// Returns an empty directory dedicated to one test.
///
/// Any leftovers from a previous run of the same test are removed first so
/// that assertions on written files only see this run's output.
pub fn scratch_dir(test_name: &str) -> Result<PathBuf, TestHelperError> {
    let path = output_path(test_name);
    if path.exists() {
        std::fs::remove_dir_all(&path).map_err(|source| TestHelperError::Scratch {
            path: path.clone(),
            source,
        })?;
    }
    std::fs::create_dir_all(&path).map_err(|source| TestHelperError::Scratch {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
