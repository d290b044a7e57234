//! Fixture resolution for tests and examples.
//!
//! Annotation fixtures live under the repository-level `fixtures/` directory.
//! Tests locate it by walking up from the crate manifest directory, and the
//! `CEPHNET_FIXTURE_ROOT` environment variable overrides the search for
//! checkouts with a nonstandard layout.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

const ROOT_OVERRIDE: &str = "CEPHNET_FIXTURE_ROOT";

/// Locate the repository fixture directory.
pub fn fixtures_dir() -> Result<PathBuf> {
    if let Some(root) = env::var_os(ROOT_OVERRIDE) {
        let root = PathBuf::from(root);
        anyhow::ensure!(
            root.is_dir(),
            "{ROOT_OVERRIDE} does not point at a directory: {}",
            root.display()
        );
        return Ok(root);
    }

    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest
        .ancestors()
        .map(|dir| dir.join("fixtures"))
        .find(|candidate| candidate.is_dir())
        .with_context(|| format!("no fixtures directory above {}", manifest.display()))
}

/// Resolve a file under the fixture directory, erroring when absent.
///
/// # Arguments
///
/// * `relative` - A relative path to a file within the `fixtures` directory.
pub fn fixture_path<P: AsRef<Path>>(relative: P) -> Result<PathBuf> {
    let full = fixtures_dir()?.join(relative.as_ref());
    anyhow::ensure!(full.exists(), "missing fixture {}", full.display());
    Ok(full)
}

/// Read and deserialize a JSON fixture.
///
/// # Arguments
///
/// * `relative` - A relative path to a JSON file within the `fixtures` directory.
pub fn load_fixture_json<P, T>(relative: P) -> Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let path = fixture_path(relative)?;
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read JSON fixture {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse JSON fixture {}", path.display()))
}
