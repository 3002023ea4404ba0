//! Project detection.
//!
//! The engine asks a [`ProjectProvider`] which project the user is in when
//! an activation does not name one. [`MarkerProvider`] walks up from a
//! directory looking for project markers; [`FixedProvider`] always answers
//! the same.

use std::path::{Path, PathBuf};

/// Reserved project identifier for global, non-project sessions.
pub const GLOBAL_PROJECT: &str = "-";

/// Maximum depth to walk up when searching for a project root.
pub const MAX_SEARCH_DEPTH: usize = 20;

/// Files or directories marking a project root, checked at every level.
pub const PROJECT_MARKERS: &[&str] = &[
    ".keyshell",
    ".projectile",
    ".git",
    ".hg",
    "Cargo.toml",
    "package.json",
    "go.mod",
    "pyproject.toml",
    "Makefile",
];

/// Supplies the ambient project when an activation does not name one.
pub trait ProjectProvider {
    /// Identifier of the current project, or [`GLOBAL_PROJECT`].
    fn project_name(&self) -> String;

    /// Root directory of the current project.
    fn project_root(&self) -> PathBuf;
}

/// Detects the project by walking up to the nearest marker.
#[derive(Debug, Clone)]
pub struct MarkerProvider {
    start: PathBuf,
    markers: Vec<String>,
}

impl MarkerProvider {
    /// Start from the process's working directory.
    pub fn new() -> Self {
        let start = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_dir(start)
    }

    /// Start from `dir`.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            start: dir.into(),
            markers: PROJECT_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Replace the marker list.
    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Nearest ancestor of the start directory carrying a marker.
    ///
    /// The home directory and filesystem root never count as projects.
    pub fn find_root(&self) -> Option<PathBuf> {
        let home = dirs::home_dir();
        let start = self.start.canonicalize().ok()?;

        start
            .ancestors()
            .take(MAX_SEARCH_DEPTH)
            .take_while(|dir| home.as_deref() != Some(*dir) && dir.parent().is_some())
            .find(|dir| self.has_marker(dir))
            .map(Path::to_path_buf)
    }

    fn has_marker(&self, dir: &Path) -> bool {
        self.markers.iter().any(|marker| dir.join(marker).exists())
    }
}

impl Default for MarkerProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectProvider for MarkerProvider {
    fn project_name(&self) -> String {
        self.find_root()
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| GLOBAL_PROJECT.to_string())
    }

    fn project_root(&self) -> PathBuf {
        self.find_root()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| self.start.clone())
    }
}

/// Provider returning a fixed project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedProvider {
    pub name: String,
    pub root: PathBuf,
}

impl FixedProvider {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }
}

impl ProjectProvider for FixedProvider {
    fn project_name(&self) -> String {
        self.name.clone()
    }

    fn project_root(&self) -> PathBuf {
        self.root.clone()
    }
}
