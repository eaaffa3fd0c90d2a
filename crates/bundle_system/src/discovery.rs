//! Finding bundle files on disk.

use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const ANY_NAME: &str = "*";
pub const ANY_EXTENSION: &str = ".*";

/// Which directories to scan and which file names to accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRequest {
    pub directories: Vec<PathBuf>,
    /// Wildcard pattern for the name part, `*` for any.
    pub file_name: String,
    /// Extension including the dot, `.*` for any.
    pub file_extension: String,
}

impl DiscoveryRequest {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self {
            directories,
            file_name: ANY_NAME.to_string(),
            file_extension: ANY_EXTENSION.to_string(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_extension(mut self, file_extension: impl Into<String>) -> Self {
        self.file_extension = file_extension.into();
        self
    }

    /// The filter part of a callback key. Wildcard defaults contribute nothing.
    pub fn filter_key(&self) -> String {
        let name = if self.file_name == ANY_NAME { "" } else { &self.file_name };
        let extension = if self.file_extension == ANY_EXTENSION { "" } else { &self.file_extension };
        format!("{}{}", name, extension).to_lowercase()
    }

    fn matches(&self, file_name: &str) -> bool {
        let pattern = format!("{}{}", self.file_name, self.file_extension);
        wildcard_match(&pattern, file_name)
            || (self.file_extension == ANY_EXTENSION && wildcard_match(&self.file_name, file_name))
    }
}

/// Case-insensitive match supporting `*` (any run) and `?` (one character).
/// A pattern glob cannot compile is matched literally.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let compiled = Pattern::new(pattern).or_else(|e| {
        debug!("Pattern '{}' is not a valid wildcard ({}), matching literally", pattern, e);
        Pattern::new(&Pattern::escape(pattern))
    });
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::default()
    };
    compiled.map(|p| p.matches_with(text, options)).unwrap_or(false)
}

/// Full path used for identity. Falls back to the path as given when it
/// cannot be canonicalized.
pub fn canonical_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Enumerates matching files under every directory, recursively, in
/// encounter order. A file reachable from two directories is listed once.
/// Missing directories are created, as bundle folders are expected to exist.
pub fn discover_bundle_files(request: &DiscoveryRequest) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for directory in &request.directories {
        if !directory.exists() {
            if let Err(e) = std::fs::create_dir_all(directory) {
                warn!("⚠️ Could not create bundle directory {}: {}", directory.display(), e);
                continue;
            }
        }

        for entry in WalkDir::new(directory).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("⚠️ Error enumerating files in {}: {}", directory.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if !request.matches(&file_name) {
                continue;
            }

            let full = canonical_path(entry.path());
            if seen.insert(full.clone()) {
                files.push(full);
            } else {
                debug!("Skipped duplicate file path {}", full.display());
            }
        }
    }

    files
}
