// src/filesystem/copier.rs

//! Artifact copier used by recipes while packaging

use crate::error::Result;
use crate::filesystem::tree::unlink_symlink;
use glob::Pattern;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Copies files matching a pattern from source folders into a package folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCopier {
    sources: Vec<PathBuf>,
    destination: PathBuf,
}

impl FileCopier {
    /// Create a copier from source folders into `destination`
    pub fn new<I, P>(sources: I, destination: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut seen = BTreeSet::new();
        let sources = sources
            .into_iter()
            .map(Into::into)
            .filter(|p: &PathBuf| seen.insert(p.clone()))
            .collect();

        Self {
            sources,
            destination: destination.into(),
        }
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Copy files matching `pattern` found under `src` of every source folder
    ///
    /// `pattern` is matched against paths relative to `<source>/<src>`, with
    /// `*` crossing directory separators. Files land in `<destination>/<dst>`,
    /// keeping their relative path when `keep_path` is set and flattened to
    /// their file name otherwise. Returns the destination paths written.
    pub fn copy(&self, pattern: &str, dst: &str, src: &str, keep_path: bool) -> Result<Vec<PathBuf>> {
        let pattern = Pattern::new(pattern)?;
        let target_root = self.destination.join(dst);
        let mut copied = BTreeSet::new();

        for source in &self.sources {
            let base = source.join(src);
            if !base.is_dir() {
                debug!("Skipping missing copy source {}", base.display());
                continue;
            }

            for entry in WalkDir::new(&base).follow_links(false).min_depth(1) {
                let entry = entry?;
                let path = entry.path();

                if entry.file_type().is_dir() || path.starts_with(&self.destination) {
                    continue;
                }

                let relative = path.strip_prefix(&base).unwrap_or(path);
                if !pattern.matches_path(relative) {
                    continue;
                }

                let target = if keep_path {
                    target_root.join(relative)
                } else {
                    match relative.file_name() {
                        Some(name) => target_root.join(name),
                        None => continue,
                    }
                };

                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }

                if entry.file_type().is_symlink() {
                    let link = fs::read_link(path)?;
                    if target.symlink_metadata().is_ok() {
                        fs::remove_file(&target)?;
                    }
                    std::os::unix::fs::symlink(link, &target)?;
                } else {
                    unlink_symlink(&target)?;
                    fs::copy(path, &target)?;
                }

                debug!("Copied {} -> {}", path.display(), target.display());
                copied.insert(target);
            }
        }

        Ok(copied.into_iter().collect())
    }
}
