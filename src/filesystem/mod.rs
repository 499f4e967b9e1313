// src/filesystem/mod.rs

//! Filesystem helpers used while driving variant builds
//!
//! This module provides:
//! - A scoped working directory that is restored on every exit path
//! - Recursive tree copies that preserve symlinks and skip excluded folders
//! - The artifact copier handed to recipes during packaging

mod copier;
mod tree;
mod workdir;

pub use copier::FileCopier;
pub use tree::{CopyStats, copy_tree};
pub use workdir::{WorkdirGuard, hold_workdir, in_workdir};
