// src/filesystem/tree.rs

//! Recursive tree copy with symlink preservation

use crate::error::Result;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Counts of what a tree copy wrote
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub directories: usize,
    pub files: usize,
    pub symlinks: usize,
}

/// Copy `src` into `dst`, skipping top-level entries named in `exclude`
///
/// Symlinks are recreated as symlinks (never followed). Existing files in
/// `dst` are overwritten. Exclusions only apply directly under `src`, so a
/// nested `variants` folder deeper in the tree is still copied.
pub fn copy_tree(src: &Path, dst: &Path, exclude: &[&str]) -> Result<CopyStats> {
    let mut stats = CopyStats::default();

    fs::create_dir_all(dst)?;

    let walker = WalkDir::new(src)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() == 1
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| exclude.contains(&name)))
        });

    for entry in walker {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .unwrap_or_else(|_| entry.path());
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            if target.symlink_metadata().is_ok() {
                fs::remove_file(&target)?;
            }
            std::os::unix::fs::symlink(&link, &target)?;
            stats.symlinks += 1;
        } else if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            stats.directories += 1;
        } else {
            unlink_symlink(&target)?;
            fs::copy(entry.path(), &target)?;
            stats.files += 1;
        }
    }

    debug!(
        "Copied {} -> {} ({} dirs, {} files, {} symlinks)",
        src.display(),
        dst.display(),
        stats.directories,
        stats.files,
        stats.symlinks
    );

    Ok(stats)
}

/// Remove `path` if it is a symlink, so a copy replaces the link itself
pub(crate) fn unlink_symlink(path: &Path) -> Result<()> {
    if path
        .symlink_metadata()
        .is_ok_and(|meta| meta.file_type().is_symlink())
    {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_tree_files_and_dirs() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("include/sub")).unwrap();
        fs::write(src.join("Makefile"), "all:\n").unwrap();
        fs::write(src.join("include/sub/a.h"), "#pragma once\n").unwrap();

        let dst = temp.path().join("dst");
        let stats = copy_tree(&src, &dst, &[]).unwrap();

        assert_eq!(stats.files, 2);
        assert_eq!(
            fs::read_to_string(dst.join("include/sub/a.h")).unwrap(),
            "#pragma once\n"
        );
    }

    #[test]
    fn test_copy_tree_preserves_symlinks() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("libfoo.so.1"), "elf").unwrap();
        std::os::unix::fs::symlink("libfoo.so.1", src.join("libfoo.so")).unwrap();

        let dst = temp.path().join("dst");
        let stats = copy_tree(&src, &dst, &[]).unwrap();

        assert_eq!(stats.symlinks, 1);
        assert!(dst.join("libfoo.so").is_symlink());
        assert_eq!(
            fs::read_link(dst.join("libfoo.so")).unwrap(),
            Path::new("libfoo.so.1")
        );
    }

    #[test]
    fn test_copy_tree_excludes_top_level_only() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("variants/x86")).unwrap();
        fs::create_dir_all(src.join("docs/variants")).unwrap();
        fs::write(src.join("variants/x86/old.o"), "").unwrap();
        fs::write(src.join("docs/variants/readme"), "").unwrap();

        let dst = temp.path().join("dst");
        copy_tree(&src, &dst, &["variants"]).unwrap();

        assert!(!dst.join("variants").exists());
        assert!(dst.join("docs/variants/readme").exists());
    }

    #[test]
    fn test_copy_tree_replaces_symlinked_target() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("config.h"), "#define NEW 1\n").unwrap();

        let outside = temp.path().join("outside.h");
        fs::write(&outside, "#define OLD 1\n").unwrap();
        let dst = temp.path().join("dst");
        fs::create_dir_all(&dst).unwrap();
        std::os::unix::fs::symlink(&outside, dst.join("config.h")).unwrap();

        copy_tree(&src, &dst, &[]).unwrap();

        assert!(!dst.join("config.h").is_symlink());
        assert_eq!(fs::read_to_string(dst.join("config.h")).unwrap(), "#define NEW 1\n");
        assert_eq!(fs::read_to_string(&outside).unwrap(), "#define OLD 1\n");
    }

    #[test]
    fn test_copy_into_own_subfolder() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join("build");
        fs::create_dir_all(&build).unwrap();
        fs::write(build.join("main.c"), "int main() {}").unwrap();

        let dst = build.join("variants/x86");
        copy_tree(&build, &dst, &["variants"]).unwrap();

        assert!(dst.join("main.c").exists());
        assert!(!dst.join("variants").exists());
    }
}
