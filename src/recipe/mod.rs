// src/recipe/mod.rs

//! Recipe capability interface
//!
//! A recipe describes how one package is built, packaged and tested. The
//! middleware layers in [`crate::middleware`] never look at a concrete recipe
//! type; everything they touch goes through the [`Recipe`] trait:
//!
//! - **Identity**: equality, hashing and cloning, all collapsing through any
//!   number of wrapping layers to the innermost recipe
//! - **Attributes**: a dynamic name/value surface (`get_attr`/`set_attr`/
//!   `delete_attr`) plus typed accessors for the fields variants rewrite
//! - **Lifecycle**: `build`, `package`, `test`, `package_id`,
//!   `system_requirements`
//!
//! [`RecipeFile`] is the TOML-backed implementation shipped with the crate.

mod format;
pub mod parser;
pub mod settings;

pub use format::{
    CommandSection, CopyRule, FolderSection, PackageIdSection, PackageSection, RecipeFile,
    RecipeSection,
};
pub use parser::{parse_recipe, parse_recipe_file, validate_recipe};
pub use settings::{PackageInfo, Settings};

use crate::error::Result;
use crate::filesystem::FileCopier;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Folder fields a recipe exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderKind {
    Source,
    Build,
    Install,
    Package,
}

impl FolderKind {
    pub const ALL: [FolderKind; 4] = [Self::Source, Self::Build, Self::Install, Self::Package];

    /// Attribute name of this folder field
    pub fn attr_name(&self) -> &'static str {
        match self {
            Self::Source => "source_folder",
            Self::Build => "build_folder",
            Self::Install => "install_folder",
            Self::Package => "package_folder",
        }
    }

    pub fn from_attr_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.attr_name() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Build => "build",
            Self::Install => "install",
            Self::Package => "package",
        }
    }
}

/// Everything the middleware layers need from a recipe
pub trait Recipe: Any + fmt::Debug {
    /// Upcast for concrete-type comparisons
    fn as_any(&self) -> &dyn Any;

    /// The layer this one wraps, if it is a wrapper
    fn wrapped(&self) -> Option<&dyn Recipe> {
        None
    }

    /// Compare against another (already unwrapped) recipe
    fn same_recipe(&self, other: &dyn Recipe) -> bool;

    /// Feed this recipe's identity into a hasher
    fn hash_recipe(&self, state: &mut dyn Hasher);

    /// Deep clone; mutating the clone never affects `self`
    fn clone_recipe(&self) -> Box<dyn Recipe>;

    /// Read an attribute by name
    fn get_attr(&self, name: &str) -> Result<Value>;

    /// Write an attribute by name
    fn set_attr(&mut self, name: &str, value: Value) -> Result<()>;

    /// Remove an attribute by name
    fn delete_attr(&mut self, name: &str) -> Result<()>;

    fn display_name(&self) -> &str;

    fn set_display_name(&mut self, name: String);

    fn settings(&self) -> &Settings;

    fn settings_mut(&mut self) -> &mut Settings;

    /// Build identity read by the outer build system
    fn info(&self) -> &PackageInfo;

    fn info_mut(&mut self) -> &mut PackageInfo;

    /// Re-derive the build identity from the current settings
    fn reset_info(&mut self) {
        let info = PackageInfo::from_settings(self.settings());
        *self.info_mut() = info;
    }

    fn folder(&self, kind: FolderKind) -> Option<&Path>;

    fn set_folder(&mut self, kind: FolderKind, path: Option<std::path::PathBuf>);

    /// Recipes that build straight from the source tree skip source copies
    fn no_copy_source(&self) -> bool {
        false
    }

    /// Install the artifact copier `package()` copies through
    fn set_file_copier(&mut self, copier: FileCopier);

    fn build(&mut self) -> Result<()> {
        Ok(())
    }

    fn package(&mut self) -> Result<()>;

    fn test(&mut self) -> Result<()> {
        Ok(())
    }

    fn package_id(&mut self) -> Result<()> {
        Ok(())
    }

    fn system_requirements(&mut self) -> Result<()> {
        Ok(())
    }

    fn source_folder(&self) -> Option<&Path> {
        self.folder(FolderKind::Source)
    }

    fn build_folder(&self) -> Option<&Path> {
        self.folder(FolderKind::Build)
    }

    fn install_folder(&self) -> Option<&Path> {
        self.folder(FolderKind::Install)
    }

    fn package_folder(&self) -> Option<&Path> {
        self.folder(FolderKind::Package)
    }
}

/// Follow wrapped layers down to the innermost recipe
pub fn resolve_root(recipe: &dyn Recipe) -> &dyn Recipe {
    let mut current = recipe;
    while let Some(inner) = current.wrapped() {
        current = inner;
    }
    current
}

/// `same_recipe` for any concrete recipe type with `PartialEq`
pub fn same_as<T: Recipe + PartialEq>(this: &T, other: &dyn Recipe) -> bool {
    resolve_root(other)
        .as_any()
        .downcast_ref::<T>()
        .is_some_and(|other| other == this)
}

/// Hash a recipe (or any wrapper around it) with the std hasher
pub fn recipe_hash(recipe: &dyn Recipe) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    recipe.hash(&mut hasher);
    hasher.finish()
}

impl PartialEq for dyn Recipe {
    fn eq(&self, other: &Self) -> bool {
        resolve_root(self).same_recipe(resolve_root(other))
    }
}

impl Eq for dyn Recipe {}

impl Hash for dyn Recipe {
    fn hash<H: Hasher>(&self, state: &mut H) {
        resolve_root(self).hash_recipe(state);
    }
}

impl Clone for Box<dyn Recipe> {
    fn clone(&self) -> Self {
        self.clone_recipe()
    }
}
