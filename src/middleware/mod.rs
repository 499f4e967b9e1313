// src/middleware/mod.rs

//! Recipe middleware: behavior layered onto a recipe without touching it
//!
//! A [`Middleware`] wraps exactly one recipe (or another middleware) and is
//! itself a [`Recipe`], so layers stack freely:
//!
//! ```text
//! outer build system
//!     │  package() / test() / package_id() / get_attr()
//!     ▼
//! VariantsMiddleware ── expands into one view per variant
//!     │
//! Middleware ────────── forwards everything it does not own
//!     │
//! RecipeFile ────────── the actual recipe
//! ```
//!
//! Each layer owns a small declared set of attribute names. Every other
//! attribute read, write or delete is forwarded to the wrapped layer, and
//! equality, hashing and `Debug` output collapse through the whole chain to
//! the innermost recipe.

pub mod variants;

pub use variants::{ValidityCheck, VariantsMiddleware};

use crate::error::{Error, Result};
use crate::filesystem::FileCopier;
use crate::recipe::{FolderKind, PackageInfo, Recipe, Settings, resolve_root};
use crate::variant::VariantDescriptor;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::Hasher;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::info;

/// Local attribute naming the wrapped recipe; always owned by the layer
pub const CHILD_ATTR: &str = "recipe";

/// Transparent wrapper around a recipe or another middleware
pub struct Middleware {
    recipe: Box<dyn Recipe>,
    local_names: BTreeSet<String>,
    locals: BTreeMap<String, Value>,
}

impl Middleware {
    /// Wrap a recipe with no locally owned attributes besides the child
    pub fn new(recipe: Box<dyn Recipe>) -> Self {
        Self::with_locals(recipe, &[])
    }

    /// Wrap a recipe, keeping `locals` on this layer instead of forwarding them
    pub fn with_locals(recipe: Box<dyn Recipe>, locals: &[&str]) -> Self {
        info!("Applying middleware to {}", recipe.display_name());

        let local_names = std::iter::once(CHILD_ATTR)
            .chain(locals.iter().copied())
            .map(String::from)
            .collect();

        Self {
            recipe,
            local_names,
            locals: BTreeMap::new(),
        }
    }

    /// The directly wrapped layer
    pub fn inner(&self) -> &dyn Recipe {
        self.recipe.as_ref()
    }

    pub fn inner_mut(&mut self) -> &mut dyn Recipe {
        self.recipe.as_mut()
    }

    pub fn into_inner(self) -> Box<dyn Recipe> {
        self.recipe
    }

    /// The innermost recipe below every layer
    pub fn root(&self) -> &dyn Recipe {
        resolve_root(self.inner())
    }

    /// Whether `name` is stored on this layer rather than forwarded
    pub fn is_local(&self, name: &str) -> bool {
        self.local_names.contains(name)
    }

    /// Iterate views; a plain middleware yields only itself
    pub fn iter(&self) -> Views<'_> {
        Views::single(self)
    }
}

impl Clone for Middleware {
    fn clone(&self) -> Self {
        Self {
            recipe: self.recipe.clone_recipe(),
            local_names: self.local_names.clone(),
            locals: self.locals.clone(),
        }
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner(), f)
    }
}

impl PartialEq for Middleware {
    fn eq(&self, other: &Self) -> bool {
        (self as &dyn Recipe) == (other as &dyn Recipe)
    }
}

impl Recipe for Middleware {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn wrapped(&self) -> Option<&dyn Recipe> {
        Some(self.inner())
    }

    fn same_recipe(&self, other: &dyn Recipe) -> bool {
        self.recipe.same_recipe(other)
    }

    fn hash_recipe(&self, state: &mut dyn Hasher) {
        self.recipe.hash_recipe(state);
    }

    fn clone_recipe(&self) -> Box<dyn Recipe> {
        Box::new(self.clone())
    }

    fn get_attr(&self, name: &str) -> Result<Value> {
        if name == CHILD_ATTR {
            return Ok(Value::String(self.recipe.display_name().to_string()));
        }
        if self.is_local(name) {
            return self
                .locals
                .get(name)
                .cloned()
                .ok_or_else(|| Error::attribute_not_found(name));
        }
        self.recipe.get_attr(name)
    }

    fn set_attr(&mut self, name: &str, value: Value) -> Result<()> {
        if name == CHILD_ATTR {
            return Err(Error::ReadOnlyAttribute(name.to_string()));
        }
        if self.is_local(name) {
            self.locals.insert(name.to_string(), value);
            return Ok(());
        }
        self.recipe.set_attr(name, value)
    }

    fn delete_attr(&mut self, name: &str) -> Result<()> {
        if name == CHILD_ATTR {
            return Err(Error::ReadOnlyAttribute(name.to_string()));
        }
        if self.is_local(name) {
            return self
                .locals
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| Error::attribute_not_found(name));
        }
        self.recipe.delete_attr(name)
    }

    fn display_name(&self) -> &str {
        self.recipe.display_name()
    }

    fn set_display_name(&mut self, name: String) {
        self.recipe.set_display_name(name);
    }

    fn settings(&self) -> &Settings {
        self.recipe.settings()
    }

    fn settings_mut(&mut self) -> &mut Settings {
        self.recipe.settings_mut()
    }

    fn info(&self) -> &PackageInfo {
        self.recipe.info()
    }

    fn info_mut(&mut self) -> &mut PackageInfo {
        self.recipe.info_mut()
    }

    fn reset_info(&mut self) {
        self.recipe.reset_info();
    }

    fn folder(&self, kind: FolderKind) -> Option<&Path> {
        self.recipe.folder(kind)
    }

    fn set_folder(&mut self, kind: FolderKind, path: Option<PathBuf>) {
        self.recipe.set_folder(kind, path);
    }

    fn no_copy_source(&self) -> bool {
        self.recipe.no_copy_source()
    }

    fn set_file_copier(&mut self, copier: FileCopier) {
        self.recipe.set_file_copier(copier);
    }

    fn build(&mut self) -> Result<()> {
        self.recipe.build()
    }

    fn package(&mut self) -> Result<()> {
        self.recipe.package()
    }

    fn test(&mut self) -> Result<()> {
        self.recipe.test()
    }

    fn package_id(&mut self) -> Result<()> {
        self.recipe.package_id()
    }

    fn system_requirements(&mut self) -> Result<()> {
        self.recipe.system_requirements()
    }
}

/// One element of a middleware iteration
pub enum View<'a> {
    /// No active variants: the layer itself
    Itself(&'a dyn Recipe),
    /// A freshly materialized clone for one variant
    Variant {
        descriptor: &'a VariantDescriptor,
        recipe: Box<dyn Recipe>,
    },
}

impl<'a> View<'a> {
    pub fn descriptor(&self) -> Option<&'a VariantDescriptor> {
        match self {
            Self::Itself(_) => None,
            Self::Variant { descriptor, .. } => Some(*descriptor),
        }
    }

    pub fn is_variant(&self) -> bool {
        matches!(self, Self::Variant { .. })
    }

    /// Owned recipe for this view; clones when the view is the layer itself
    pub fn into_recipe(self) -> Box<dyn Recipe> {
        match self {
            Self::Itself(recipe) => recipe.clone_recipe(),
            Self::Variant { recipe, .. } => recipe,
        }
    }

    /// Mutable access, only available for materialized variants
    pub fn as_variant_mut(&mut self) -> Option<&mut dyn Recipe> {
        match self {
            Self::Itself(_) => None,
            Self::Variant { recipe, .. } => Some(recipe.as_mut()),
        }
    }
}

impl Deref for View<'_> {
    type Target = dyn Recipe;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Itself(recipe) => *recipe,
            Self::Variant { recipe, .. } => recipe.as_ref(),
        }
    }
}

impl fmt::Debug for View<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Itself(recipe) => f.debug_tuple("Itself").field(recipe).finish(),
            Self::Variant { descriptor, recipe } => f
                .debug_struct("Variant")
                .field("descriptor", descriptor)
                .field("recipe", recipe)
                .finish(),
        }
    }
}

/// Iterator over the views of a middleware
///
/// Each call to `iter()` starts a fresh pass, re-cloning from the current
/// state of the wrapped recipe.
pub struct Views<'a> {
    state: ViewsState<'a>,
}

enum ViewsState<'a> {
    Single(Option<&'a dyn Recipe>),
    Variants {
        expander: &'a VariantsMiddleware,
        descriptors: std::slice::Iter<'a, VariantDescriptor>,
    },
}

impl<'a> Views<'a> {
    pub(crate) fn single(recipe: &'a dyn Recipe) -> Self {
        Self {
            state: ViewsState::Single(Some(recipe)),
        }
    }

    pub(crate) fn variants(expander: &'a VariantsMiddleware) -> Self {
        Self {
            state: ViewsState::Variants {
                expander,
                descriptors: expander.variants().iter(),
            },
        }
    }
}

impl<'a> Iterator for Views<'a> {
    type Item = View<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.state {
            ViewsState::Single(recipe) => recipe.take().map(View::Itself),
            ViewsState::Variants {
                expander,
                descriptors,
            } => descriptors.next().map(|descriptor| View::Variant {
                descriptor,
                recipe: expander.materialize(descriptor),
            }),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = match &self.state {
            ViewsState::Single(recipe) => usize::from(recipe.is_some()),
            ViewsState::Variants { descriptors, .. } => descriptors.len(),
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for Views<'_> {}
