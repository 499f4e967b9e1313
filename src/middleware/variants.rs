// src/middleware/variants.rs

//! Variant expansion: one recipe built as a family of parameterized views
//!
//! [`VariantsMiddleware`] owns a [`VariantSet`] and materializes one cloned
//! recipe per variant, with settings overridden and every folder moved under
//! `<folder>/variants/<name>`. The aggregate operations walk the set in
//! order and drive the same lifecycle action on each view:
//!
//! | operation               | per variant                                      |
//! |-------------------------|--------------------------------------------------|
//! | `build_variants`        | `build()` inside the view's build folder         |
//! | `package_variants`      | `package()` with a copier into the view's package folder |
//! | `test_variants`         | `test()` inside the view's build folder          |
//! | `package_id_variants`   | no views; settings joined across all variants    |
//!
//! With no variants (or when the validity check says no) every operation
//! delegates once to the wrapped recipe.

use crate::error::{Error, Result, VariantAction};
use crate::filesystem::{FileCopier, copy_tree, in_workdir};
use crate::middleware::{Middleware, Views};
use crate::recipe::{FolderKind, PackageInfo, Recipe, RecipeFile, Settings};
use crate::variant::{VARIANTS_FOLDER, VariantDescriptor, VariantInput, VariantSet, get_variant_folder};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, info_span};

/// Local attribute holding the variant set
pub const VARIANTS_ATTR: &str = "variants";

/// Predicate deciding whether variant expansion applies to a recipe
pub type ValidityCheck = Arc<dyn Fn(&dyn Recipe) -> bool + Send + Sync>;

/// Middleware that builds, packages and tests a recipe once per variant
#[derive(Clone)]
pub struct VariantsMiddleware {
    base: Middleware,
    variants: VariantSet,
    validity: ValidityCheck,
}

impl VariantsMiddleware {
    /// Wrap a recipe and normalize its variants
    pub fn new(recipe: Box<dyn Recipe>, variants: Option<VariantInput>) -> Result<Self> {
        Self::with_locals(recipe, variants, &[])
    }

    /// Wrap a recipe, keeping extra attribute names on this layer
    pub fn with_locals(
        recipe: Box<dyn Recipe>,
        variants: Option<VariantInput>,
        locals: &[&str],
    ) -> Result<Self> {
        let mut names = vec![VARIANTS_ATTR];
        names.extend_from_slice(locals);

        let mut middleware = Self {
            base: Middleware::with_locals(recipe, &names),
            variants: VariantSet::empty(),
            validity: Arc::new(|_: &dyn Recipe| true),
        };
        middleware.set_variants(variants)?;
        Ok(middleware)
    }

    /// Wrap a recipe file, using the variants it declares
    pub fn from_recipe_file(recipe: RecipeFile) -> Result<Self> {
        let variants = recipe.variants.clone();
        Self::new(Box::new(recipe), variants)
    }

    /// Replace the validity check (defaults to always true)
    pub fn with_validity<F>(mut self, check: F) -> Self
    where
        F: Fn(&dyn Recipe) -> bool + Send + Sync + 'static,
    {
        self.validity = Arc::new(check);
        self
    }

    /// Normalize and install a new variant set
    ///
    /// Malformed input is rejected here, before any build action runs.
    pub fn set_variants(&mut self, variants: Option<VariantInput>) -> Result<()> {
        self.variants = VariantSet::from_input(variants)?;
        debug!(
            "{} has {} variants",
            self.base.display_name(),
            self.variants.len()
        );
        Ok(())
    }

    pub fn variants(&self) -> &VariantSet {
        &self.variants
    }

    /// The directly wrapped layer
    pub fn inner(&self) -> &dyn Recipe {
        self.base.inner()
    }

    pub fn inner_mut(&mut self) -> &mut dyn Recipe {
        self.base.inner_mut()
    }

    /// Whether variant expansion should apply at all
    pub fn valid(&self) -> bool {
        (self.validity)(self.base.inner())
    }

    /// Validity is checked once per aggregate operation, before the set
    fn expands(&self) -> bool {
        self.valid() && !self.variants.is_empty()
    }

    /// Clone the wrapped recipe and point it at one variant
    pub fn materialize(&self, descriptor: &VariantDescriptor) -> Box<dyn Recipe> {
        let mut recipe = self.base.inner().clone_recipe();

        if let Some(name) = &descriptor.display_name {
            let display_name = format!("{}[{}]", recipe.display_name(), name);
            recipe.set_display_name(display_name);
        }

        let settings = recipe.settings_mut();
        for (key, value) in &descriptor.settings {
            settings.set(key.as_str(), value.as_str());
        }

        if !recipe.no_copy_source() {
            let source = get_variant_folder(self.source_folder(), descriptor);
            recipe.set_folder(FolderKind::Source, Some(source));
        }

        let build = get_variant_folder(self.build_folder(), descriptor);
        recipe.set_folder(FolderKind::Install, Some(build.clone()));
        recipe.set_folder(FolderKind::Build, Some(build));

        let package = get_variant_folder(self.package_folder(), descriptor);
        recipe.set_folder(FolderKind::Package, Some(package));

        recipe
    }

    /// Materialize a view whose folders no longer depend on the working directory
    ///
    /// Relative folders are resolved against the current directory before
    /// any action changes into the view's build folder.
    fn materialize_anchored(&self, descriptor: &VariantDescriptor) -> Result<Box<dyn Recipe>> {
        let mut view = self.materialize(descriptor);
        for kind in FolderKind::ALL {
            if let Some(relative) = view.folder(kind).filter(|p| p.is_relative()) {
                let absolute = std::path::absolute(relative)?;
                view.set_folder(kind, Some(absolute));
            }
        }
        Ok(view)
    }

    /// Iterate the recipe views: itself, or one fresh clone per variant
    pub fn iter(&self) -> Views<'_> {
        if self.expands() {
            Views::variants(self)
        } else {
            Views::single(self)
        }
    }

    /// Copy this recipe's build tree into `target`'s build folder
    ///
    /// The `variants` folder at the top of the tree is never copied, so
    /// variant trees do not nest inside each other.
    pub fn copy_source(&self, target: &dyn Recipe) -> Result<()> {
        let source = self.build_folder().ok_or(Error::MissingFolder("build"))?;
        let destination = target.build_folder().ok_or(Error::MissingFolder("build"))?;

        if source == destination {
            return Ok(());
        }

        info!(
            "Copying {} into {}",
            source.display(),
            destination.display()
        );
        copy_tree(source, destination, &[VARIANTS_FOLDER])?;
        Ok(())
    }

    /// Fan the build tree out to every variant's build folder
    pub fn copy_sources(&self) -> Result<()> {
        if !self.expands() {
            return Ok(());
        }

        for descriptor in &self.variants {
            let view = self.materialize(descriptor);
            self.copy_source(view.as_ref())
                .map_err(|e| e.in_variant(VariantAction::CopySource, descriptor))?;
        }
        Ok(())
    }

    /// Build every variant in order, each inside its own build folder
    pub fn build_variants(&mut self) -> Result<()> {
        if !self.expands() {
            return self.base.inner_mut().build();
        }

        for descriptor in &self.variants {
            let mut view = self
                .materialize_anchored(descriptor)
                .map_err(|e| e.in_variant(VariantAction::Build, descriptor))?;
            let _span = info_span!("variant", name = descriptor.label()).entered();

            run_in_build_folder(view.as_mut(), |recipe| recipe.build())
                .map_err(|e| e.in_variant(VariantAction::Build, descriptor))?;
        }
        Ok(())
    }

    /// Package every variant in order into its own package folder
    ///
    /// The first failure stops the pass; later variants are not packaged.
    pub fn package_variants(&mut self) -> Result<()> {
        if !self.expands() {
            return self.base.inner_mut().package();
        }

        for descriptor in &self.variants {
            let mut view = self
                .materialize_anchored(descriptor)
                .map_err(|e| e.in_variant(VariantAction::Package, descriptor))?;
            let _span = info_span!("variant", name = descriptor.label()).entered();

            let sources: Vec<PathBuf> = [view.source_folder(), view.build_folder()]
                .into_iter()
                .flatten()
                .map(Path::to_path_buf)
                .collect();
            let destination = view
                .package_folder()
                .ok_or(Error::MissingFolder("package"))
                .map_err(|e| e.in_variant(VariantAction::Package, descriptor))?
                .to_path_buf();
            view.set_file_copier(FileCopier::new(sources, destination));

            run_in_build_folder(view.as_mut(), |recipe| {
                info!("packaging variant: {}", descriptor.label());
                recipe.package()
            })
            .map_err(|e| e.in_variant(VariantAction::Package, descriptor))?;
        }
        Ok(())
    }

    /// Test every variant in order, each inside its own build folder
    pub fn test_variants(&mut self) -> Result<()> {
        if !self.expands() {
            return self.base.inner_mut().test();
        }

        for descriptor in &self.variants {
            let mut view = self
                .materialize_anchored(descriptor)
                .map_err(|e| e.in_variant(VariantAction::Test, descriptor))?;
            let _span = info_span!("variant", name = descriptor.label()).entered();

            run_in_build_folder(view.as_mut(), |recipe| recipe.test())
                .map_err(|e| e.in_variant(VariantAction::Test, descriptor))?;
        }
        Ok(())
    }

    /// Fold the whole variant matrix into one package identity
    ///
    /// The identity is re-derived from the wrapped recipe's current settings,
    /// then each overridden setting becomes the space-joined list of its
    /// values across all variants, in order: `arch = "x86 x86_64"`. The
    /// wrapped recipe's own `package_id()` runs last on the merged identity.
    /// If any merged key is rejected, the identity is left untouched.
    pub fn package_id_variants(&mut self) -> Result<()> {
        if !self.expands() {
            let inner = self.base.inner_mut();
            inner.reset_info();
            return inner.package_id();
        }

        let mut info = PackageInfo::from_settings(self.base.inner().settings());
        for (key, value) in self.variants.merged_settings() {
            debug!("Merged identity setting {} = {}", key, value);
            info.settings.set_nested(&key, value)?;
        }

        let inner = self.base.inner_mut();
        *inner.info_mut() = info;
        inner.package_id()
    }

    fn variants_value(&self) -> Result<Value> {
        serde_json::to_value(self.variants.descriptors())
            .map_err(|e| Error::Parse(format!("Cannot serialize variants: {}", e)))
    }
}

fn run_in_build_folder(
    recipe: &mut dyn Recipe,
    action: impl FnOnce(&mut dyn Recipe) -> Result<()>,
) -> Result<()> {
    let build = recipe
        .build_folder()
        .ok_or(Error::MissingFolder("build"))?
        .to_path_buf();
    in_workdir(&build, || action(recipe))
}

impl fmt::Debug for VariantsMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.base, f)
    }
}

impl Recipe for VariantsMiddleware {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn wrapped(&self) -> Option<&dyn Recipe> {
        Some(self.base.inner())
    }

    fn same_recipe(&self, other: &dyn Recipe) -> bool {
        self.base.same_recipe(other)
    }

    fn hash_recipe(&self, state: &mut dyn Hasher) {
        self.base.hash_recipe(state);
    }

    fn clone_recipe(&self) -> Box<dyn Recipe> {
        Box::new(self.clone())
    }

    fn get_attr(&self, name: &str) -> Result<Value> {
        if name == VARIANTS_ATTR {
            return self.variants_value();
        }
        self.base.get_attr(name)
    }

    fn set_attr(&mut self, name: &str, value: Value) -> Result<()> {
        if name == VARIANTS_ATTR {
            let input = match value {
                Value::Null => None,
                other => Some(serde_json::from_value(other).map_err(|e| {
                    Error::InvalidVariantSpec(format!("Unrecognized variants value: {}", e))
                })?),
            };
            return self.set_variants(input);
        }
        self.base.set_attr(name, value)
    }

    fn delete_attr(&mut self, name: &str) -> Result<()> {
        if name == VARIANTS_ATTR {
            return self.set_variants(None);
        }
        self.base.delete_attr(name)
    }

    fn display_name(&self) -> &str {
        self.base.display_name()
    }

    fn set_display_name(&mut self, name: String) {
        self.base.set_display_name(name);
    }

    fn settings(&self) -> &Settings {
        self.base.settings()
    }

    fn settings_mut(&mut self) -> &mut Settings {
        self.base.settings_mut()
    }

    fn info(&self) -> &PackageInfo {
        self.base.info()
    }

    fn info_mut(&mut self) -> &mut PackageInfo {
        self.base.info_mut()
    }

    fn reset_info(&mut self) {
        self.base.reset_info();
    }

    fn folder(&self, kind: FolderKind) -> Option<&Path> {
        self.base.folder(kind)
    }

    fn set_folder(&mut self, kind: FolderKind, path: Option<PathBuf>) {
        self.base.set_folder(kind, path);
    }

    fn no_copy_source(&self) -> bool {
        self.base.no_copy_source()
    }

    fn set_file_copier(&mut self, copier: FileCopier) {
        self.base.set_file_copier(copier);
    }

    fn build(&mut self) -> Result<()> {
        self.build_variants()
    }

    fn package(&mut self) -> Result<()> {
        self.package_variants()
    }

    fn test(&mut self) -> Result<()> {
        self.test_variants()
    }

    fn package_id(&mut self) -> Result<()> {
        self.package_id_variants()
    }

    fn system_requirements(&mut self) -> Result<()> {
        self.base.system_requirements()
    }
}
