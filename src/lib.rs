// src/lib.rs

//! Recipe middleware and variant builds
//!
//! Layers cross-cutting behavior onto a build recipe without touching the
//! recipe itself, and builds one recipe as a family of variants (one per
//! target architecture, say) while the outer build system still sees a
//! single recipe with a single package identity.
//!
//! # Architecture
//!
//! - **Recipes**: anything implementing [`Recipe`]; [`RecipeFile`] loads one
//!   from TOML
//! - **Middleware**: [`Middleware`] forwards every attribute and lifecycle
//!   call it does not own, so layers stack without the caller noticing
//! - **Variants**: [`VariantsMiddleware`] materializes a cloned recipe per
//!   [`VariantDescriptor`], each under `<folder>/variants/<name>`, and folds
//!   build/package/test/identity across them
//! - **Filesystem**: scoped working directories, tree copies and the
//!   artifact copier used while packaging
//!
//! # Example
//!
//! ```no_run
//! use recipe_variants::{Recipe, VariantsMiddleware, parse_recipe_file};
//! use std::path::Path;
//!
//! # fn main() -> recipe_variants::Result<()> {
//! let recipe = parse_recipe_file(Path::new("zlib/recipe.toml"))?;
//! let mut zlib = VariantsMiddleware::from_recipe_file(recipe)?;
//!
//! zlib.copy_sources()?;
//! zlib.build()?;
//! zlib.package()?;
//! zlib.package_id()?;
//! println!("{}", zlib.info().settings);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod filesystem;
pub mod middleware;
pub mod recipe;
pub mod variant;

pub use error::{Error, Result, VariantAction};
pub use filesystem::{FileCopier, WorkdirGuard};
pub use middleware::{Middleware, View, Views, VariantsMiddleware};
pub use recipe::{
    FolderKind, PackageInfo, Recipe, RecipeFile, Settings, parse_recipe, parse_recipe_file,
    resolve_root, validate_recipe,
};
pub use variant::{VariantDescriptor, VariantInput, VariantSet, get_variant_folder};
