// src/recipe/parser.rs

//! Recipe file parsing

use crate::error::{Error, Result};
use crate::recipe::format::RecipeFile;
use crate::variant::VariantSet;
use std::path::Path;

/// Parse a recipe from a TOML string
pub fn parse_recipe(content: &str) -> Result<RecipeFile> {
    let mut recipe: RecipeFile =
        toml::from_str(content).map_err(|e| Error::Parse(format!("Invalid recipe: {}", e)))?;
    recipe.finalize();
    Ok(recipe)
}

/// Parse a recipe from a file
///
/// Relative folders are resolved against the directory holding the file.
pub fn parse_recipe_file(path: &Path) -> Result<RecipeFile> {
    let content = std::fs::read_to_string(path)?;
    let mut recipe = parse_recipe(&content)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        recipe.rebase_folders(dir);
    }

    Ok(recipe)
}

/// Validate a recipe for completeness and correctness
pub fn validate_recipe(recipe: &RecipeFile) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if recipe.recipe.name.is_empty() {
        return Err(Error::Parse("Recipe name cannot be empty".to_string()));
    }
    if recipe.recipe.version.is_empty() {
        return Err(Error::Parse("Recipe version cannot be empty".to_string()));
    }

    // Surfaces malformed variants before any build action runs
    let variants = VariantSet::from_input(recipe.variants.clone())?;

    if !variants.is_empty() && recipe.folders.build.is_none() {
        warnings.push("Variants declared without a build folder".to_string());
    }
    if recipe.package.copy.is_empty() {
        warnings.push("No package copy rules specified".to_string());
    }
    if recipe.folders.package.is_none() {
        warnings.push("No package folder specified".to_string());
    }
    for rule in &recipe.package.copy {
        if let Err(e) = glob::Pattern::new(&rule.pattern) {
            return Err(Error::Parse(format!(
                "Invalid copy pattern '{}': {}",
                rule.pattern, e
            )));
        }
    }

    Ok(warnings)
}
