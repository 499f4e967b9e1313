// src/recipe/format.rs

//! Recipe file format definitions
//!
//! Recipes are TOML files describing one package: its settings, folder
//! layout, build and test commands, packaging rules and (optionally) the
//! variants it is built as.
//!
//! ```toml
//! variants = "x86 x86_64"
//!
//! [recipe]
//! name = "zlib"
//! version = "1.3.1"
//!
//! [settings]
//! os = "Linux"
//! arch = "x86_64"
//!
//! [folders]
//! source = "src"
//! build = "build"
//! package = "package"
//!
//! [build]
//! commands = ["cc -c ../../src/zlib.c"]
//!
//! [[package.copy]]
//! pattern = "*.h"
//! dst = "include"
//! ```

use crate::error::{Error, Result};
use crate::filesystem::FileCopier;
use crate::recipe::settings::{PackageInfo, Settings};
use crate::recipe::{FolderKind, Recipe, same_as};
use crate::variant::VariantInput;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// A complete recipe loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeFile {
    /// Variants this recipe is built as (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<VariantInput>,

    /// Package metadata
    pub recipe: RecipeSection,

    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub folders: FolderSection,

    /// Build commands
    #[serde(default)]
    pub build: CommandSection,

    /// Test commands
    #[serde(default)]
    pub test: CommandSection,

    /// Packaging rules
    #[serde(default)]
    pub package: PackageSection,

    /// Identity adjustments
    #[serde(default)]
    pub package_id: PackageIdSection,

    /// Free-form attributes, reachable through `get_attr`
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,

    #[serde(skip)]
    display_name: String,

    #[serde(skip)]
    info: PackageInfo,

    #[serde(skip)]
    copier: Option<FileCopier>,
}

/// Package metadata section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeSection {
    pub name: String,
    pub version: String,

    /// Defaults to `name/version`
    #[serde(default)]
    pub display_name: Option<String>,

    /// Build directly from the source tree instead of copying it
    #[serde(default)]
    pub no_copy_source: bool,
}

/// Folder layout section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSection {
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub build: Option<PathBuf>,
    /// Defaults to the build folder
    #[serde(default)]
    pub install: Option<PathBuf>,
    #[serde(default)]
    pub package: Option<PathBuf>,
}

impl FolderSection {
    fn get(&self, kind: FolderKind) -> Option<&PathBuf> {
        match kind {
            FolderKind::Source => self.source.as_ref(),
            FolderKind::Build => self.build.as_ref(),
            FolderKind::Install => self.install.as_ref(),
            FolderKind::Package => self.package.as_ref(),
        }
    }

    fn slot(&mut self, kind: FolderKind) -> &mut Option<PathBuf> {
        match kind {
            FolderKind::Source => &mut self.source,
            FolderKind::Build => &mut self.build,
            FolderKind::Install => &mut self.install,
            FolderKind::Package => &mut self.package,
        }
    }
}

/// Shell commands run by a lifecycle phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSection {
    #[serde(default)]
    pub commands: Vec<String>,

    /// Extra environment variables
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// Packaging section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSection {
    #[serde(default)]
    pub copy: Vec<CopyRule>,
}

/// One artifact copy rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRule {
    pub pattern: String,
    #[serde(default)]
    pub dst: String,
    #[serde(default)]
    pub src: String,
    #[serde(default = "default_keep_path")]
    pub keep_path: bool,
}

fn default_keep_path() -> bool {
    true
}

/// Identity adjustments applied by `package_id()`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIdSection {
    /// Settings that do not affect the package identity
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl RecipeFile {
    /// Create a recipe with no settings, folders or commands
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let mut recipe = Self {
            variants: None,
            recipe: RecipeSection {
                name: name.into(),
                version: version.into(),
                ..Default::default()
            },
            settings: Settings::new(),
            folders: FolderSection::default(),
            build: CommandSection::default(),
            test: CommandSection::default(),
            package: PackageSection::default(),
            package_id: PackageIdSection::default(),
            attributes: BTreeMap::new(),
            display_name: String::new(),
            info: PackageInfo::default(),
            copier: None,
        };
        recipe.finalize();
        recipe
    }

    /// Add a setting
    pub fn with_setting(mut self, key: &str, value: &str) -> Self {
        self.settings.set(key, value);
        self.refresh_info();
        self
    }

    /// Set a folder
    pub fn with_folder(mut self, kind: FolderKind, path: impl Into<PathBuf>) -> Self {
        *self.folders.slot(kind) = Some(path.into());
        self.finalize();
        self
    }

    /// Declare variants
    pub fn with_variants(mut self, variants: impl Into<VariantInput>) -> Self {
        self.variants = Some(variants.into());
        self
    }

    /// Fill derived fields after deserialization
    pub(crate) fn finalize(&mut self) {
        self.display_name = self
            .recipe
            .display_name
            .clone()
            .unwrap_or_else(|| format!("{}/{}", self.recipe.name, self.recipe.version));
        if self.folders.install.is_none() {
            self.folders.install = self.folders.build.clone();
        }
        self.refresh_info();
    }

    /// Recompute the build identity from the current settings
    pub fn refresh_info(&mut self) {
        self.info = PackageInfo::from_settings(&self.settings);
    }

    /// Resolve a configured folder relative to `base`
    pub fn rebase_folders(&mut self, base: &Path) {
        for kind in FolderKind::ALL {
            if let Some(path) = self.folders.slot(kind).as_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }

    fn command_env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("RECIPE_NAME".to_string(), self.recipe.name.clone()),
            ("RECIPE_VERSION".to_string(), self.recipe.version.clone()),
        ];

        for (key, value) in self.settings.iter() {
            let var = format!("SETTING_{}", key.replace('.', "_").to_uppercase());
            env.push((var, value.to_string()));
        }

        for kind in FolderKind::ALL {
            if let Some(path) = self.folders.get(kind) {
                let var = format!("{}_FOLDER", kind.as_str().to_uppercase());
                env.push((var, path.to_string_lossy().to_string()));
            }
        }

        env
    }

    fn run_commands(&self, phase: &str, section: &CommandSection) -> Result<()> {
        if section.commands.is_empty() {
            debug!("No {} commands for {}", phase, self.display_name);
            return Ok(());
        }

        let env = self.command_env();
        for command in &section.commands {
            info!("Running {} phase: {}", phase, command);

            let status = Command::new("sh")
                .arg("-c")
                .arg(command)
                .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .envs(&section.environment)
                .status()?;

            if !status.success() {
                return Err(Error::CommandFailed {
                    command: command.clone(),
                    code: status.code().unwrap_or(-1),
                });
            }
        }

        Ok(())
    }

    fn default_copier(&self) -> Result<FileCopier> {
        let package = self
            .folders
            .package
            .clone()
            .ok_or(Error::MissingFolder("package"))?;
        let sources = [self.folders.source.clone(), self.folders.build.clone()];
        Ok(FileCopier::new(sources.into_iter().flatten(), package))
    }
}

fn path_value(path: Option<&PathBuf>) -> Value {
    match path {
        Some(p) => Value::String(p.to_string_lossy().to_string()),
        None => Value::Null,
    }
}

fn expect_string(name: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(Error::InvalidAttributeValue {
            name: name.to_string(),
            expected: "a string",
        }),
    }
}

impl Recipe for RecipeFile {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn same_recipe(&self, other: &dyn Recipe) -> bool {
        same_as(self, other)
    }

    fn hash_recipe(&self, mut state: &mut dyn Hasher) {
        self.recipe.name.hash(&mut state);
        self.recipe.version.hash(&mut state);
    }

    fn clone_recipe(&self) -> Box<dyn Recipe> {
        Box::new(self.clone())
    }

    fn get_attr(&self, name: &str) -> Result<Value> {
        if let Some(kind) = FolderKind::from_attr_name(name) {
            return Ok(path_value(self.folders.get(kind)));
        }

        match name {
            "name" => Ok(Value::String(self.recipe.name.clone())),
            "version" => Ok(Value::String(self.recipe.version.clone())),
            "display_name" => Ok(Value::String(self.display_name.clone())),
            "no_copy_source" => Ok(Value::Bool(self.recipe.no_copy_source)),
            "settings" => serde_json::to_value(&self.settings)
                .map_err(|e| Error::Parse(format!("Cannot serialize settings: {}", e))),
            _ => self
                .attributes
                .get(name)
                .cloned()
                .ok_or_else(|| Error::attribute_not_found(name)),
        }
    }

    fn set_attr(&mut self, name: &str, value: Value) -> Result<()> {
        if let Some(kind) = FolderKind::from_attr_name(name) {
            let path = match value {
                Value::Null => None,
                other => Some(PathBuf::from(expect_string(name, other)?)),
            };
            self.set_folder(kind, path);
            return Ok(());
        }

        match name {
            "name" => self.recipe.name = expect_string(name, value)?,
            "version" => self.recipe.version = expect_string(name, value)?,
            "display_name" => self.display_name = expect_string(name, value)?,
            "no_copy_source" => {
                self.recipe.no_copy_source =
                    value.as_bool().ok_or_else(|| Error::InvalidAttributeValue {
                        name: name.to_string(),
                        expected: "a boolean",
                    })?;
            }
            "settings" => {
                self.settings =
                    serde_json::from_value(value).map_err(|_| Error::InvalidAttributeValue {
                        name: name.to_string(),
                        expected: "a table of strings",
                    })?;
            }
            _ => {
                self.attributes.insert(name.to_string(), value);
            }
        }

        Ok(())
    }

    fn delete_attr(&mut self, name: &str) -> Result<()> {
        if let Some(kind) = FolderKind::from_attr_name(name) {
            self.set_folder(kind, None);
            return Ok(());
        }

        match name {
            "name" | "version" | "display_name" | "no_copy_source" | "settings" => {
                Err(Error::RequiredAttribute(name.to_string()))
            }
            _ => self
                .attributes
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| Error::attribute_not_found(name)),
        }
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn set_display_name(&mut self, name: String) {
        self.display_name = name;
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    fn info(&self) -> &PackageInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut PackageInfo {
        &mut self.info
    }

    fn folder(&self, kind: FolderKind) -> Option<&Path> {
        self.folders.get(kind).map(PathBuf::as_path)
    }

    fn set_folder(&mut self, kind: FolderKind, path: Option<PathBuf>) {
        *self.folders.slot(kind) = path;
    }

    fn no_copy_source(&self) -> bool {
        self.recipe.no_copy_source
    }

    fn set_file_copier(&mut self, copier: FileCopier) {
        self.copier = Some(copier);
    }

    fn build(&mut self) -> Result<()> {
        self.run_commands("build", &self.build)
    }

    fn package(&mut self) -> Result<()> {
        if self.package.copy.is_empty() {
            warn!("{} declares no package copy rules", self.display_name);
            return Ok(());
        }

        let copier = match &self.copier {
            Some(copier) => copier.clone(),
            None => self.default_copier()?,
        };

        let mut total = 0;
        for rule in &self.package.copy {
            let copied = copier.copy(&rule.pattern, &rule.dst, &rule.src, rule.keep_path)?;
            debug!("Rule '{}' copied {} files", rule.pattern, copied.len());
            total += copied.len();
        }

        info!(
            "Packaged {} files into {}",
            total,
            copier.destination().display()
        );
        Ok(())
    }

    fn test(&mut self) -> Result<()> {
        self.run_commands("test", &self.test)
    }

    fn package_id(&mut self) -> Result<()> {
        for key in &self.package_id.ignore {
            if self.info.settings.remove(key).is_some() {
                debug!("Dropped {} from package identity", key);
            }
        }
        Ok(())
    }

    fn system_requirements(&mut self) -> Result<()> {
        debug!("{} has no system requirements", self.display_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::recipe_hash;
    use tempfile::TempDir;

    #[test]
    fn test_default_display_name() {
        let recipe = RecipeFile::new("zlib", "1.3.1");
        assert_eq!(recipe.display_name(), "zlib/1.3.1");
    }

    #[test]
    fn test_install_folder_defaults_to_build() {
        let recipe = RecipeFile::new("zlib", "1.3.1").with_folder(FolderKind::Build, "build");
        assert_eq!(recipe.install_folder(), Some(Path::new("build")));
    }

    #[test]
    fn test_attribute_surface() {
        let mut recipe = RecipeFile::new("zlib", "1.3.1").with_setting("arch", "x86_64");

        assert_eq!(recipe.get_attr("name").unwrap(), Value::from("zlib"));
        assert_eq!(recipe.get_attr("build_folder").unwrap(), Value::Null);
        assert_eq!(
            recipe.get_attr("settings").unwrap(),
            serde_json::json!({"arch": "x86_64"})
        );

        recipe.set_attr("license", Value::from("Zlib")).unwrap();
        assert_eq!(recipe.get_attr("license").unwrap(), Value::from("Zlib"));

        recipe.set_attr("build_folder", Value::from("/tmp/b")).unwrap();
        assert_eq!(recipe.build_folder(), Some(Path::new("/tmp/b")));

        recipe.delete_attr("license").unwrap();
        assert!(recipe.get_attr("license").unwrap_err().is_attribute_not_found());
        assert!(matches!(
            recipe.delete_attr("name"),
            Err(Error::RequiredAttribute(_))
        ));
    }

    #[test]
    fn test_set_attr_type_checked() {
        let mut recipe = RecipeFile::new("zlib", "1.3.1");
        assert!(matches!(
            recipe.set_attr("no_copy_source", Value::from("yes")),
            Err(Error::InvalidAttributeValue { .. })
        ));
    }

    #[test]
    fn test_equality_and_hash_follow_content() {
        let a = RecipeFile::new("zlib", "1.3.1");
        let b = RecipeFile::new("zlib", "1.3.1");
        let c = RecipeFile::new("zlib", "1.2.13");

        assert!(&a as &dyn Recipe == &b as &dyn Recipe);
        assert!(&a as &dyn Recipe != &c as &dyn Recipe);
        assert_eq!(recipe_hash(&a), recipe_hash(&b));
    }

    #[test]
    fn test_package_id_drops_ignored_settings() {
        let mut recipe = RecipeFile::new("zlib", "1.3.1")
            .with_setting("arch", "x86_64")
            .with_setting("compiler.version", "13");
        recipe.package_id.ignore.push("compiler.version".to_string());

        recipe.package_id().unwrap();
        assert_eq!(recipe.info().settings.get("arch"), Some("x86_64"));
        assert_eq!(recipe.info().settings.get("compiler.version"), None);
        assert_eq!(recipe.settings().get("compiler.version"), Some("13"));
    }

    #[test]
    fn test_package_copies_rules() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join("build");
        std::fs::create_dir_all(build.join("include")).unwrap();
        std::fs::write(build.join("include/zlib.h"), "").unwrap();

        let mut recipe = RecipeFile::new("zlib", "1.3.1")
            .with_folder(FolderKind::Build, &build)
            .with_folder(FolderKind::Package, temp.path().join("package"));
        recipe.package.copy.push(CopyRule {
            pattern: "*.h".to_string(),
            dst: "include".to_string(),
            src: "include".to_string(),
            keep_path: true,
        });

        recipe.package().unwrap();
        assert!(temp.path().join("package/include/zlib.h").exists());
    }

    #[test]
    fn test_package_without_folder_fails() {
        let mut recipe = RecipeFile::new("zlib", "1.3.1");
        recipe.package.copy.push(CopyRule {
            pattern: "*".to_string(),
            dst: String::new(),
            src: String::new(),
            keep_path: true,
        });
        assert!(matches!(recipe.package(), Err(Error::MissingFolder("package"))));
    }

    #[test]
    fn test_failing_command_reports_exit_code() {
        let mut recipe = RecipeFile::new("zlib", "1.3.1");
        recipe.test.commands.push("exit 3".to_string());
        let err = recipe.test().unwrap_err();
        assert!(matches!(err, Error::CommandFailed { code: 3, .. }));
    }

    #[test]
    fn test_commands_see_settings() {
        let mut recipe = RecipeFile::new("zlib", "1.3.1").with_setting("os.version", "11.0");
        recipe
            .build
            .commands
            .push(r#"test "$SETTING_OS_VERSION" = "11.0""#.to_string());
        recipe.build().unwrap();
    }
}
