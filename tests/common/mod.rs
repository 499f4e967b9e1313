// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use recipe_variants::recipe::same_as;
use recipe_variants::{Error, FileCopier, FolderKind, PackageInfo, Recipe, Result, Settings};
use serde_json::Value;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// One lifecycle call observed by a [`MockRecipe`]
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub action: &'static str,
    pub recipe: String,
    pub arch: Option<String>,
    pub identity_arch: Option<String>,
    pub cwd: PathBuf,
    pub copier: Option<FileCopier>,
}

/// Call log shared by a mock and every clone made of it
pub type CallLog = Rc<RefCell<Vec<Call>>>;

/// Recipe that records each lifecycle call instead of doing work
#[derive(Debug, Clone)]
pub struct MockRecipe {
    pub name: String,
    display_name: String,
    settings: Settings,
    info: PackageInfo,
    folders: HashMap<FolderKind, PathBuf>,
    extras: BTreeMap<String, Value>,
    copier: Option<FileCopier>,
    fail_on: Option<(&'static str, String)>,
    log: CallLog,
}

impl MockRecipe {
    pub fn new(name: &str) -> Self {
        let mut settings = Settings::new();
        settings.set("os", "Linux");
        settings.set("arch", "x86_64");

        Self {
            name: name.to_string(),
            display_name: name.to_string(),
            info: PackageInfo::from_settings(&settings),
            settings,
            folders: HashMap::new(),
            extras: BTreeMap::new(),
            copier: None,
            fail_on: None,
            log: CallLog::default(),
        }
    }

    /// Point source, build and package folders under `root`
    pub fn rooted_at(mut self, root: &Path) -> Self {
        self.folders.insert(FolderKind::Source, root.join("src"));
        self.folders.insert(FolderKind::Build, root.join("build"));
        self.folders.insert(FolderKind::Install, root.join("build"));
        self.folders.insert(FolderKind::Package, root.join("package"));
        self
    }

    /// Fail `action` on the view whose `arch` setting is `arch`
    pub fn failing_on(mut self, action: &'static str, arch: &str) -> Self {
        self.fail_on = Some((action, arch.to_string()));
        self
    }

    pub fn log(&self) -> CallLog {
        Rc::clone(&self.log)
    }

    fn record(&mut self, action: &'static str) -> Result<()> {
        let arch = self.settings.get("arch").map(String::from);
        self.log.borrow_mut().push(Call {
            action,
            recipe: self.display_name.clone(),
            arch: arch.clone(),
            identity_arch: self.info.settings.get("arch").map(String::from),
            cwd: std::env::current_dir()?,
            copier: self.copier.clone(),
        });

        match &self.fail_on {
            Some((failing, on)) if *failing == action && arch.as_deref() == Some(on) => {
                Err(Error::CommandFailed {
                    command: action.to_string(),
                    code: 1,
                })
            }
            _ => Ok(()),
        }
    }
}

impl PartialEq for MockRecipe {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Recipe for MockRecipe {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn same_recipe(&self, other: &dyn Recipe) -> bool {
        same_as(self, other)
    }

    fn hash_recipe(&self, state: &mut dyn Hasher) {
        state.write(self.name.as_bytes());
    }

    fn clone_recipe(&self) -> Box<dyn Recipe> {
        Box::new(self.clone())
    }

    fn get_attr(&self, name: &str) -> Result<Value> {
        match name {
            "name" => Ok(Value::from(self.name.as_str())),
            "display_name" => Ok(Value::from(self.display_name.as_str())),
            _ => self
                .extras
                .get(name)
                .cloned()
                .ok_or_else(|| Error::attribute_not_found(name)),
        }
    }

    fn set_attr(&mut self, name: &str, value: Value) -> Result<()> {
        match name {
            "name" => return Err(Error::ReadOnlyAttribute(name.to_string())),
            "display_name" => {
                self.display_name = value
                    .as_str()
                    .ok_or(Error::InvalidAttributeValue {
                        name: name.to_string(),
                        expected: "a string",
                    })?
                    .to_string();
            }
            _ => {
                self.extras.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    fn delete_attr(&mut self, name: &str) -> Result<()> {
        self.extras
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::attribute_not_found(name))
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
        self.folders.get(&kind).map(PathBuf::as_path)
    }

    fn set_folder(&mut self, kind: FolderKind, path: Option<PathBuf>) {
        match path {
            Some(path) => self.folders.insert(kind, path),
            None => self.folders.remove(&kind),
        };
    }

    fn set_file_copier(&mut self, copier: FileCopier) {
        self.copier = Some(copier);
    }

    fn build(&mut self) -> Result<()> {
        self.record("build")
    }

    fn package(&mut self) -> Result<()> {
        self.record("package")
    }

    fn test(&mut self) -> Result<()> {
        self.record("test")
    }

    fn package_id(&mut self) -> Result<()> {
        self.record("package_id")
    }

    fn system_requirements(&mut self) -> Result<()> {
        self.record("system_requirements")
    }
}

/// Actions recorded so far, in call order
pub fn actions(log: &CallLog) -> Vec<(&'static str, Option<String>)> {
    log.borrow()
        .iter()
        .map(|call| (call.action, call.arch.clone()))
        .collect()
}
