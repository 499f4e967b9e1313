// src/recipe/settings.rs

//! Recipe settings and the build-identity object derived from them

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Flat setting map; sub-settings use dotted keys (`os.version`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Override a setting verbatim
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Override a setting whose parent settings must already be defined
    ///
    /// `os.version` can only be assigned when `os` has a value.
    pub fn set_nested(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        let tokens: Vec<&str> = field.split('.').collect();
        for depth in 1..tokens.len() {
            let parent = tokens[..depth].join(".");
            if !self.values.contains_key(&parent) {
                return Err(Error::UndefinedSetting {
                    field: field.to_string(),
                    parent,
                });
            }
        }
        self.set(field, value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.values {
            writeln!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// Build identity: the settings the outer build system keys packages by
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    #[serde(default)]
    pub settings: Settings,
}

impl PackageInfo {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }
}
