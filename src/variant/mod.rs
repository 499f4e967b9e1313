// src/variant/mod.rs

//! Variant descriptors and the folder layout derived from them
//!
//! A variant is a named parameterization of a recipe: a flat set of setting
//! overrides plus a display label. The only built-in convention is the bare
//! token form, where `"x86 x86_64"` expands to one `arch` override per token.
//!
//! ```toml
//! # whitespace-separated tokens
//! variants = "x86 x86_64"
//!
//! # explicit descriptors
//! [[variants]]
//! arch = "x86_64"
//! "os.version" = "10.13"
//! display_name = "Intel"
//!
//! [[variants]]
//! arch = "armv8"
//! "os.version" = "11.0"
//! display_name = "M1"
//! ```

use crate::error::{Error, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Name of the subfolder holding per-variant trees
pub const VARIANTS_FOLDER: &str = "variants";

/// Setting key populated from bare tokens
pub const TOKEN_SETTING: &str = "arch";

/// Descriptor keys that are never applied as settings
pub const RESERVED_KEYS: &[&str] = &["display_name", "folder"];

/// One variant: setting overrides plus an optional label
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantDescriptor {
    /// Appended to the recipe display name and used as the folder name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Folder name override; falls back to `display_name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,

    /// Setting overrides, applied verbatim (dotted keys allowed)
    ///
    /// Numbers and booleans are accepted and kept in their text form.
    #[serde(flatten, deserialize_with = "scalar_settings")]
    pub settings: BTreeMap<String, String>,
}

fn scalar_settings<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(D::Error::custom(format!(
                        "setting '{}' must be a string, number or boolean, got {}",
                        key, other
                    )));
                }
            };
            Ok((key, text))
        })
        .collect()
}

impl VariantDescriptor {
    /// Create an empty descriptor
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand a bare token into `{arch: token, display_name: token}`
    pub fn from_token(token: &str) -> Self {
        Self::new()
            .with_setting(TOKEN_SETTING, token)
            .with_display_name(token)
    }

    /// Add a setting override
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Set the display label
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set an explicit folder name
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    /// Folder name for this variant's trees
    pub fn folder_name(&self) -> &str {
        self.folder
            .as_deref()
            .or(self.display_name.as_deref())
            .unwrap_or_default()
    }

    /// Human-readable label for logs and errors
    pub fn label(&self) -> &str {
        match self.display_name.as_deref().or(self.folder.as_deref()) {
            Some(name) => name,
            None => "<unnamed>",
        }
    }

    /// Look up a setting override
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// Raw variant input as written by a recipe author
///
/// Decoded untagged, so a recipe file may use any of the three shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantInput {
    /// Whitespace-separated tokens: `"x86 x86_64"`
    Line(String),
    /// A list of bare tokens: `["x86", "x86_64"]`
    Tokens(Vec<String>),
    /// Fully formed descriptors, used as-is
    Descriptors(Vec<VariantDescriptor>),
}

impl From<&str> for VariantInput {
    fn from(s: &str) -> Self {
        Self::Line(s.to_string())
    }
}

impl From<String> for VariantInput {
    fn from(s: String) -> Self {
        Self::Line(s)
    }
}

impl From<Vec<String>> for VariantInput {
    fn from(tokens: Vec<String>) -> Self {
        Self::Tokens(tokens)
    }
}

impl From<Vec<&str>> for VariantInput {
    fn from(tokens: Vec<&str>) -> Self {
        Self::Tokens(tokens.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for VariantInput {
    fn from(tokens: [&str; N]) -> Self {
        Self::Tokens(tokens.iter().map(|t| t.to_string()).collect())
    }
}

impl From<Vec<VariantDescriptor>> for VariantInput {
    fn from(descriptors: Vec<VariantDescriptor>) -> Self {
        Self::Descriptors(descriptors)
    }
}

/// Ordered, validated sequence of variant descriptors
///
/// Order is significant: it is the build order and the order in which
/// values are joined into the merged package identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantSet {
    descriptors: Vec<VariantDescriptor>,
}

impl VariantSet {
    /// The empty set (pass-through mode)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Normalize raw input into a validated set
    pub fn from_input(input: Option<VariantInput>) -> Result<Self> {
        let descriptors = match input {
            None => Vec::new(),
            Some(VariantInput::Line(line)) => line
                .split_whitespace()
                .map(VariantDescriptor::from_token)
                .collect(),
            Some(VariantInput::Tokens(tokens)) => tokens
                .iter()
                .map(|token| {
                    let token = token.trim();
                    if token.is_empty() {
                        return Err(Error::InvalidVariantSpec(
                            "Empty variant token".to_string(),
                        ));
                    }
                    Ok(VariantDescriptor::from_token(token))
                })
                .collect::<Result<Vec<_>>>()?,
            Some(VariantInput::Descriptors(descriptors)) => descriptors,
        };

        Self::from_descriptors(descriptors)
    }

    /// Build a set from explicit descriptors, validating them
    pub fn from_descriptors(descriptors: Vec<VariantDescriptor>) -> Result<Self> {
        let set = Self { descriptors };
        set.validate()?;
        Ok(set)
    }

    fn validate(&self) -> Result<()> {
        let Some(first) = self.descriptors.first() else {
            return Ok(());
        };

        let keys: BTreeSet<&String> = first.settings.keys().collect();
        let mut folders = HashSet::new();

        for (index, descriptor) in self.descriptors.iter().enumerate() {
            let folder = descriptor.folder_name();
            if folder.is_empty() {
                return Err(Error::InvalidVariantSpec(format!(
                    "Variant #{} has neither display_name nor folder",
                    index + 1
                )));
            }
            if folder == "." || folder == ".." || folder.contains(['/', '\\']) {
                return Err(Error::InvalidVariantSpec(format!(
                    "Variant folder '{}' is not a plain folder name",
                    folder
                )));
            }
            if !folders.insert(folder) {
                return Err(Error::InvalidVariantSpec(format!(
                    "Duplicate variant folder '{}'",
                    folder
                )));
            }

            if let Some(reserved) = descriptor
                .settings
                .keys()
                .find(|k| RESERVED_KEYS.contains(&k.as_str()))
            {
                return Err(Error::InvalidVariantSpec(format!(
                    "'{}' is reserved and cannot be a setting",
                    reserved
                )));
            }

            let missing: BTreeSet<&String> = keys
                .iter()
                .copied()
                .filter(|key| !descriptor.settings.contains_key(*key))
                .collect();
            if !missing.is_empty() {
                return Err(Error::InvalidVariantSpec(format!(
                    "Variant '{}' does not set [{}], which the first variant overrides",
                    descriptor.label(),
                    join_keys(&missing)
                )));
            }
        }

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VariantDescriptor> {
        self.descriptors.iter()
    }

    pub fn descriptors(&self) -> &[VariantDescriptor] {
        &self.descriptors
    }

    /// Join each setting across all variants, in set order
    ///
    /// `[{arch: x86}, {arch: x86_64}]` becomes `[("arch", "x86 x86_64")]`.
    pub fn merged_settings(&self) -> Vec<(String, String)> {
        let Some(first) = self.descriptors.first() else {
            return Vec::new();
        };

        first
            .settings
            .keys()
            .map(|key| {
                let joined = self
                    .descriptors
                    .iter()
                    .filter_map(|d| d.setting(key))
                    .collect::<Vec<_>>()
                    .join(" ");
                (key.clone(), joined)
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a VariantSet {
    type Item = &'a VariantDescriptor;
    type IntoIter = std::slice::Iter<'a, VariantDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.iter()
    }
}

fn join_keys(keys: &BTreeSet<&String>) -> String {
    keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
}

/// Derive a variant's folder from a base folder
///
/// `base/variants/<folder>` when a base is given, the bare folder name otherwise.
pub fn get_variant_folder(base: Option<&Path>, descriptor: &VariantDescriptor) -> PathBuf {
    match base {
        Some(base) if !base.as_os_str().is_empty() => {
            base.join(VARIANTS_FOLDER).join(descriptor.folder_name())
        }
        _ => PathBuf::from(descriptor.folder_name()),
    }
}
