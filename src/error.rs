// src/error.rs

//! Error types for recipe middleware and variant builds

use crate::variant::VariantDescriptor;
use std::fmt;
use std::io;
use thiserror::Error;

/// Lifecycle action driven across variants by an aggregate operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantAction {
    Build,
    Package,
    Test,
    CopySource,
}

impl VariantAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Package => "package",
            Self::Test => "test",
            Self::CopySource => "copy_source",
        }
    }
}

impl fmt::Display for VariantAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by recipes, middleware and the variant engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("Recipe has no attribute '{name}'")]
    AttributeNotFound { name: String },

    #[error("Attribute '{0}' is read-only")]
    ReadOnlyAttribute(String),

    #[error("Attribute '{0}' is required and cannot be deleted")]
    RequiredAttribute(String),

    #[error("Attribute '{name}' expects {expected}")]
    InvalidAttributeValue { name: String, expected: &'static str },

    #[error("Invalid variant specification: {0}")]
    InvalidVariantSpec(String),

    #[error("Variant '{}' failed during {action}: {source}", .descriptor.label())]
    VariantActionFailure {
        action: VariantAction,
        descriptor: Box<VariantDescriptor>,
        source: Box<Error>,
    },

    #[error("{parent} not defined for {field}; define a {parent} value first")]
    UndefinedSetting { field: String, parent: String },

    #[error("Recipe has no {0} folder")]
    MissingFolder(&'static str),

    #[error("Command '{command}' failed with exit code {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl Error {
    /// Shorthand for a forwarding miss
    pub fn attribute_not_found(name: impl Into<String>) -> Self {
        Self::AttributeNotFound { name: name.into() }
    }

    /// Attach the failing variant to an error raised by one of its views
    pub fn in_variant(self, action: VariantAction, descriptor: &VariantDescriptor) -> Self {
        Self::VariantActionFailure {
            action,
            descriptor: Box::new(descriptor.clone()),
            source: Box::new(self),
        }
    }

    /// Whether this error is a forwarding miss, looking through variant wrappers
    pub fn is_attribute_not_found(&self) -> bool {
        match self {
            Self::AttributeNotFound { .. } => true,
            Self::VariantActionFailure { source, .. } => source.is_attribute_not_found(),
            _ => false,
        }
    }
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
