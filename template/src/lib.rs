//! Dev Container template handling
//!
//! This crate reads `devcontainer-template.json` descriptors, resolves option
//! values (defaults plus `key=value` overrides) and materializes a runnable
//! template instance by substituting `${templateOption:name}` placeholders.

pub mod descriptor;
pub mod materialize;
pub mod options;
pub mod substitute;

use std::path::PathBuf;
use thiserror::Error;

pub use descriptor::{OptionDefinition, OptionType, TemplateDescriptor, DESCRIPTOR_FILE};
pub use materialize::{copy_dir_all, materialize, MaterializedTemplate};
pub use options::{
    apply_derived_options, parse_override, podman_image_tag, OptionAssignment,
    PODMAN_IN_PODMAN_ID,
};
pub use substitute::{substitute, unresolved_placeholders};

/// Errors related to template handling
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template descriptor not found: {path}")]
    DescriptorNotFound { path: PathBuf },

    #[error("Invalid template descriptor {path}: {reason}")]
    InvalidDescriptor { path: PathBuf, reason: String },

    #[error("Option '{option}' of template '{template}' has no default value")]
    MissingDefault { template: String, option: String },

    #[error("Invalid override '{token}': expected key=value")]
    InvalidOverride { token: String },

    #[error("Unknown option '{option}' for template '{template}'. Known options: {known}")]
    UnknownOption {
        template: String,
        option: String,
        known: String,
    },

    #[error("Value '{value}' is not allowed for option '{option}'. Allowed: {allowed}")]
    ValueNotAllowed {
        option: String,
        value: String,
        allowed: String,
    },

    #[error("Unresolved placeholders in {path}: {names}")]
    UnresolvedPlaceholders { path: PathBuf, names: String },

    #[error("Glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TemplateResult<T> = Result<T, TemplateError>;
