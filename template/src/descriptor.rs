//! Template descriptor (`devcontainer-template.json`) parsing.

use crate::{OptionAssignment, TemplateError, TemplateResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the descriptor at the root of every template directory
pub const DESCRIPTOR_FILE: &str = "devcontainer-template.json";

/// Declared type of a template option
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    String,
    Boolean,
}

/// A single option declared by a template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDefinition {
    #[serde(rename = "type", default)]
    pub option_type: OptionType,
    #[serde(default)]
    pub description: String,
    /// Default value; strings and booleans are both accepted
    #[serde(default)]
    pub default: Option<Value>,
    /// Suggested values, other values are still accepted
    #[serde(default)]
    pub proposals: Vec<String>,
    /// Closed set of allowed values
    #[serde(rename = "enum", default)]
    pub allowed: Vec<String>,
}

impl OptionDefinition {
    /// Default rendered the way it is substituted into template files
    pub fn default_value(&self) -> Option<String> {
        match self.default.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Whether `value` is acceptable for this option
    pub fn accepts(&self, value: &str) -> bool {
        match self.option_type {
            OptionType::Boolean => value == "true" || value == "false",
            OptionType::String => {
                self.allowed.is_empty() || self.allowed.iter().any(|v| v == value)
            }
        }
    }

    /// Human readable list of allowed values, used in error messages
    pub fn allowed_values(&self) -> String {
        match self.option_type {
            OptionType::Boolean => "true, false".to_string(),
            OptionType::String => self.allowed.join(", "),
        }
    }
}

/// Parsed `devcontainer-template.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescriptor {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub options: BTreeMap<String, OptionDefinition>,
    #[serde(default)]
    pub platforms: Vec<String>,
}

impl TemplateDescriptor {
    /// Load the descriptor from a template directory
    pub fn load(template_dir: &Path) -> TemplateResult<Self> {
        let path = template_dir.join(DESCRIPTOR_FILE);
        if !path.is_file() {
            return Err(TemplateError::DescriptorNotFound { path });
        }

        let contents = std::fs::read_to_string(&path)?;
        Self::parse(&contents, &path)
    }

    /// Parse a descriptor from its JSON text
    pub fn from_json(json: &str) -> TemplateResult<Self> {
        Self::parse(json, Path::new(DESCRIPTOR_FILE))
    }

    fn parse(json: &str, path: &Path) -> TemplateResult<Self> {
        let descriptor: TemplateDescriptor =
            serde_json::from_str(json).map_err(|e| TemplateError::InvalidDescriptor {
                path: PathBuf::from(path),
                reason: e.to_string(),
            })?;

        if descriptor.id.trim().is_empty() {
            return Err(TemplateError::InvalidDescriptor {
                path: PathBuf::from(path),
                reason: "template id is empty".to_string(),
            });
        }

        for (name, option) in &descriptor.options {
            if option.default_value().is_none() {
                return Err(TemplateError::MissingDefault {
                    template: descriptor.id.clone(),
                    option: name.clone(),
                });
            }
        }

        Ok(descriptor)
    }

    /// Assignment holding every option's default value
    pub fn defaults(&self) -> OptionAssignment {
        let mut assignment = OptionAssignment::new();
        for (name, option) in &self.options {
            if let Some(value) = option.default_value() {
                assignment.set(name, value);
            }
        }
        assignment
    }

    /// Names of all declared options
    pub fn option_names(&self) -> Vec<&str> {
        self.options.keys().map(|k| k.as_str()).collect()
    }
}
