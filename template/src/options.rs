//! Option assignments: defaults, `key=value` overrides and derived values.

use crate::{TemplateDescriptor, TemplateError, TemplateResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Id of the Podman-in-Podman template, the only one with derived options
pub const PODMAN_IN_PODMAN_ID: &str = "podman-in-podman";

/// Mapping from option name to the string substituted into template files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionAssignment {
    values: BTreeMap<String, String>,
}

impl OptionAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Start from the descriptor defaults and apply overrides on top.
    ///
    /// Overrides must name a declared option and respect its `enum`, if any.
    pub fn resolve(
        descriptor: &TemplateDescriptor,
        overrides: &[(String, String)],
    ) -> TemplateResult<Self> {
        let mut assignment = descriptor.defaults();

        for (name, value) in overrides {
            let Some(option) = descriptor.options.get(name) else {
                return Err(TemplateError::UnknownOption {
                    template: descriptor.id.clone(),
                    option: name.clone(),
                    known: descriptor.option_names().join(", "),
                });
            };

            if !option.accepts(value) {
                return Err(TemplateError::ValueNotAllowed {
                    option: name.clone(),
                    value: value.clone(),
                    allowed: option.allowed_values(),
                });
            }

            debug!(option = %name, value = %value, "Overriding template option");
            assignment.set(name.clone(), value.clone());
        }

        Ok(assignment)
    }
}

/// Parse a `key=value` override. The value may itself contain `=`.
pub fn parse_override(token: &str) -> TemplateResult<(String, String)> {
    match token.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(TemplateError::InvalidOverride {
            token: token.to_string(),
        }),
    }
}

/// Image tag for the `quay.io/podman` images derived from `imageVariant`.
///
/// `latest` and `stable` both map to `latest`; versions get a `v` prefix
/// unless they already carry one.
pub fn podman_image_tag(variant: &str) -> String {
    let variant = variant.trim();
    match variant {
        "" | "latest" | "stable" => "latest".to_string(),
        v if v.starts_with('v') => v.to_string(),
        v => format!("v{v}"),
    }
}

/// Add the computed options a template expects besides its declared ones
pub fn apply_derived_options(template_id: &str, assignment: &mut OptionAssignment) {
    if template_id != PODMAN_IN_PODMAN_ID {
        return;
    }

    let variant = assignment.get("imageVariant").unwrap_or("stable");
    let tag = podman_image_tag(variant);
    debug!(variant = %variant, tag = %tag, "Derived Podman image tag");
    assignment.set("imageTag", tag);
}
