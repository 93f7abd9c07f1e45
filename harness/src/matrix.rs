//! The fixed combination matrix exercised by `test-all`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use template::{parse_override, PODMAN_IN_PODMAN_ID};
use thiserror::Error;

pub const FEDORA_ID: &str = "fedora";
pub const UBI_ID: &str = "ubi";

pub const FEDORA_VERSIONS: [&str; 5] = ["41", "42", "43", "44", "rawhide"];
pub const UBI_VERSIONS: [&str; 3] = ["8", "9", "10"];
pub const UBI_VARIANTS: [&str; 3] = ["ubi", "ubi-minimal", "ubi-init"];

#[derive(Error, Debug)]
pub enum CombinationParseError {
    #[error("Empty combination line")]
    Empty,

    #[error("Combination '{line}' does not start with template=<id>")]
    MissingTemplate { line: String },

    #[error("Invalid token '{token}' in combination '{line}'")]
    InvalidToken { line: String, token: String },
}

/// One template plus the option values it is tested with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combination {
    pub template: String,
    /// Overrides applied on top of the template defaults, in matrix order
    pub options: Vec<(String, String)>,
}

impl Combination {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((name.into(), value.into()));
        self
    }

    /// Name used for log files, scratch directories and container labels
    pub fn slug(&self) -> String {
        std::iter::once(self.template.as_str())
            .chain(self.options.iter().map(|(_, v)| v.as_str()))
            .map(|part| {
                part.chars()
                    .map(|c| {
                        if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                            c
                        } else {
                            '_'
                        }
                    })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// `template=<id> key=value ...`, the format of the results file
impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template={}", self.template)?;
        for (name, value) in &self.options {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}

impl FromStr for Combination {
    type Err = CombinationParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let first = tokens.next().ok_or(CombinationParseError::Empty)?;

        let template = match first.split_once('=') {
            Some(("template", id)) if !id.is_empty() => id,
            _ => {
                return Err(CombinationParseError::MissingTemplate {
                    line: line.to_string(),
                })
            }
        };

        let mut combination = Combination::new(template);
        for token in tokens {
            let (name, value) =
                parse_override(token).map_err(|_| CombinationParseError::InvalidToken {
                    line: line.to_string(),
                    token: token.to_string(),
                })?;
            combination.options.push((name, value));
        }
        Ok(combination)
    }
}

/// Which template families `test-all` leaves out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatrixFilter {
    pub skip_fedora: bool,
    pub skip_ubi: bool,
    pub skip_podman: bool,
}

impl MatrixFilter {
    /// Template ids selected by this filter
    pub fn templates(&self) -> Vec<&'static str> {
        let mut templates = Vec::new();
        if !self.skip_fedora {
            templates.push(FEDORA_ID);
        }
        if !self.skip_ubi {
            templates.push(UBI_ID);
        }
        if !self.skip_podman {
            templates.push(PODMAN_IN_PODMAN_ID);
        }
        templates
    }
}

pub fn fedora_combinations() -> Vec<Combination> {
    FEDORA_VERSIONS
        .iter()
        .map(|version| Combination::new(FEDORA_ID).with_option("fedoraVersion", *version))
        .collect()
}

pub fn ubi_combinations() -> Vec<Combination> {
    UBI_VERSIONS
        .iter()
        .flat_map(|version| {
            UBI_VARIANTS.iter().map(move |variant| {
                Combination::new(UBI_ID)
                    .with_option("ubiVersion", *version)
                    .with_option("ubiVariant", *variant)
            })
        })
        .collect()
}

/// Podman-in-Podman runs once with its defaults
pub fn podman_combinations() -> Vec<Combination> {
    vec![Combination::new(PODMAN_IN_PODMAN_ID)]
}

/// Every combination selected by `filter`, Fedora first, then UBI, then Podman-in-Podman
pub fn combinations(filter: MatrixFilter) -> Vec<Combination> {
    let mut all = Vec::new();
    if !filter.skip_fedora {
        all.extend(fedora_combinations());
    }
    if !filter.skip_ubi {
        all.extend(ubi_combinations());
    }
    if !filter.skip_podman {
        all.extend(podman_combinations());
    }
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_matrix_size() {
        assert_eq!(fedora_combinations().len(), 5);
        assert_eq!(ubi_combinations().len(), 9);
        assert_eq!(podman_combinations().len(), 1);
        assert_eq!(combinations(MatrixFilter::default()).len(), 15);
    }

    #[test]
    fn test_skip_fedora_and_ubi_leaves_podman() {
        let filter = MatrixFilter {
            skip_fedora: true,
            skip_ubi: true,
            skip_podman: false,
        };
        let selected = combinations(filter);
        assert_eq!(selected, vec![Combination::new(PODMAN_IN_PODMAN_ID)]);
        assert_eq!(filter.templates(), vec![PODMAN_IN_PODMAN_ID]);
    }

    #[test]
    fn test_skip_everything() {
        let filter = MatrixFilter {
            skip_fedora: true,
            skip_ubi: true,
            skip_podman: true,
        };
        assert!(combinations(filter).is_empty());
        assert!(filter.templates().is_empty());
    }

    #[test]
    fn test_ubi_matrix_is_cartesian() {
        let ubi = ubi_combinations();
        for version in UBI_VERSIONS {
            for variant in UBI_VARIANTS {
                let expected = Combination::new(UBI_ID)
                    .with_option("ubiVersion", version)
                    .with_option("ubiVariant", variant);
                assert!(ubi.contains(&expected), "missing {expected}");
            }
        }
    }

    #[test]
    fn test_display_and_parse() {
        let combination = Combination::new(UBI_ID)
            .with_option("ubiVersion", "9")
            .with_option("ubiVariant", "ubi-minimal");
        let line = combination.to_string();
        assert_eq!(line, "template=ubi ubiVersion=9 ubiVariant=ubi-minimal");
        assert_eq!(line.parse::<Combination>().unwrap(), combination);

        let podman: Combination = "template=podman-in-podman".parse().unwrap();
        assert!(podman.options.is_empty());
    }

    #[test]
    fn test_parse_errors() {
        let empty = "".parse::<Combination>();
        assert!(matches!(empty, Err(CombinationParseError::Empty)));
        assert!(matches!(
            "fedora fedoraVersion=42".parse::<Combination>(),
            Err(CombinationParseError::MissingTemplate { .. })
        ));
        assert!(matches!(
            "template=fedora 42".parse::<Combination>(),
            Err(CombinationParseError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_slug() {
        let combination = Combination::new(UBI_ID)
            .with_option("ubiVersion", "10")
            .with_option("ubiVariant", "ubi-init");
        assert_eq!(combination.slug(), "ubi-10-ubi-init");
        let odd = Combination::new("fedora").with_option("v", "a/b c");
        assert_eq!(odd.slug(), "fedora-a_b_c");
    }
}
