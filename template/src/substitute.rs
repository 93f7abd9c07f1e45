//! `${templateOption:name}` placeholder substitution.

use crate::OptionAssignment;
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{templateOption:\s*([A-Za-z0-9_-]+)\s*\}")
            .expect("placeholder pattern is valid")
    })
}

/// Replace every placeholder whose option is assigned.
///
/// Placeholders naming an unassigned option are left untouched so callers can
/// report them with [`unresolved_placeholders`].
pub fn substitute(text: &str, assignment: &OptionAssignment) -> String {
    placeholder_regex()
        .replace_all(text, |caps: &Captures| match assignment.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Option names of the placeholders present in `text`, deduplicated, in order of appearance
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder_regex().captures_iter(text) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}
