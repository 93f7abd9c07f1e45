//! Template materialization.
//!
//! A template directory is copied into a scratch location and every text file
//! in the copy has its `${templateOption:*}` placeholders replaced. The result
//! is a directory the Dev Container CLI can bring up as-is.

use crate::substitute::{substitute, unresolved_placeholders};
use crate::{OptionAssignment, TemplateError, TemplateResult};
use glob::{glob_with, MatchOptions, Pattern};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A template instance written to disk
#[derive(Debug, Clone)]
pub struct MaterializedTemplate {
    /// Root of the instance (the Dev Container workspace folder)
    pub root: PathBuf,
    /// Values that were substituted
    pub assignment: OptionAssignment,
    /// Files whose contents changed during substitution
    pub rewritten_files: Vec<PathBuf>,
}

impl MaterializedTemplate {
    /// Path of the generated `.devcontainer/devcontainer.json`
    pub fn devcontainer_json(&self) -> PathBuf {
        self.root.join(".devcontainer").join("devcontainer.json")
    }
}

/// Recursively copy `src` into `dest`, creating `dest` if needed
pub fn copy_dir_all(src: &Path, dest: &Path) -> TemplateResult<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Copy `template_dir` to `dest` and substitute `assignment` into every text file.
///
/// Any previous content of `dest` is removed first. Fails if a placeholder
/// survives substitution in any file.
pub fn materialize(
    template_dir: &Path,
    dest: &Path,
    assignment: &OptionAssignment,
) -> TemplateResult<MaterializedTemplate> {
    if dest.exists() {
        debug!(path = %dest.display(), "Removing previous template instance");
        fs::remove_dir_all(dest)?;
    }
    copy_dir_all(template_dir, dest)?;

    let mut rewritten_files = Vec::new();
    for path in instance_files(dest)? {
        let bytes = fs::read(&path)?;
        let Ok(original) = String::from_utf8(bytes) else {
            debug!(path = %path.display(), "Skipping binary file");
            continue;
        };

        let replaced = substitute(&original, assignment);
        let unresolved = unresolved_placeholders(&replaced);
        if !unresolved.is_empty() {
            return Err(TemplateError::UnresolvedPlaceholders {
                path,
                names: unresolved.join(", "),
            });
        }

        if replaced != original {
            fs::write(&path, replaced)?;
            rewritten_files.push(path);
        }
    }

    info!(
        template = %template_dir.display(),
        instance = %dest.display(),
        files = rewritten_files.len(),
        "Materialized template"
    );

    Ok(MaterializedTemplate {
        root: dest.to_path_buf(),
        assignment: assignment.clone(),
        rewritten_files,
    })
}

/// Every regular file below `root`, hidden directories included
fn instance_files(root: &Path) -> TemplateResult<Vec<PathBuf>> {
    let pattern = format!("{}/**/*", Pattern::escape(&root.to_string_lossy()));
    let options = MatchOptions {
        require_literal_leading_dot: false,
        ..MatchOptions::new()
    };

    let mut files = Vec::new();
    for entry in glob_with(&pattern, options)? {
        let path = entry.map_err(|e| e.into_error())?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
