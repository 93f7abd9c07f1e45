//! Flat results file listing the combinations that failed.

use crate::matrix::{Combination, CombinationParseError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("Invalid entry on line {line} of {path}: {source}")]
    InvalidEntry {
        path: PathBuf,
        line: usize,
        source: CombinationParseError,
    },

    #[error("IO error on results file: {0}")]
    Io(#[from] std::io::Error),
}

/// `.test-results.txt`: one failed combination per line
#[derive(Debug, Clone)]
pub struct ResultsFile {
    path: PathBuf,
}

impl ResultsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Failed combinations recorded by the last run. A missing file means none.
    pub fn read(&self) -> Result<Vec<Combination>, ResultsError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut combinations = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.parse::<Combination>() {
                Ok(combination) => combinations.push(combination),
                Err(source) => {
                    return Err(ResultsError::InvalidEntry {
                        path: self.path.clone(),
                        line: index + 1,
                        source,
                    });
                }
            }
        }

        debug!(path = %self.path.display(), entries = combinations.len(), "Read results file");
        Ok(combinations)
    }

    /// Replace the file contents with `failed`, one line each
    pub fn write(&self, failed: &[Combination]) -> Result<(), ResultsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut contents = String::new();
        for combination in failed {
            contents.push_str(&combination.to_string());
            contents.push('\n');
        }
        fs::write(&self.path, contents)?;
        Ok(())
    }

    /// Empty the file before a full run
    pub fn reset(&self) -> Result<(), ResultsError> {
        self.write(&[])
    }
}
