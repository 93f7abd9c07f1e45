//! Per-test transcripts under `.test-logs/`.

use crate::matrix::Combination;
use chrono::Utc;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Output;

/// Directory holding one `.log` file per tested combination
#[derive(Debug, Clone)]
pub struct LogDir {
    path: PathBuf,
}

impl LogDir {
    /// Create the directory if needed
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a fresh transcript for `combination`, truncating any previous one
    pub fn open(&self, combination: &Combination) -> io::Result<TestLog> {
        let path = self.path.join(format!("{}.log", combination.slug()));
        let mut log = TestLog {
            file: File::create(&path)?,
            path,
        };
        writeln!(log.file, "# {combination}")?;
        writeln!(log.file, "# started {}", Utc::now().to_rfc3339())?;
        Ok(log)
    }
}

/// Open transcript of a single test
#[derive(Debug)]
pub struct TestLog {
    path: PathBuf,
    file: File,
}

impl TestLog {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn section(&mut self, title: &str) -> io::Result<()> {
        writeln!(self.file, "\n==> {title}")
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.file, "{text}")
    }

    /// Record a finished command with its exit status and both output streams
    pub fn command_output(&mut self, command: &str, output: &Output) -> io::Result<()> {
        writeln!(self.file, "$ {command}")?;
        self.file.write_all(&output.stdout)?;
        if !output.stdout.ends_with(b"\n") && !output.stdout.is_empty() {
            writeln!(self.file)?;
        }
        if !output.stderr.is_empty() {
            writeln!(self.file, "--- stderr ---")?;
            self.file.write_all(&output.stderr)?;
            if !output.stderr.ends_with(b"\n") {
                writeln!(self.file)?;
            }
        }
        match output.status.code() {
            Some(code) => writeln!(self.file, "[exit status {code}]"),
            None => writeln!(self.file, "[terminated by signal]"),
        }
    }

    pub fn finish(mut self, passed: bool) -> io::Result<PathBuf> {
        let verdict = if passed { "PASSED" } else { "FAILED" };
        writeln!(self.file, "\n# {verdict} at {}", Utc::now().to_rfc3339())?;
        self.file.flush()?;
        Ok(self.path)
    }
}
