//! External Calculators - the authority on major/minor/patch arithmetic
//!
//! A calculator increments the version field of a record in place and must
//! not create any version-control markers. The resolver never does this
//! arithmetic itself.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::{self, Version};
use crate::record::{self, RecordError};

const NPM_RECORD_NAME: &str = "package.json";
const NPM_LOCKFILES: [&str; 2] = ["package-lock.json", "npm-shrinkwrap.json"];
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncrementKind {
    Major,
    Minor,
    Patch,
}

impl IncrementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
        }
    }
}

impl fmt::Display for IncrementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CalculatorError {
    #[error("{calculator} cannot operate on {}: expected a file named {expected}", path.display())]
    UnsupportedRecord {
        calculator: &'static str,
        path: PathBuf,
        expected: &'static str,
    },

    #[error("Failed to launch {}: {source}", program.to_string_lossy())]
    Spawn {
        program: OsString,
        #[source]
        source: io::Error,
    },

    #[error("{calculator} exited with {status}: {stderr}")]
    Failed {
        calculator: &'static str,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{calculator} did not finish within {timeout:?}")]
    TimedOut {
        calculator: &'static str,
        timeout: Duration,
    },

    #[error("Failed waiting on {calculator}: {source}")]
    Wait {
        calculator: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{kind} increment of '{version}' overflows")]
    Overflow { version: String, kind: IncrementKind },

    #[error("'{version}' is not a version the calculator accepts: {source}")]
    UnsupportedVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Calculator trait - performs one increment on a record in place
pub trait VersionCalculator {
    fn name(&self) -> &'static str;

    /// Existing files besides `record` that `increment` may rewrite.
    fn companions(&self, _record: &Path) -> Vec<PathBuf> {
        Vec::new()
    }

    fn increment(&self, record: &Path, kind: IncrementKind) -> Result<(), CalculatorError>;
}

/// Delegates to `npm version <kind>` with git tagging, lifecycle scripts and
/// lockfile updates switched off.
#[derive(Debug, Clone)]
pub struct NpmCalculator {
    program: OsString,
    timeout: Option<Duration>,
}

impl NpmCalculator {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn command(&self, record: &Path, kind: IncrementKind) -> Result<Command, CalculatorError> {
        if record.file_name().map_or(true, |n| n != NPM_RECORD_NAME) {
            return Err(CalculatorError::UnsupportedRecord {
                calculator: self.name(),
                path: record.to_path_buf(),
                expected: NPM_RECORD_NAME,
            });
        }

        let mut cmd = Command::new(&self.program);
        cmd.args([
            "version",
            kind.as_str(),
            "--no-git-tag-version",
            "--ignore-scripts",
            "--no-package-lock",
        ])
        .current_dir(record_dir(record))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
        Ok(cmd)
    }
}

fn record_dir(record: &Path) -> &Path {
    match record.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

impl Default for NpmCalculator {
    fn default() -> Self {
        Self::new("npm")
    }
}

impl VersionCalculator for NpmCalculator {
    fn name(&self) -> &'static str {
        "npm"
    }

    fn companions(&self, record: &Path) -> Vec<PathBuf> {
        let dir = record_dir(record);
        NPM_LOCKFILES
            .iter()
            .map(|name| dir.join(name))
            .filter(|path| path.is_file())
            .collect()
    }

    fn increment(&self, record: &Path, kind: IncrementKind) -> Result<(), CalculatorError> {
        let mut child = self
            .command(record, kind)?
            .spawn()
            .map_err(|source| CalculatorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        tracing::debug!(
            calculator = self.name(),
            %kind,
            record = %record.display(),
            "calculator started"
        );

        // Drain stderr off-thread so a chatty child cannot block on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let wait_err = |source| CalculatorError::Wait {
            calculator: self.name(),
            source,
        };

        let status = match self.timeout {
            None => child.wait().map_err(wait_err)?,
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(status) = child.try_wait().map_err(wait_err)? {
                        break status;
                    }
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(CalculatorError::TimedOut {
                            calculator: self.name(),
                            timeout,
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(CalculatorError::Failed {
                calculator: self.name(),
                status,
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// In-process calculator following npm's increment rules.
///
/// A prerelease rounds up to its own core triple when the incremented
/// component and everything below it are already zero, so
/// `major` on `2.0.0-rc.1` is `2.0.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemverCalculator;

impl SemverCalculator {
    pub fn next(
        current: &semver::Version,
        kind: IncrementKind,
    ) -> Result<semver::Version, CalculatorError> {
        let pre = !current.pre.is_empty();
        let overflow = || CalculatorError::Overflow {
            version: current.to_string(),
            kind,
        };
        let succ = |n: u64| n.checked_add(1).ok_or_else(overflow);

        let (major, minor, patch) = (current.major, current.minor, current.patch);
        let next = match kind {
            IncrementKind::Major if minor == 0 && patch == 0 && pre => (major, 0, 0),
            IncrementKind::Major => (succ(major)?, 0, 0),
            IncrementKind::Minor if patch == 0 && pre => (major, minor, 0),
            IncrementKind::Minor => (major, succ(minor)?, 0),
            IncrementKind::Patch if pre => (major, minor, patch),
            IncrementKind::Patch => (major, minor, succ(patch)?),
        };
        Ok(semver::Version::new(next.0, next.1, next.2))
    }
}

impl VersionCalculator for SemverCalculator {
    fn name(&self) -> &'static str {
        "semver"
    }

    fn increment(&self, record: &Path, kind: IncrementKind) -> Result<(), CalculatorError> {
        let original = fs::read(record).map_err(|source| RecordError::NotFound {
            path: record.to_path_buf(),
            source,
        })?;
        let current = record::version_from_bytes(record, &original)?.to_string();
        let parsed = semver::Version::parse(&current).map_err(|source| {
            CalculatorError::UnsupportedVersion {
                version: current.clone(),
                source,
            }
        })?;

        let next = Self::next(&parsed, kind)?.to_string();
        let next: Version = format::parse(&next).map_err(|e| RecordError::VersionFieldMissing {
            path: record.to_path_buf(),
            reason: e.to_string(),
        })?;

        tracing::debug!(
            calculator = self.name(),
            %kind,
            from = %current,
            to = %next,
            "calculated increment"
        );
        record::write_version(record, &original, &next)?;
        Ok(())
    }
}
