//! Resolution Orchestrator - Single Entry Point
//!
//! Every request is validated before the record is read, and only the
//! major/minor/patch path ever writes to it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::calculator::{IncrementKind, NpmCalculator, VersionCalculator};
use crate::error::ResolveError;
use crate::format::{self, Version};
use crate::increment;
use crate::record;
use crate::transition;
use crate::DEFAULT_RECORD;

/// A normalized version command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Increment(IncrementKind),
    Bump,
    Final,
    Explicit(Version),
}

impl Command {
    /// Symbolic commands match case-insensitively, ignoring surrounding
    /// whitespace; anything else must be an explicit version, matched
    /// exactly as given.
    pub fn parse(token: &str) -> Result<Self, ResolveError> {
        let symbol = token.trim();
        if symbol.is_empty() {
            return Err(ResolveError::MissingInput);
        }

        let command = match symbol.to_ascii_lowercase().as_str() {
            "major" => Self::Increment(IncrementKind::Major),
            "minor" => Self::Increment(IncrementKind::Minor),
            "patch" => Self::Increment(IncrementKind::Patch),
            "bump" => Self::Bump,
            "final" => Self::Final,
            _ => Self::Explicit(parse_version_input(token)?),
        };
        Ok(command)
    }
}

fn parse_version_input(input: &str) -> Result<Version, ResolveError> {
    if !format::validate(input) {
        return Err(ResolveError::InvalidVersionFormat(input.to_string()));
    }
    format::parse(input).map_err(|_| ResolveError::InvalidVersionFormat(input.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionRequest {
    pub token: String,
    #[serde(default)]
    pub override_version: Option<String>,
    #[serde(default = "default_record_location")]
    pub record_location: PathBuf,
}

fn default_record_location() -> PathBuf {
    PathBuf::from(DEFAULT_RECORD)
}

impl ResolutionRequest {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            override_version: None,
            record_location: default_record_location(),
        }
    }

    pub fn with_override(mut self, version: impl Into<String>) -> Self {
        self.override_version = Some(version.into());
        self
    }

    pub fn with_record(mut self, location: impl Into<PathBuf>) -> Self {
        self.record_location = location.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub original: Version,
    pub version: Version,
}

/// The resolver - owns the calculator used for delegated increments
pub struct Resolver {
    calculator: Box<dyn VersionCalculator>,
}

impl Resolver {
    pub fn new(calculator: impl VersionCalculator + 'static) -> Self {
        Self {
            calculator: Box::new(calculator),
        }
    }

    pub fn calculator_name(&self) -> &'static str {
        self.calculator.name()
    }

    /// Resolve a request into `{original, version}`.
    pub fn resolve(&self, request: &ResolutionRequest) -> Result<ResolutionResult, ResolveError> {
        let command = Command::parse(&request.token)?;
        let override_version = request
            .override_version
            .as_deref()
            .map(parse_version_input)
            .transpose()?;
        let location = request.record_location.as_path();

        tracing::debug!(?command, record = %location.display(), "resolving");

        let result = match command {
            Command::Increment(kind) => {
                let calculator = &*self.calculator;
                increment::increment(calculator, kind, override_version.as_ref(), location)?
            }
            Command::Bump => self.pure(override_version.as_ref(), location, transition::bump)?,
            Command::Final => {
                self.pure(override_version.as_ref(), location, transition::finalize)?
            }
            Command::Explicit(version) => ResolutionResult {
                original: record::current_version(override_version.as_ref(), location)?,
                version,
            },
        };

        tracing::info!(
            original = %result.original,
            version = %result.version,
            "resolved version"
        );
        Ok(result)
    }

    fn pure(
        &self,
        override_version: Option<&Version>,
        location: &Path,
        transition: fn(&Version) -> Version,
    ) -> Result<ResolutionResult, ResolveError> {
        let original = record::current_version(override_version, location)?;
        let version = transition(&original);
        Ok(ResolutionResult { original, version })
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(NpmCalculator::default())
    }
}

/// Resolve with the default npm calculator.
///
/// `record_location` defaults to `package.json` in the working directory.
pub fn resolve(
    token: &str,
    override_version: Option<&str>,
    record_location: Option<&Path>,
) -> Result<ResolutionResult, ResolveError> {
    let mut request = ResolutionRequest::new(token);
    request.override_version = override_version.map(str::to_string);
    if let Some(location) = record_location {
        request.record_location = location.to_path_buf();
    }
    Resolver::default().resolve(&request)
}
