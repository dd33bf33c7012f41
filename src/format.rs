//! Version Format - Grammar and Parsing
//!
//! Grammar: `MAJOR.MINOR.PATCH` with an optional `-PRERELEASE` tag.
//! No I/O happens here.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const VERSION_PATTERN: &str = r"^[0-9]+\.[0-9]+\.[0-9]+(-[A-Za-z0-9.-]+)?$";

static VERSION_RE: OnceLock<Regex> = OnceLock::new();

fn version_re() -> &'static Regex {
    VERSION_RE.get_or_init(|| Regex::new(VERSION_PATTERN).expect("version pattern is valid"))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("'{0}' is not a MAJOR.MINOR.PATCH[-PRERELEASE] version")]
    Grammar(String),
}

/// A non-negative integer kept as its decimal digits.
///
/// Any length is accepted and the digits are printed back exactly as
/// parsed, leading zeros included.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Numeric(String);

impl Numeric {
    /// `None` unless `digits` is a non-empty run of ASCII digits.
    pub fn parse(digits: &str) -> Option<Self> {
        (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .then(|| Self(digits.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The next integer, in canonical form (no leading zeros).
    pub fn successor(&self) -> Self {
        let trimmed = self.0.trim_start_matches('0');
        let mut digits: Vec<u8> = if trimmed.is_empty() {
            vec![b'0']
        } else {
            trimmed.bytes().collect()
        };

        let mut carry = true;
        for d in digits.iter_mut().rev() {
            if *d == b'9' {
                *d = b'0';
            } else {
                *d += 1;
                carry = false;
                break;
            }
        }
        if carry {
            digits.insert(0, b'1');
        }
        Self(digits.into_iter().map(char::from).collect())
    }
}

impl From<u64> for Numeric {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable semantic version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Version {
    pub major: Numeric,
    pub minor: Numeric,
    pub patch: Numeric,
    pub prerelease: Option<Vec<String>>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major: major.into(),
            minor: minor.into(),
            patch: patch.into(),
            prerelease: None,
        }
    }

    /// Same core triple with the given prerelease identifiers.
    pub fn with_prerelease<I, S>(&self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prerelease: Some(identifiers.into_iter().map(Into::into).collect()),
            ..self.core()
        }
    }

    /// The core triple without any prerelease tag.
    pub fn core(&self) -> Self {
        Self {
            major: self.major.clone(),
            minor: self.minor.clone(),
            patch: self.patch.clone(),
            prerelease: None,
        }
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ids) = &self.prerelease {
            write!(f, "-{}", ids.join("."))?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl TryFrom<String> for Version {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse(&value)
    }
}

/// Check `input` against the version grammar.
pub fn validate(input: &str) -> bool {
    version_re().is_match(input)
}

/// Parse a version string.
///
/// The first `-` separates the core triple from the prerelease tag; the
/// prerelease is split on `.` into identifiers.
pub fn parse(input: &str) -> Result<Version, FormatError> {
    let grammar = || FormatError::Grammar(input.to_string());
    if !validate(input) {
        return Err(grammar());
    }

    let (core, prerelease) = match input.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (input, None),
    };

    let parts = core
        .split('.')
        .map(Numeric::parse)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(grammar)?;
    let [major, minor, patch]: [Numeric; 3] = parts.try_into().map_err(|_| grammar())?;

    Ok(Version {
        major,
        minor,
        patch,
        prerelease: prerelease.map(|pre| pre.split('.').map(str::to_string).collect()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_grammar() {
        assert!(validate("1.0.8"));
        assert!(validate("0.0.0"));
        assert!(validate("1.0.8-rc.1"));
        assert!(validate("10.20.30-beta-2.x"));
        assert!(validate("18446744073709551616.0.0"));
    }

    #[test]
    fn test_validate_rejects_non_versions() {
        assert!(!validate(""));
        assert!(!validate("invalid-version"));
        assert!(!validate("1.0"));
        assert!(!validate("1.0.0.0"));
        assert!(!validate("v1.0.0"));
        assert!(!validate("1.0.0-"));
        assert!(!validate("1.0.0+build.5"));
        assert!(!validate("1.0.0-rc_1"));
        assert!(!validate(" 1.0.0"));
    }

    #[test]
    fn test_parse_core_and_prerelease() {
        let v = parse("1.2.3-rc.4").unwrap();
        assert_eq!(v.major, Numeric::from(1));
        assert_eq!(v.minor, Numeric::from(2));
        assert_eq!(v.patch, Numeric::from(3));
        assert_eq!(v.prerelease, Some(vec!["rc".to_string(), "4".to_string()]));

        let v = parse("7.0.0").unwrap();
        assert_eq!(v, Version::new(7, 0, 0));
        assert!(!v.is_prerelease());
    }

    #[test]
    fn test_parse_splits_on_first_hyphen_only() {
        let v = parse("1.0.0-alpha-beta.2").unwrap();
        assert_eq!(v.prerelease, Some(vec!["alpha-beta".to_string(), "2".to_string()]));
    }

    #[test]
    fn test_parse_has_no_range_limit() {
        let v = parse("18446744073709551616.0.0").unwrap();
        assert_eq!(v.major.as_str(), "18446744073709551616");
        assert_eq!(v.major.successor().as_str(), "18446744073709551617");
    }

    #[test]
    fn test_round_trip() {
        for input in [
            "0.0.0",
            "1.0.8",
            "1.0.8-rc.1",
            "2.3.4-beta.5",
            "1.1.0-x-y.z.0",
            "3.0.0-alpha",
            "01.2.3",
            "18446744073709551616.0.0",
        ] {
            assert_eq!(parse(input).unwrap().to_string(), input);
        }
    }

    #[test]
    fn test_numeric_successor() {
        let next = |s: &str| Numeric::parse(s).unwrap().successor().to_string();
        assert_eq!(next("0"), "1");
        assert_eq!(next("41"), "42");
        assert_eq!(next("199"), "200");
        assert_eq!(next("007"), "8");
        assert_eq!(next("000"), "1");
        assert_eq!(next("18446744073709551615"), "18446744073709551616");
    }

    #[test]
    fn test_numeric_rejects_non_digits() {
        assert!(Numeric::parse("").is_none());
        assert!(Numeric::parse("1a").is_none());
        assert!(Numeric::parse("-1").is_none());
        assert_eq!(Numeric::parse("000").unwrap().as_str(), "000");
    }

    #[test]
    fn test_serde_as_string() {
        let v = parse("1.0.8-rc.2").unwrap();
        assert_eq!(serde_json::to_string(&v).unwrap(), r#""1.0.8-rc.2""#);
        let back: Version = serde_json::from_str(r#""1.0.8-rc.2""#).unwrap();
        assert_eq!(back, v);
        assert!(serde_json::from_str::<Version>(r#""nope""#).is_err());
    }
}
