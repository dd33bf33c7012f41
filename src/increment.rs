//! Delegated Increment - major/minor/patch through an external calculator
//!
//! The record is snapshotted, optionally seeded with the override, handed
//! to the calculator, read back, and restored byte-for-byte. The restore
//! runs on every exit path; `RecordSnapshot`'s `Drop` covers unwinding.

use std::path::Path;

use crate::calculator::{IncrementKind, VersionCalculator};
use crate::error::{CalculationError, ResolveError};
use crate::format::Version;
use crate::record;
use crate::resolver::ResolutionResult;
use crate::snapshot::{RecordSnapshot, RestoreError};

pub fn increment<C>(
    calculator: &C,
    kind: IncrementKind,
    override_version: Option<&Version>,
    location: &Path,
) -> Result<ResolutionResult, ResolveError>
where
    C: VersionCalculator + ?Sized,
{
    let original = record::current_version(override_version, location)?;
    let snapshot = RecordSnapshot::capture(location)?;
    let companions = calculator
        .companions(location)
        .iter()
        .map(|path| RecordSnapshot::capture(path))
        .collect::<Result<Vec<_>, _>>()?;

    let outcome = calculate(calculator, kind, override_version, location, snapshot.bytes());
    let restored = restore_all(snapshot, companions);

    match (outcome, restored) {
        (Ok(version), Ok(())) => {
            tracing::debug!(
                %kind,
                %original,
                %version,
                calculator = calculator.name(),
                "delegated increment complete"
            );
            Ok(ResolutionResult { original, version })
        }
        (Err(err), Ok(())) => Err(err.into()),
        (outcome, Err(source)) => {
            tracing::error!(
                path = %location.display(),
                error = %source,
                "version record restore failed"
            );
            Err(ResolveError::RestoreFailed {
                source,
                pending: outcome.err().map(|e| e.to_string()),
            })
        }
    }
}

/// Restore every snapshot, reporting the first failure.
fn restore_all(
    record: RecordSnapshot,
    companions: Vec<RecordSnapshot>,
) -> Result<(), RestoreError> {
    let mut first_err = record.restore().err();
    for companion in companions {
        if let Err(err) = companion.restore() {
            tracing::error!(error = %err, "companion file restore failed");
            first_err.get_or_insert(err);
        }
    }
    first_err.map_or(Ok(()), Err)
}

fn calculate<C>(
    calculator: &C,
    kind: IncrementKind,
    override_version: Option<&Version>,
    location: &Path,
    snapshot: &[u8],
) -> Result<Version, CalculationError>
where
    C: VersionCalculator + ?Sized,
{
    if let Some(candidate) = override_version {
        record::write_version(location, snapshot, candidate)
            .map_err(CalculationError::WriteCandidate)?;
    }

    calculator.increment(location, kind)?;

    record::read_version(location).map_err(CalculationError::UnreadableResult)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::{CalculatorError, SemverCalculator};
    use std::fs;
    use tempfile::tempdir;

    const RECORD: &str =
        "{\n  \"name\": \"demo\",\n  \"version\": \"1.0.8\",\n  \"license\": \"MIT\"\n}\n";

    fn setup() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("package.json");
        fs::write(&path, RECORD).unwrap();
        (dir, path)
    }

    struct Broken;

    impl VersionCalculator for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn increment(&self, record: &Path, _kind: IncrementKind) -> Result<(), CalculatorError> {
            fs::write(record, b"half-written").unwrap();
            Err(CalculatorError::TimedOut {
                calculator: "broken",
                timeout: std::time::Duration::from_secs(1),
            })
        }
    }

    struct Scrambler;

    impl VersionCalculator for Scrambler {
        fn name(&self) -> &'static str {
            "scrambler"
        }

        fn increment(&self, record: &Path, _kind: IncrementKind) -> Result<(), CalculatorError> {
            fs::write(record, br#"{"version": "soon"}"#).unwrap();
            Ok(())
        }
    }

    /// Deletes the whole package directory, then fails.
    struct Wrecker;

    impl VersionCalculator for Wrecker {
        fn name(&self) -> &'static str {
            "wrecker"
        }

        fn increment(&self, record: &Path, _kind: IncrementKind) -> Result<(), CalculatorError> {
            fs::remove_dir_all(record.parent().unwrap()).unwrap();
            Err(CalculatorError::TimedOut {
                calculator: "wrecker",
                timeout: std::time::Duration::from_secs(1),
            })
        }
    }

    /// Bumps the record and a sibling lockfile together.
    struct LockfileWriter;

    impl VersionCalculator for LockfileWriter {
        fn name(&self) -> &'static str {
            "lockfile-writer"
        }

        fn companions(&self, record: &Path) -> Vec<std::path::PathBuf> {
            vec![record.with_file_name("package-lock.json")]
        }

        fn increment(&self, record: &Path, _kind: IncrementKind) -> Result<(), CalculatorError> {
            fs::write(record, br#"{"version": "1.1.0"}"#).unwrap();
            fs::write(record.with_file_name("package-lock.json"), br#"{"version": "1.1.0"}"#)
                .unwrap();
            Ok(())
        }
    }

    #[test]
    fn test_increment_reads_calculator_result() {
        let (_dir, path) = setup();
        let result = increment(&SemverCalculator, IncrementKind::Patch, None, &path).unwrap();
        assert_eq!(result.original.to_string(), "1.0.8");
        assert_eq!(result.version.to_string(), "1.0.9");
        assert_eq!(fs::read_to_string(&path).unwrap(), RECORD);
    }

    #[test]
    fn test_increment_with_override_uses_candidate() {
        let (_dir, path) = setup();
        let candidate: Version = "2.0.0-rc.3".parse().unwrap();
        let result =
            increment(&SemverCalculator, IncrementKind::Major, Some(&candidate), &path).unwrap();
        assert_eq!(result.original, candidate);
        assert_eq!(result.version.to_string(), "2.0.0");
        assert_eq!(fs::read_to_string(&path).unwrap(), RECORD);
    }

    #[test]
    fn test_calculator_failure_restores_record() {
        let (_dir, path) = setup();
        let err = increment(&Broken, IncrementKind::Minor, None, &path).unwrap_err();
        assert!(matches!(err, ResolveError::Calculation(CalculationError::Calculator(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), RECORD);
    }

    #[test]
    fn test_unreadable_result_restores_record() {
        let (_dir, path) = setup();
        let err = increment(&Scrambler, IncrementKind::Patch, None, &path).unwrap_err();
        assert!(matches!(err, ResolveError::Calculation(CalculationError::UnreadableResult(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), RECORD);
    }

    #[test]
    fn test_missing_record_fails_before_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("package.json");
        let err = increment(&SemverCalculator, IncrementKind::Patch, None, &path).unwrap_err();
        assert!(matches!(err, ResolveError::Record(record::RecordError::NotFound { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn test_restore_failure_is_fatal_and_keeps_cause() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("pkg");
        fs::create_dir(&pkg).unwrap();
        let path = pkg.join("package.json");
        fs::write(&path, RECORD).unwrap();

        let err = increment(&Wrecker, IncrementKind::Major, None, &path).unwrap_err();
        match &err {
            ResolveError::RestoreFailed { source, pending } => {
                assert!(matches!(source, RestoreError::Write { .. }));
                assert!(pending.as_deref().unwrap().contains("did not finish"));
            }
            other => panic!("expected RestoreFailed, got {other:?}"),
        }
        assert!(err.is_fatal());
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_companion_files_are_restored() {
        let (dir, path) = setup();
        let lock = dir.path().join("package-lock.json");
        let lock_content = "{\n  \"version\": \"1.0.8\",\n  \"lockfileVersion\": 3\n}\n";
        fs::write(&lock, lock_content).unwrap();

        let result = increment(&LockfileWriter, IncrementKind::Minor, None, &path).unwrap();
        assert_eq!(result.version.to_string(), "1.1.0");
        assert_eq!(fs::read_to_string(&path).unwrap(), RECORD);
        assert_eq!(fs::read_to_string(&lock).unwrap(), lock_content);
    }
}
