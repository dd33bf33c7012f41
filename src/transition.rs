//! Prerelease Transitions
//!
//! `bump` advances (or starts) a release-candidate tag, `finalize` strips the
//! prerelease. Neither touches the core triple.

use crate::format::{Numeric, Version};

pub const CANDIDATE_TAG: &str = "rc";

/// Advance the release-candidate tag.
///
/// - no prerelease: `rc.1`
/// - exactly `rc.<N>`: `rc.<N+1>`
/// - anything else: replaced by `rc.1`
pub fn bump(version: &Version) -> Version {
    let next = match &version.prerelease {
        Some(ids) => candidate_number(ids).map_or_else(first_candidate, |n| n.successor()),
        None => first_candidate(),
    };
    version.with_prerelease([CANDIDATE_TAG.to_string(), next.to_string()])
}

/// Drop the prerelease tag. Idempotent.
pub fn finalize(version: &Version) -> Version {
    version.core()
}

fn first_candidate() -> Numeric {
    Numeric::from(1)
}

fn candidate_number(ids: &[String]) -> Option<Numeric> {
    match ids {
        [tag, n] if tag == CANDIDATE_TAG => Numeric::parse(n),
        _ => None,
    }
}
