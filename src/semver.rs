//! Shared version parsing and comparison utilities

use semver::Version;

/// Leading numeric components above this are calendar years, not majors.
/// Search snippets are full of strings like `2024.10` that would otherwise
/// win every "highest version" contest.
pub const MAX_PLAUSIBLE_MAJOR: u64 = 200;

/// Outcome of comparing two version strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Less,
    Equal,
    Greater,
    /// At least one operand failed to parse. Callers must fall through to
    /// other signals instead of short-circuiting on this.
    Incomparable,
}

/// Parse a version string into a semver::Version, normalizing partial versions.
///
/// Handles partial versions like "1" or "1.2" by padding with zeros, and
/// tolerates a leading 'v'. Rejects year-like strings (see
/// [`MAX_PLAUSIBLE_MAJOR`]).
///
/// Examples:
/// - "1" -> Version(1, 0, 0)
/// - "v1.2" -> Version(1, 2, 0)
/// - "1.2.3" -> Version(1, 2, 3)
/// - "2024.1" -> None
pub fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim().trim_start_matches(['v', 'V']);
    let parts: Vec<&str> = version.split('.').collect();
    let normalized = match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => version.to_string(),
    };
    let parsed = Version::parse(&normalized).ok()?;
    if parsed.major > MAX_PLAUSIBLE_MAJOR {
        return None;
    }
    Some(parsed)
}

/// Compare two version strings under semantic rules.
///
/// Equality is on the normalized form, so "2.1" and "2.1.0" compare equal.
pub fn compare_versions(a: &str, b: &str) -> CompareResult {
    let (Some(a), Some(b)) = (parse_version(a), parse_version(b)) else {
        return CompareResult::Incomparable;
    };
    match a.cmp(&b) {
        std::cmp::Ordering::Less => CompareResult::Less,
        std::cmp::Ordering::Equal => CompareResult::Equal,
        std::cmp::Ordering::Greater => CompareResult::Greater,
    }
}

/// Find the semantically highest candidate, discarding strings that do not
/// parse (including year-like strings). Returns the original string form.
pub fn find_semantic_max<S: AsRef<str>>(candidates: &[S]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|c| parse_version(c.as_ref()).map(|parsed| (c.as_ref(), parsed)))
        .max_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(raw, _)| raw.to_string())
}

/// Normalize a raw version string pulled out of free text.
///
/// "Version 2.1.0-beta" -> "2.1.0", "v3.14" -> "3.14". Keeps at most three
/// numeric components. Returns an empty string when nothing version-like
/// survives.
pub fn clean_version(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let stripped = lowered.replace("version", "");
    let stripped = stripped.trim().trim_start_matches('v');

    let kept: String = stripped
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    kept.split('.')
        .map(|part| part.trim_matches('-'))
        .filter(|part| !part.is_empty())
        .take(3)
        .collect::<Vec<_>>()
        .join(".")
}
