//! Docker version parsing.

use semver::Version;

/// Oldest docker release known to work; older versions only produce a warning.
pub const MIN_DOCKER_VERSION: Version = Version::new(20, 10, 0);

/// Extract the version from `docker --version` output, e.g.
/// `Docker version 24.0.7, build afdd53b`.
///
/// Two-component versions are padded with `.0` and leading zeros are
/// tolerated; distribution suffixes such as `+dfsg1` are accepted.
#[must_use]
pub fn parse_docker_version(output: &str) -> Option<Version> {
    let rest = output.split("version").nth(1)?;
    let raw = rest
        .trim_start()
        .split(|c: char| c == ',' || c.is_whitespace())
        .next()?
        .trim_start_matches('v');
    if let Ok(v) = Version::parse(raw) {
        return Some(v);
    }
    let numeric: String = raw
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let parts: Vec<u64> = numeric
        .split('.')
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [major, minor] => Some(Version::new(*major, *minor, 0)),
        [major, minor, patch, ..] => Some(Version::new(*major, *minor, *patch)),
        _ => None,
    }
}

/// Whether `version` is older than [`MIN_DOCKER_VERSION`], ignoring
/// pre-release and build suffixes.
#[must_use]
pub fn is_below_minimum(version: &Version) -> bool {
    Version::new(version.major, version.minor, version.patch) < MIN_DOCKER_VERSION
}
