//! Version parsing for `--version` output

use crate::error::Error;
use semver::Version;

/// Extract a version triple from the first line of a tool's `--version` output
///
/// The first whitespace-separated token that starts with a dotted numeric run
/// wins; `N.N` is padded to `N.N.0`.
pub fn parse_version_output(output: &str) -> Result<Version, Error> {
    let first_line = output.lines().next().unwrap_or_default();

    first_line
        .split_whitespace()
        .find_map(parse_version_token)
        .ok_or_else(|| Error::VersionParse(first_line.trim().to_string()))
}

/// Parse a single `N.N[.N]` token, ignoring a leading `v` and any trailing suffix
pub fn parse_version_token(token: &str) -> Option<Version> {
    let token = token.strip_prefix('v').unwrap_or(token);
    let numeric: &str = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map_or(token, |end| &token[..end]);
    let numeric = numeric.trim_end_matches('.');

    if !numeric.contains('.') {
        return None;
    }

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_component_versions() {
        for (text, expected) in [
            ("cmake version 3.0.1", Version::new(3, 0, 1)),
            ("cmake version 3.28.3\n\nCMake suite", Version::new(3, 28, 3)),
            ("1.2.3", Version::new(1, 2, 3)),
        ] {
            assert_eq!(parse_version_output(text).unwrap(), expected, "{}", text);
        }
    }

    #[test]
    fn test_two_component_version_is_padded() {
        assert_eq!(
            parse_version_output("cmake version 2.8").unwrap(),
            Version::new(2, 8, 0)
        );
    }

    #[test]
    fn test_toolchain_banner() {
        let text = "propeller-elf-gcc (propellergcc_v1_0_0_2408) 4.6.1\nCopyright (C) 2011";
        assert_eq!(parse_version_output(text).unwrap(), Version::new(4, 6, 1));
    }

    #[test]
    fn test_suffixes_and_prefix() {
        assert_eq!(parse_version_token("v2.0"), Some(Version::new(2, 0, 0)));
        assert_eq!(
            parse_version_token("3.10.2-dirty"),
            Some(Version::new(3, 10, 2))
        );
    }

    #[test]
    fn test_only_first_line_is_considered() {
        assert!(parse_version_output("no numbers here\nversion 3.0.1").is_err());
    }

    #[test]
    fn test_unparseable_is_error() {
        assert!(matches!(
            parse_version_output("GNU Make"),
            Err(Error::VersionParse(_))
        ));
        assert!(parse_version_output("").is_err());
        assert_eq!(parse_version_token("2408"), None);
    }
}
