use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, Error, ErrorCode, Result};

/// Identifier of a package; also the id and partition key of the package's manifest document.
///
/// Consists of two to eight dot-separated segments of 1-32 characters each. Segments may not
/// contain whitespace, control characters or any of `\ / : * ? " < > |`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageIdentifier(String);

static PACKAGE_IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[^.\s\\/:*?"<>|\x00-\x1f]{1,32}(\.[^.\s\\/:*?"<>|\x00-\x1f]{1,32}){1,7}$"#)
        .unwrap()
});

impl TryFrom<&str> for PackageIdentifier {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        if PACKAGE_IDENTIFIER_RE.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(DomainError::with_message(
                ErrorCode::InvalidPackageIdentifier,
                format!("invalid package identifier: {s:?}"),
            )
            .into())
        }
    }
}

/// A package version string, unique within its package.
///
/// Versions are compared as exact strings: `1.0` and `1.0.0` are distinct versions.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageVersion(String);

static PACKAGE_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[^\\/:*?"<>|\x00-\x1f]{1,128}$"#).unwrap());

impl TryFrom<&str> for PackageVersion {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        if PACKAGE_VERSION_RE.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(DomainError::with_message(
                ErrorCode::InvalidPackageVersion,
                format!("invalid package version: {s:?}"),
            )
            .into())
        }
    }
}

/// Content identifier of an installer: a hex encoded digest of the installer artifact, such as a
/// SHA-256 or SHA-512 digest.
///
/// Compared as exact strings: identifiers differing only in hex digit case are distinct.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstallerIdentifier(String);

static SHA256_HEX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{64}$").unwrap());
static HEX_DIGEST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{1,128}$").unwrap());

pub(crate) fn is_sha256_hex(s: &str) -> bool {
    SHA256_HEX_RE.is_match(s)
}

impl TryFrom<&str> for InstallerIdentifier {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        if HEX_DIGEST_RE.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(DomainError::with_message(
                ErrorCode::InvalidInstallerIdentifier,
                format!("installer identifier must be a hex encoded digest: {s:?}"),
            )
            .into())
        }
    }
}

macro_rules! string_identifier_impls {
    ($t:ty) => {
        impl $t {
            #[inline]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl TryFrom<String> for $t {
            type Error = Error;

            fn try_from(s: String) -> Result<Self> {
                <$t>::try_from(s.as_str())
            }
        }

        impl FromStr for $t {
            type Err = Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                <$t>::try_from(s)
            }
        }

        impl From<$t> for String {
            fn from(id: $t) -> String {
                id.0
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_identifier_impls!(PackageIdentifier);
string_identifier_impls!(PackageVersion);
string_identifier_impls!(InstallerIdentifier);

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::two_segments("Contoso.App", true)]
    #[case::eight_segments("a.b.c.d.e.f.g.h", true)]
    #[case::nine_segments("a.b.c.d.e.f.g.h.i", false)]
    #[case::one_segment("Contoso", false)]
    #[case::empty_segment("Contoso..App", false)]
    #[case::leading_dot(".Contoso.App", false)]
    #[case::whitespace("Contoso.My App", false)]
    #[case::slash("Contoso/App.Beta", false)]
    #[case::long_segment("Contoso.ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456", false)]
    #[case::max_segment("Contoso.ABCDEFGHIJKLMNOPQRSTUVWXYZ012345", true)]
    fn validate_package_identifier(#[case] input: &str, #[case] valid: bool) {
        let actual = PackageIdentifier::try_from(input);
        match (valid, actual) {
            (true, Ok(id)) => assert_eq!(id.as_str(), input),
            (false, Err(e)) => assert_eq!(e.code(), Some(ErrorCode::InvalidPackageIdentifier)),
            (true, Err(e)) => panic!("expected {input:?} to be valid, got {e:?}"),
            (false, Ok(id)) => panic!("expected {input:?} to be invalid, got {id:?}"),
        }
    }

    #[rstest]
    #[case::semver("1.2.3", true)]
    #[case::freeform("2023.10 beta", true)]
    #[case::empty("", false)]
    #[case::colon("1:0", false)]
    #[case::backslash("1\\0", false)]
    #[case::control("1.0\u{1}", false)]
    fn validate_package_version(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(PackageVersion::try_from(input).is_ok(), valid);
    }

    #[test]
    fn package_version_length_limit() {
        assert!(PackageVersion::try_from("1".repeat(128).as_str()).is_ok());
        assert!(PackageVersion::try_from("1".repeat(129).as_str()).is_err());
    }

    #[rstest]
    #[case::lower("ab".repeat(32), Some("ab".repeat(32)))]
    #[case::upper_kept_verbatim("AB".repeat(32), Some("AB".repeat(32)))]
    #[case::sha512("ab".repeat(64), Some("ab".repeat(64)))]
    #[case::empty(String::new(), None)]
    #[case::too_long("ab".repeat(65), None)]
    #[case::not_hex("zz".repeat(32), None)]
    #[case::prefixed(format!("sha256:{}", "ab".repeat(32)), None)]
    fn validate_installer_identifier(#[case] input: String, #[case] expected: Option<String>) {
        let actual = InstallerIdentifier::try_from(input.as_str());
        match (expected, actual) {
            (Some(exp), Ok(act)) => assert_eq!(act.as_str(), exp),
            (None, Err(e)) => assert_eq!(e.code(), Some(ErrorCode::InvalidInstallerIdentifier)),
            (exp, act) => panic!("expected {exp:?} got {act:?}"),
        }
    }

    #[test]
    fn installer_identifiers_are_case_sensitive() {
        let lower = InstallerIdentifier::try_from("ab".repeat(32).as_str()).unwrap();
        let upper = InstallerIdentifier::try_from("AB".repeat(32).as_str()).unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn deserialize_rejects_invalid_identifier() {
        let res: std::result::Result<PackageIdentifier, _> = serde_json::from_str("\"NoDots\"");
        assert!(res.is_err());
        let id: PackageIdentifier = serde_json::from_str("\"Contoso.App\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"Contoso.App\"");
    }
}
