//! Package feed version lookup.

use crate::error::{BuildError, BuildResult};
use crate::http::{HttpClient, fetch_json};
use semver::Version;
use serde::Deserialize;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Flat-container package index (`<feed>/<id>/index.json`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageIndex {
    /// Every published version, as listed by the feed.
    #[serde(default)]
    pub versions: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Newest version of `package` on `feed` whose major is `major`.
pub fn latest_package_version(
    http: &dyn HttpClient,
    feed: &str,
    package: &str,
    major: u64,
    include_prerelease: bool,
) -> BuildResult<String> {
    let url = format!(
        "{}/{}/index.json",
        feed.trim_end_matches('/'),
        package.to_lowercase()
    );
    let index: PackageIndex = fetch_json(http, &url)?.unwrap_or_default();

    select_latest(&index.versions, major, include_prerelease).ok_or_else(|| {
        BuildError::PackageVersionNotFound {
            package: package.to_string(),
            major,
        }
    })
}

/// Pick the highest version with the given major. Unparseable versions are skipped.
///
/// Returns the version text as the feed listed it.
pub fn select_latest(versions: &[String], major: u64, include_prerelease: bool) -> Option<String> {
    versions
        .iter()
        .filter_map(|v| parse_lenient(v).map(|parsed| (parsed, v)))
        .filter(|(parsed, _)| parsed.major == major)
        .filter(|(parsed, _)| include_prerelease || parsed.pre.is_empty())
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, original)| original.clone())
}

/// Parse `1`, `1.2` and `1.2.3[-pre][+build]`.
fn parse_lenient(version: &str) -> Option<Version> {
    let version = version.trim();
    if let Ok(v) = Version::parse(version) {
        return Some(v);
    }
    let core_end = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(core_end);
    let padded = match core.split('.').count() {
        1 => format!("{}.0.0{}", core, suffix),
        2 => format!("{}.0{}", core, suffix),
        _ => return None,
    };
    Version::parse(&padded).ok()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHttp;

    fn versions(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_latest_filters_major() {
        let list = versions(&["4.0.0", "5.0.0", "5.2.1", "5.10.0", "6.0.0"]);
        assert_eq!(select_latest(&list, 5, false).as_deref(), Some("5.10.0"));
        assert_eq!(select_latest(&list, 4, false).as_deref(), Some("4.0.0"));
        assert_eq!(select_latest(&list, 7, false), None);
    }

    #[test]
    fn test_select_latest_prerelease() {
        let list = versions(&["5.0.0", "5.1.0-beta.1"]);
        assert_eq!(select_latest(&list, 5, false).as_deref(), Some("5.0.0"));
        assert_eq!(select_latest(&list, 5, true).as_deref(), Some("5.1.0-beta.1"));
    }

    #[test]
    fn test_select_latest_skips_unparseable() {
        let list = versions(&["garbage", "5.0.0.1", "5.1"]);
        assert_eq!(select_latest(&list, 5, false).as_deref(), Some("5.1"));
    }

    #[test]
    fn test_latest_package_version_queries_lowercase_id() {
        let http = FakeHttp::new();
        http.serve(
            "https://feed/ext.storage/index.json",
            200,
            br#"{ "versions": ["5.0.0", "5.3.0"] }"#.to_vec(),
        );

        let version = latest_package_version(&http, "https://feed/", "Ext.Storage", 5, false).unwrap();
        assert_eq!(version, "5.3.0");
    }

    #[test]
    fn test_latest_package_version_not_found() {
        let http = FakeHttp::new();
        let err = latest_package_version(&http, "https://feed", "Ext.Missing", 1, false).unwrap_err();
        assert!(matches!(
            err,
            BuildError::PackageVersionNotFound { major: 1, .. }
        ));
    }
}
