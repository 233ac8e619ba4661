//! Packagist (Composer) metadata source

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{empty, join_url, single_page};
use crate::release::timestamp::parse_timestamp;

/// Default base URL for the Packagist repository
pub const DEFAULT_BASE_URL: &str = "https://repo.packagist.org";

#[derive(Debug, Deserialize)]
struct PackagistResponse {
    /// Version manifests keyed by package name, then by version
    #[serde(default)]
    packages: IndexMap<String, IndexMap<String, Value>>,
}

/// Source for Composer packages on Packagist
pub struct ComposerSource {
    http: HttpClient,
    base_url: String,
}

impl ComposerSource {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

impl ReleaseSource for ComposerSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Composer
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        if package.namespace.is_none() {
            debug!("Composer package {} has no vendor namespace", package.name);
            return empty();
        }
        let http = self.http.clone();
        let name = package.qualified_name();
        let url = join_url(&self.base_url, &format!("p/{}.json", name));

        single_page(async move {
            let mut response: PackagistResponse = http.get_json(&url, &[]).await?;
            let versions = response.packages.shift_remove(&name).unwrap_or_default();
            Ok::<_, ReleaseError>(releases_from_versions(versions))
        })
    }
}

fn releases_from_versions(versions: IndexMap<String, Value>) -> Vec<RawRelease> {
    versions
        .into_iter()
        // Branch aliases such as `dev-main` or `2.x-dev` are not releases
        .filter(|(version, _)| !version.contains("dev"))
        .map(|(version, manifest)| {
            let time = manifest
                .get("time")
                .and_then(Value::as_str)
                .and_then(parse_timestamp);
            let dist_url = manifest
                .pointer("/dist/url")
                .and_then(Value::as_str)
                .map(String::from);
            let homepage_url = manifest
                .get("homepage")
                .and_then(Value::as_str)
                .map(String::from);
            RawRelease::new(version)
                .with_timestamp(time)
                .with_source_url(dist_url)
                .with_homepage_url(homepage_url)
        })
        .collect()
}
