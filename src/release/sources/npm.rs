//! npm registry source

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{join_url, single_page};
use crate::release::timestamp::parse_timestamp;

/// Default base URL for npm registry
pub const DEFAULT_BASE_URL: &str = "https://registry.npmjs.org";

/// Response from npm registry API
#[derive(Debug, Deserialize)]
struct NpmPackageResponse {
    #[serde(default)]
    versions: IndexMap<String, serde_json::Value>,
    /// Publication time keyed by version, plus `created` and `modified`
    #[serde(default)]
    time: HashMap<String, String>,
    homepage: Option<String>,
}

/// Source for npm packages
pub struct NpmSource {
    http: HttpClient,
    base_url: String,
}

impl NpmSource {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    /// Encode package name for URL (handles scoped packages)
    fn encode_package_name(package: &PackageId) -> String {
        match package.namespace.as_deref() {
            // Scoped package: @scope/name -> @scope%2Fname
            Some(scope) if scope.starts_with('@') => format!("{}%2F{}", scope, package.name),
            Some(scope) => format!("@{}%2F{}", scope, package.name),
            None => package.name.clone(),
        }
    }
}

impl ReleaseSource for NpmSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Npm
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let http = self.http.clone();
        let url = join_url(&self.base_url, &Self::encode_package_name(package));

        single_page(async move {
            let response: NpmPackageResponse = http.get_json(&url, &[]).await?;
            Ok::<_, ReleaseError>(releases_from_response(response))
        })
    }
}

fn releases_from_response(response: NpmPackageResponse) -> Vec<RawRelease> {
    let NpmPackageResponse {
        versions,
        time,
        homepage,
    } = response;

    versions
        .into_iter()
        .map(|(version, manifest)| {
            let tarball = manifest
                .pointer("/dist/tarball")
                .and_then(|v| v.as_str())
                .map(String::from);
            let published = time.get(&version).and_then(|t| parse_timestamp(t));
            RawRelease::new(version)
                .with_timestamp(published)
                .with_source_url(tarball)
                .with_homepage_url(homepage.clone())
        })
        .collect()
}
