//! PyPI JSON API source

use indexmap::IndexMap;
use serde::Deserialize;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{join_url, single_page};
use crate::release::timestamp::parse_timestamp;

/// Default base URL for PyPI
pub const DEFAULT_BASE_URL: &str = "https://pypi.org";

/// Response from PyPI JSON API
#[derive(Debug, Deserialize)]
struct PypiResponse {
    #[serde(default)]
    info: PypiInfo,
    /// Release files keyed by version, in upstream order
    #[serde(default)]
    releases: IndexMap<String, Vec<PypiFile>>,
}

#[derive(Debug, Default, Deserialize)]
struct PypiInfo {
    home_page: Option<String>,
    project_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PypiFile {
    url: Option<String>,
    upload_time_iso_8601: Option<String>,
}

/// Source for PyPI packages
pub struct PypiSource {
    http: HttpClient,
    base_url: String,
}

impl PypiSource {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

impl ReleaseSource for PypiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Pypi
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let http = self.http.clone();
        let url = join_url(&self.base_url, &format!("pypi/{}/json", package.name));

        single_page(async move {
            let response: PypiResponse = http.get_json(&url, &[]).await?;
            Ok::<_, ReleaseError>(releases_from_response(response))
        })
    }
}

fn releases_from_response(response: PypiResponse) -> Vec<RawRelease> {
    let homepage_url = response
        .info
        .home_page
        .filter(|url| !url.is_empty())
        .or(response.info.project_url);

    response
        .releases
        .into_iter()
        // Versions without files were yanked or never uploaded
        .filter(|(_, files)| !files.is_empty())
        .map(|(version, files)| {
            let latest_upload = files
                .iter()
                .filter_map(|file| file.upload_time_iso_8601.as_deref())
                .filter_map(parse_timestamp)
                .max();
            let download_url = files.iter().find_map(|file| file.url.clone());
            RawRelease::new(version)
                .with_timestamp(latest_upload)
                .with_source_url(download_url)
                .with_homepage_url(homepage_url.clone())
        })
        .collect()
}
