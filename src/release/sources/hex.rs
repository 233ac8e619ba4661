//! Hex (Erlang/Elixir) API source

use serde::Deserialize;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{join_url, single_page};
use crate::release::timestamp::parse_timestamp;

/// Default base URL for the Hex API
pub const DEFAULT_BASE_URL: &str = "https://hex.pm";

/// Default base URL for Hex tarballs
pub const DEFAULT_REPO_URL: &str = "https://repo.hex.pm";

#[derive(Debug, Deserialize)]
struct HexPackage {
    html_url: Option<String>,
    #[serde(default)]
    releases: Vec<HexRelease>,
}

#[derive(Debug, Deserialize)]
struct HexRelease {
    version: String,
    inserted_at: Option<String>,
}

/// Source for Hex packages
pub struct HexSource {
    http: HttpClient,
    base_url: String,
    repo_url: String,
}

impl HexSource {
    pub fn new(http: HttpClient, base_url: &str, repo_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            repo_url: repo_url.to_string(),
        }
    }
}

impl ReleaseSource for HexSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Hex
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let http = self.http.clone();
        let repo_url = self.repo_url.clone();
        let name = package.name.clone();
        let url = join_url(&self.base_url, &format!("api/packages/{}", name));

        single_page(async move {
            let response: HexPackage = http.get_json(&url, &[]).await?;
            let homepage_url = response.html_url;
            Ok::<_, ReleaseError>(
                response
                    .releases
                    .into_iter()
                    .map(|release| {
                        let tarball = join_url(
                            &repo_url,
                            &format!("tarballs/{}-{}.tar", name, release.version),
                        );
                        let inserted = release.inserted_at.as_deref().and_then(parse_timestamp);
                        RawRelease::new(release.version)
                            .with_timestamp(inserted)
                            .with_source_url(Some(tarball))
                            .with_homepage_url(homepage_url.clone())
                    })
                    .collect(),
            )
        })
    }
}
