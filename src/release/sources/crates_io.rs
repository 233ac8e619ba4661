//! crates.io API source

use serde::Deserialize;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{join_url, single_page};
use crate::release::timestamp::parse_timestamp;

/// Default base URL for crates.io
pub const DEFAULT_BASE_URL: &str = "https://crates.io";

#[derive(Debug, Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: Option<CrateInfo>,
    #[serde(default)]
    versions: Vec<CrateVersion>,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    homepage: Option<String>,
    repository: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrateVersion {
    num: String,
    dl_path: Option<String>,
    updated_at: Option<String>,
}

/// Source for crates published on crates.io
pub struct CratesIoSource {
    http: HttpClient,
    base_url: String,
}

impl CratesIoSource {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

impl ReleaseSource for CratesIoSource {
    fn kind(&self) -> SourceKind {
        SourceKind::CratesIo
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let http = self.http.clone();
        let base_url = self.base_url.clone();
        let url = join_url(&self.base_url, &format!("api/v1/crates/{}", package.name));

        single_page(async move {
            let response: CrateResponse = http
                .get_json(&url, &[("Accept", "application/json")])
                .await?;
            Ok::<_, ReleaseError>(releases_from_response(&base_url, response))
        })
    }
}

fn releases_from_response(base_url: &str, response: CrateResponse) -> Vec<RawRelease> {
    let homepage_url = response
        .krate
        .and_then(|info| info.homepage.or(info.repository));

    response
        .versions
        .into_iter()
        .map(|version| {
            let download_url = version.dl_path.map(|path| join_url(base_url, &path));
            let updated = version.updated_at.as_deref().and_then(parse_timestamp);
            RawRelease::new(version.num)
                .with_timestamp(updated)
                .with_source_url(download_url)
                .with_homepage_url(homepage_url.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use mockito::Server;

    #[tokio::test]
    async fn enumerate_returns_versions_with_download_paths() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/api/v1/crates/serde")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "crate": {"name": "serde", "homepage": "https://serde.rs", "repository": "https://github.com/serde-rs/serde"},
                    "versions": [
                        {"num": "1.0.195", "dl_path": "/api/v1/crates/serde/1.0.195/download", "updated_at": "2024-01-08T03:40:52.191374+00:00", "yanked": false},
                        {"num": "1.0.194", "dl_path": "/api/v1/crates/serde/1.0.194/download", "updated_at": "2024-01-02T21:32:19.436497+00:00", "yanked": false}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let source = CratesIoSource::new(HttpClient::new("test").unwrap(), &server.url());
        let rows: Vec<RawRelease> = source
            .enumerate(&PackageId::new("cargo", "serde"), &ExtractionRule::new())
            .try_collect()
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name_token, "1.0.195");
        assert_eq!(
            rows[0].source_url,
            Some(format!("{}/api/v1/crates/serde/1.0.195/download", server.url()))
        );
        assert_eq!(rows[0].timestamp, parse_timestamp("2024-01-08T03:40:52Z"));
        assert_eq!(rows[0].homepage_url.as_deref(), Some("https://serde.rs"));
    }

    #[tokio::test]
    async fn enumerate_returns_not_found_for_unknown_crate() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/api/v1/crates/nonexistent-crate-xyz")
            .with_status(404)
            .with_body(r#"{"errors":[{"detail":"Not Found"}]}"#)
            .create_async()
            .await;

        let source = CratesIoSource::new(HttpClient::new("test").unwrap(), &server.url());
        let result: Result<Vec<RawRelease>, ReleaseError> = source
            .enumerate(&PackageId::new("cargo", "nonexistent-crate-xyz"), &ExtractionRule::new())
            .try_collect()
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ReleaseError::NotFound(_))));
    }
}
