//! sources.debian.org source

use serde::Deserialize;
use tracing::debug;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{join_url, single_page, strip_default_epoch};

/// Default base URL for sources.debian.org
pub const DEFAULT_BASE_URL: &str = "https://sources.debian.org";

#[derive(Debug, Deserialize)]
struct SourcePackage {
    /// Set instead of `versions` when the package is unknown
    error: Option<serde_json::Value>,
    #[serde(default)]
    versions: Vec<SourceVersion>,
}

#[derive(Debug, Deserialize)]
struct SourceVersion {
    version: String,
}

/// Source for Debian source packages
pub struct DebianSource {
    http: HttpClient,
    base_url: String,
}

impl DebianSource {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

impl ReleaseSource for DebianSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Debian
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let http = self.http.clone();
        let url = join_url(&self.base_url, &format!("api/src/{}/", package.name));
        let homepage_url = join_url(&self.base_url, &format!("src/{}/", package.name));

        single_page(async move {
            let response: SourcePackage = http.get_json(&url, &[]).await?;
            if let Some(error) = response.error {
                debug!("sources.debian.org has no {}: {}", url, error);
                return Ok(Vec::new());
            }
            Ok::<_, ReleaseError>(
                response
                    .versions
                    .into_iter()
                    .map(|v| {
                        RawRelease::new(strip_default_epoch(&v.version))
                            .with_homepage_url(Some(homepage_url.clone()))
                    })
                    .collect(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use mockito::Server;

    #[tokio::test]
    async fn enumerate_strips_default_epoch() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/api/src/dpkg/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"package": "dpkg", "versions": [
                    {"area": "main", "suites": ["sid"], "version": "1.22.4"},
                    {"area": "main", "suites": ["bookworm"], "version": "0:1.21.22"},
                    {"area": "main", "suites": [], "version": "1:1.15.0"}
                ]}"#,
            )
            .create_async()
            .await;

        let source = DebianSource::new(HttpClient::new("test").unwrap(), &server.url());
        let rows: Vec<RawRelease> = source
            .enumerate(&PackageId::new("deb", "dpkg").with_namespace("debian"), &ExtractionRule::new())
            .try_collect()
            .await
            .unwrap();

        mock.assert_async().await;
        let versions: Vec<&str> = rows.iter().map(|r| r.name_token.as_str()).collect();
        assert_eq!(versions, vec!["1.22.4", "1.21.22", "1:1.15.0"]);
        assert_eq!(
            rows[0].homepage_url,
            Some(format!("{}/src/dpkg/", server.url()))
        );
    }

    #[tokio::test]
    async fn enumerate_returns_nothing_for_error_document() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/api/src/nope/")
            .with_status(200)
            .with_body(r#"{"error": 404}"#)
            .create_async()
            .await;

        let source = DebianSource::new(HttpClient::new("test").unwrap(), &server.url());
        let rows: Vec<RawRelease> = source
            .enumerate(&PackageId::new("deb", "nope").with_namespace("debian"), &ExtractionRule::new())
            .try_collect()
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(rows.is_empty());
    }
}
