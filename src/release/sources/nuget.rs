//! NuGet registration API source
//!
//! The registration index lists pages of versions. Small packages have
//! their items inlined in the index; large ones only carry a page `@id`
//! that is fetched when the stream reaches that page.

use futures::stream::{self, StreamExt};
use serde::Deserialize;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{flatten_pages, join_url};
use crate::release::timestamp::parse_timestamp;

/// Default base URL for the NuGet v3 API
pub const DEFAULT_BASE_URL: &str = "https://api.nuget.org";

#[derive(Debug, Deserialize)]
struct RegistrationIndex {
    #[serde(default)]
    items: Vec<RegistrationPage>,
}

#[derive(Debug, Deserialize)]
struct RegistrationPage {
    #[serde(rename = "@id")]
    id: String,
    /// Absent when the page has to be fetched from `id`
    items: Option<Vec<RegistrationLeaf>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationLeaf {
    catalog_entry: Option<CatalogEntry>,
    package_content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntry {
    version: Option<String>,
    published: Option<String>,
    project_url: Option<String>,
}

/// Source for NuGet packages
pub struct NuGetSource {
    http: HttpClient,
    base_url: String,
}

impl NuGetSource {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

impl ReleaseSource for NuGetSource {
    fn kind(&self) -> SourceKind {
        SourceKind::NuGet
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let http = self.http.clone();
        let url = join_url(
            &self.base_url,
            &format!(
                "v3/registration5-semver1/{}/index.json",
                package.name.to_lowercase()
            ),
        );

        let index = stream::once({
            let http = http.clone();
            async move { http.get_json::<RegistrationIndex>(&url, &[]).await }
        });

        let pages = index
            .map(move |index| match index {
                Ok(index) => {
                    let http = http.clone();
                    stream::iter(index.items)
                        .then(move |page| {
                            let http = http.clone();
                            async move { page_releases(&http, page).await }
                        })
                        .boxed()
                }
                Err(e) => stream::once(async move { Err(e) }).boxed(),
            })
            .flatten();

        flatten_pages(pages)
    }
}

async fn page_releases(
    http: &HttpClient,
    page: RegistrationPage,
) -> Result<Vec<RawRelease>, ReleaseError> {
    let leaves = match page.items {
        Some(items) => items,
        None => {
            http.get_json::<RegistrationPage>(&page.id, &[])
                .await?
                .items
                .unwrap_or_default()
        }
    };

    Ok(leaves.into_iter().filter_map(candidate).collect())
}

fn candidate(leaf: RegistrationLeaf) -> Option<RawRelease> {
    let entry = leaf.catalog_entry?;
    let version = entry.version.filter(|v| !v.is_empty())?;
    let published = entry.published.as_deref().and_then(parse_timestamp);

    Some(
        RawRelease::new(version)
            .with_timestamp(published)
            .with_source_url(leaf.package_content)
            .with_homepage_url(entry.project_url),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use mockito::Server;

    fn leaf(version: &str, published: &str) -> String {
        format!(
            r#"{{"catalogEntry": {{"version": "{0}", "published": "{1}"}}, "packageContent": "https://pkgs.test/{0}.nupkg"}}"#,
            version, published
        )
    }

    #[tokio::test]
    async fn enumerate_reads_inlined_and_remote_pages_in_order() {
        let mut server = Server::new_async().await;
        let remote_page = format!("{}/v3/registration5-semver1/newtonsoft.json/page/2.json", server.url());

        let index = server
            .mock("GET", "/v3/registration5-semver1/newtonsoft.json/index.json")
            .with_status(200)
            .with_body(format!(
                r#"{{"items": [
                    {{"@id": "https://unused.test/page1", "items": [{}, {}]}},
                    {{"@id": "{}"}}
                ]}}"#,
                leaf("12.0.1", "2018-11-27T20:00:00+00:00"),
                leaf("12.0.2", "2019-04-22T01:00:00+00:00"),
                remote_page
            ))
            .create_async()
            .await;
        let page = server
            .mock("GET", "/v3/registration5-semver1/newtonsoft.json/page/2.json")
            .with_status(200)
            .with_body(format!(
                r#"{{"@id": "{}", "items": [{}]}}"#,
                remote_page,
                leaf("13.0.3", "2023-03-08T07:42:54+00:00")
            ))
            .create_async()
            .await;

        let source = NuGetSource::new(HttpClient::new("test").unwrap(), &server.url());
        let rows: Vec<RawRelease> = source
            .enumerate(&PackageId::new("nuget", "Newtonsoft.Json"), &ExtractionRule::new())
            .try_collect()
            .await
            .unwrap();

        index.assert_async().await;
        page.assert_async().await;
        let versions: Vec<&str> = rows.iter().map(|r| r.name_token.as_str()).collect();
        assert_eq!(versions, vec!["12.0.1", "12.0.2", "13.0.3"]);
        assert_eq!(rows[2].timestamp, parse_timestamp("2023-03-08T07:42:54Z"));
        assert_eq!(rows[2].source_url.as_deref(), Some("https://pkgs.test/13.0.3.nupkg"));
    }

    #[tokio::test]
    async fn failed_remote_page_ends_enumeration() {
        let mut server = Server::new_async().await;
        let first_page = format!("{}/page/1.json", server.url());
        let second_page = format!("{}/page/2.json", server.url());

        let _index = server
            .mock("GET", "/v3/registration5-semver1/newtonsoft.json/index.json")
            .with_status(200)
            .with_body(format!(
                r#"{{"items": [{{"@id": "{}"}}, {{"@id": "{}"}}]}}"#,
                first_page, second_page
            ))
            .create_async()
            .await;
        let first = server
            .mock("GET", "/page/1.json")
            .with_status(502)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/page/2.json")
            .with_status(200)
            .with_body(format!(
                r#"{{"@id": "{}", "items": [{}]}}"#,
                second_page,
                leaf("13.0.3", "2023-03-08T07:42:54+00:00")
            ))
            .expect(0)
            .create_async()
            .await;

        let source = NuGetSource::new(HttpClient::new("test").unwrap(), &server.url());
        let results: Vec<Result<RawRelease, ReleaseError>> = source
            .enumerate(&PackageId::new("nuget", "Newtonsoft.Json"), &ExtractionRule::new())
            .collect()
            .await;

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(ReleaseError::UnexpectedStatus { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn enumerate_does_not_fetch_remote_page_before_inlined_items_are_consumed() {
        let mut server = Server::new_async().await;
        let remote_page = format!("{}/page/2.json", server.url());

        let _index = server
            .mock("GET", "/v3/registration5-semver1/newtonsoft.json/index.json")
            .with_status(200)
            .with_body(format!(
                r#"{{"items": [{{"@id": "p1", "items": [{}]}}, {{"@id": "{}"}}]}}"#,
                leaf("12.0.1", "2018-11-27T20:00:00+00:00"),
                remote_page
            ))
            .create_async()
            .await;
        let page = server
            .mock("GET", "/page/2.json")
            .expect(0)
            .create_async()
            .await;

        let source = NuGetSource::new(HttpClient::new("test").unwrap(), &server.url());
        let mut stream =
            source.enumerate(&PackageId::new("nuget", "Newtonsoft.Json"), &ExtractionRule::new());
        let first = stream.next().await.unwrap().unwrap();
        drop(stream);

        page.assert_async().await;
        assert_eq!(first.name_token, "12.0.1");
    }
}
