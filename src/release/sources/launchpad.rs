//! Launchpad source for Ubuntu source packages

use futures::stream;
use serde::Deserialize;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{flatten_pages, join_url, strip_default_epoch};
use crate::release::timestamp::parse_timestamp;

/// Default base URL for the Launchpad API
pub const DEFAULT_BASE_URL: &str = "https://api.launchpad.net";

#[derive(Debug, Deserialize)]
struct PublishedSources {
    #[serde(default)]
    entries: Vec<PublishedSource>,
    next_collection_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublishedSource {
    source_package_version: Option<String>,
    date_published: Option<String>,
}

/// Source for Ubuntu packages published in the primary archive
pub struct LaunchpadSource {
    http: HttpClient,
    base_url: String,
}

impl LaunchpadSource {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

impl ReleaseSource for LaunchpadSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Launchpad
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let http = self.http.clone();
        let first_page = join_url(
            &self.base_url,
            &format!(
                "1.0/ubuntu/+archive/primary?ws.op=getPublishedSources&source_name={}&exact_match=true",
                urlencoding::encode(&package.name)
            ),
        );

        let pages = stream::try_unfold(Some(first_page), move |next| {
            let http = http.clone();
            async move {
                let Some(url) = next else {
                    return Ok(None);
                };
                let page: PublishedSources = http.get_json(&url, &[]).await?;
                // An empty page ends the walk even if it links to another one
                let next = page
                    .next_collection_link
                    .filter(|_| !page.entries.is_empty());
                let rows = page.entries.into_iter().filter_map(candidate).collect();
                Ok::<_, ReleaseError>(Some((rows, next)))
            }
        });

        flatten_pages(pages)
    }
}

fn candidate(entry: PublishedSource) -> Option<RawRelease> {
    let version = entry.source_package_version?;
    let published = entry.date_published.as_deref().and_then(parse_timestamp);
    Some(RawRelease::new(strip_default_epoch(&version)).with_timestamp(published))
}
