//! HTML directory index sources
//!
//! The flat source reads one listing page. The nested source reads the
//! listing at the base URL, then one listing per non-ignored sub-directory,
//! fetching each sub-directory only when the previous one is exhausted.

use futures::stream::{self, StreamExt};
use tracing::debug;
use url::Url;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::listing::ListingParser;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{failed, flatten_pages};

/// State of one listing walk: the HTTP client and the page parser
#[derive(Debug, Clone)]
struct ListingSession {
    http: HttpClient,
    parser: ListingParser,
}

impl ListingSession {
    /// Fetch `dir_url` and return every file row as a candidate
    async fn files(&self, dir_url: &str) -> Result<Vec<RawRelease>, ReleaseError> {
        let base = parse_url(dir_url)?;
        let html = self.http.get_text(dir_url, &[]).await?;

        let rows: Vec<RawRelease> = self
            .parser
            .parse(&html)
            .into_iter()
            .filter(|entry| !entry.is_directory)
            .map(|entry| {
                let download_url = base.join(&entry.name).ok().map(String::from);
                RawRelease::new(entry.name)
                    .with_timestamp(entry.modified)
                    .with_source_url(download_url)
                    .with_homepage_url(Some(dir_url.to_string()))
            })
            .collect();

        debug!("Listed {} files under {}", rows.len(), dir_url);
        Ok(rows)
    }

    /// Fetch `base_url` and return the URLs of its non-ignored sub-directories
    async fn subdirectories(
        &self,
        base_url: &str,
        rule: &ExtractionRule,
    ) -> Result<Vec<String>, ReleaseError> {
        let base = parse_url(base_url)?;
        let html = self.http.get_text(base_url, &[]).await?;

        Ok(self
            .parser
            .parse(&html)
            .into_iter()
            .filter(|entry| entry.is_directory)
            .filter(|entry| {
                let ignored = rule.is_ignored(&entry.name);
                if ignored {
                    debug!("Skipping ignored directory {}", entry.name);
                }
                !ignored
            })
            .filter_map(|entry| base.join(&entry.name).ok().map(String::from))
            .collect())
    }
}

fn parse_url(url: &str) -> Result<Url, ReleaseError> {
    Url::parse(url).map_err(|e| ReleaseError::Config(format!("invalid listing URL {}: {}", url, e)))
}

fn base_url(rule: &ExtractionRule) -> Result<String, ReleaseError> {
    rule.base_url()
        .map(str::to_string)
        .ok_or_else(|| ReleaseError::Config("directory listing rule has no base URL".to_string()))
}

/// Source for packages released as archives in a single directory index
pub struct DirectoryListingSource {
    session: ListingSession,
}

impl DirectoryListingSource {
    pub fn new(http: HttpClient) -> Self {
        Self {
            session: ListingSession {
                http,
                parser: ListingParser::new(),
            },
        }
    }
}

impl ReleaseSource for DirectoryListingSource {
    fn kind(&self) -> SourceKind {
        SourceKind::DirectoryListing
    }

    fn enumerate(&self, _package: &PackageId, rule: &ExtractionRule) -> RawReleaseStream {
        let dir_url = match base_url(rule) {
            Ok(url) => url,
            Err(e) => return failed(e),
        };
        let session = self.session.clone();

        flatten_pages(stream::once(async move { session.files(&dir_url).await }))
    }
}

/// Source for packages whose archives are split across sub-directories
/// (`v2.39/`, `v2.40/`, ...) of one directory index
pub struct NestedDirectoryListingSource {
    session: ListingSession,
}

impl NestedDirectoryListingSource {
    pub fn new(http: HttpClient) -> Self {
        Self {
            session: ListingSession {
                http,
                parser: ListingParser::new(),
            },
        }
    }
}

impl ReleaseSource for NestedDirectoryListingSource {
    fn kind(&self) -> SourceKind {
        SourceKind::NestedDirectoryListing
    }

    fn enumerate(&self, _package: &PackageId, rule: &ExtractionRule) -> RawReleaseStream {
        let root_url = match base_url(rule) {
            Ok(url) => url,
            Err(e) => return failed(e),
        };
        let session = self.session.clone();
        let rule = rule.clone();

        let pages = stream::once({
            let session = session.clone();
            async move { session.subdirectories(&root_url, &rule).await }
        })
        .map(move |subdirectories| {
            let session = session.clone();
            match subdirectories {
                Ok(urls) => stream::iter(urls)
                    .then(move |dir_url| {
                        let session = session.clone();
                        async move { session.files(&dir_url).await }
                    })
                    .boxed(),
                Err(e) => stream::once(async move { Err(e) }).boxed(),
            }
        })
        .flatten();

        flatten_pages(pages)
    }
}
