//! Bitbucket Cloud tag source
//!
//! The repository document links to its tag collection, which is paginated
//! through `next` links. Each step of the walk issues one request.

use futures::stream;
use serde::Deserialize;
use tracing::debug;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{empty, flatten_pages, join_url};
use crate::release::timestamp::parse_timestamp;

/// Default base URL for the Bitbucket Cloud API
pub const DEFAULT_API_URL: &str = "https://api.bitbucket.org";

/// Default base URL for Bitbucket repository pages
pub const DEFAULT_WEB_URL: &str = "https://bitbucket.org";

#[derive(Debug, Deserialize)]
struct Repository {
    #[serde(default)]
    links: RepositoryLinks,
}

#[derive(Debug, Default, Deserialize)]
struct RepositoryLinks {
    tags: Option<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsPage {
    #[serde(default)]
    values: Vec<Tag>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: Option<String>,
    /// Tagger date, only set on annotated tags
    date: Option<String>,
    target: Option<TagTarget>,
}

#[derive(Debug, Deserialize)]
struct TagTarget {
    date: Option<String>,
}

/// Position in the tag walk
enum Cursor {
    Repository,
    Page(String),
    Done,
}

#[derive(Debug, Clone)]
struct TagSession {
    http: HttpClient,
    api_url: String,
    web_url: String,
    owner: String,
    repo: String,
}

impl TagSession {
    fn repository_url(&self) -> String {
        join_url(
            &self.api_url,
            &format!("2.0/repositories/{}/{}", self.owner, self.repo),
        )
    }

    /// Take one step of the walk, returning its candidates and the next position
    async fn step(&self, cursor: Cursor) -> Result<Option<(Vec<RawRelease>, Cursor)>, ReleaseError> {
        match cursor {
            Cursor::Repository => {
                let repository: Repository = self.http.get_json(&self.repository_url(), &[]).await?;
                match repository.links.tags.and_then(|link| link.href) {
                    Some(href) => Ok(Some((Vec::new(), Cursor::Page(href)))),
                    None => {
                        debug!("No tag link for {}/{}", self.owner, self.repo);
                        Ok(None)
                    }
                }
            }
            Cursor::Page(url) => {
                let page: TagsPage = self.http.get_json(&url, &[]).await?;
                let next = page.next.map_or(Cursor::Done, Cursor::Page);
                let rows = page
                    .values
                    .into_iter()
                    .filter_map(|tag| self.candidate(tag))
                    .collect();
                Ok(Some((rows, next)))
            }
            Cursor::Done => Ok(None),
        }
    }

    fn candidate(&self, tag: Tag) -> Option<RawRelease> {
        let name = tag.name.filter(|name| !name.is_empty())?;
        let timestamp = tag
            .target
            .and_then(|target| target.date)
            .or(tag.date)
            .as_deref()
            .and_then(parse_timestamp);
        let download_url = format!(
            "{}/downloads/{}-{}.tar.gz",
            self.repository_url(),
            self.repo,
            name
        );
        let homepage_url = format!(
            "{}/{}/{}",
            self.web_url.trim_end_matches('/'),
            self.owner,
            self.repo
        );

        Some(
            RawRelease::new(name)
                .with_timestamp(timestamp)
                .with_source_url(Some(download_url))
                .with_homepage_url(Some(homepage_url)),
        )
    }
}

/// Source for the tags of Bitbucket Cloud repositories
pub struct BitbucketTagSource {
    http: HttpClient,
    api_url: String,
    web_url: String,
}

impl BitbucketTagSource {
    pub fn new(http: HttpClient, api_url: &str, web_url: &str) -> Self {
        Self {
            http,
            api_url: api_url.to_string(),
            web_url: web_url.to_string(),
        }
    }
}

impl ReleaseSource for BitbucketTagSource {
    fn kind(&self) -> SourceKind {
        SourceKind::BitbucketTags
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let Some(owner) = package.namespace.clone() else {
            debug!("Bitbucket repository {} has no workspace", package.name);
            return empty();
        };
        let session = TagSession {
            http: self.http.clone(),
            api_url: self.api_url.clone(),
            web_url: self.web_url.clone(),
            owner,
            repo: package.name.clone(),
        };

        let pages = stream::try_unfold(Cursor::Repository, move |cursor| {
            let session = session.clone();
            async move { session.step(cursor).await }
        });

        flatten_pages(pages)
    }
}
