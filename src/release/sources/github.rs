//! GitHub tag source over the GraphQL API

use futures::stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::flatten_pages;
use crate::release::timestamp::parse_timestamp;

/// Default base URL for the GitHub API
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default host of tag archive downloads
pub const DEFAULT_WEB_URL: &str = "https://github.com";

/// Message GitHub answers with when the bearer token is rejected
const BAD_CREDENTIALS: &str = "Bad credentials";

const TAGS_QUERY: &str = r#"query getTags($name: String!, $owner: String!, $after: String) {
  repository(name: $name, owner: $owner) {
    refs(refPrefix: "refs/tags/", first: 100, after: $after) {
      pageInfo {
        endCursor
        hasNextPage
      }
      nodes {
        name
        target {
          ... on Commit {
            committedDate
          }
          ... on Tag {
            target {
              ... on Commit {
                committedDate
              }
            }
          }
        }
      }
    }
  }
}"#;

#[derive(Debug, Serialize)]
struct TagsRequest<'a> {
    query: &'static str,
    variables: TagsVariables<'a>,
}

#[derive(Debug, Serialize)]
struct TagsVariables<'a> {
    owner: &'a str,
    name: &'a str,
    after: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    data: Option<TagsData>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TagsData {
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    refs: Refs,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Refs {
    page_info: PageInfo,
    /// Kept untyped so one malformed node only drops that tag
    #[serde(default)]
    nodes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct TagNode {
    name: String,
    target: Option<TagTarget>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagTarget {
    committed_date: Option<String>,
    target: Option<Box<TagTarget>>,
}

impl TagTarget {
    /// Annotated tags point at a tag object whose own target is the commit
    fn committed_date(&self) -> Option<&str> {
        self.committed_date
            .as_deref()
            .or_else(|| self.target.as_ref()?.committed_date.as_deref())
    }
}

/// Position of a paginated tag walk
enum Cursor {
    Start,
    After(String),
    Done,
}

/// Everything one enumeration needs, moved into the page stream
#[derive(Clone)]
struct TagSession {
    http: HttpClient,
    api_url: String,
    web_url: String,
    token: Option<String>,
    owner: String,
    repo: String,
}

impl TagSession {
    /// Fetch one page of tags, returning its candidates and the next cursor
    async fn fetch_page(&self, after: Option<&str>) -> Result<(Vec<RawRelease>, Cursor), ReleaseError> {
        let token = self
            .token
            .as_deref()
            .ok_or(ReleaseError::MissingCredential)?;
        let authorization = format!("bearer {}", token);
        let request = TagsRequest {
            query: TAGS_QUERY,
            variables: TagsVariables {
                owner: &self.owner,
                name: &self.repo,
                after,
            },
        };
        let url = format!("{}/graphql", self.api_url.trim_end_matches('/'));

        let response: TagsResponse = self
            .http
            .post_json(&url, &[("Authorization", authorization.as_str())], &request)
            .await?;

        if response.message.as_deref() == Some(BAD_CREDENTIALS) {
            return Err(ReleaseError::InvalidCredential(BAD_CREDENTIALS.to_string()));
        }
        if !response.errors.is_empty() {
            let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
            warn!("GitHub GraphQL errors for {}/{}: {:?}", self.owner, self.repo, messages);
            return Err(ReleaseError::GraphQl(messages.join("; ")));
        }

        let refs = response
            .data
            .and_then(|data| data.repository)
            .map(|repository| repository.refs)
            .ok_or_else(|| ReleaseError::NotFound(format!("{}/{}", self.owner, self.repo)))?;

        let next = match (refs.page_info.has_next_page, refs.page_info.end_cursor) {
            (true, Some(cursor)) => Cursor::After(cursor),
            _ => Cursor::Done,
        };
        let rows = refs
            .nodes
            .into_iter()
            .filter_map(|node| match serde_json::from_value::<TagNode>(node) {
                Ok(node) => Some(self.candidate(node)),
                Err(e) => {
                    debug!("Skipping malformed tag node: {}", e);
                    None
                }
            })
            .collect();

        Ok((rows, next))
    }

    fn candidate(&self, node: TagNode) -> RawRelease {
        let timestamp = node
            .target
            .as_ref()
            .and_then(TagTarget::committed_date)
            .and_then(parse_timestamp);
        let download_url = format!(
            "{}/{}/{}/archive/refs/tags/{}.tar.gz",
            self.web_url.trim_end_matches('/'),
            self.owner,
            self.repo,
            node.name
        );

        RawRelease::new(node.name)
            .with_timestamp(timestamp)
            .with_source_url(Some(download_url))
            .with_homepage_url(Some(self.homepage_url()))
    }

    fn homepage_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.web_url.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }
}

/// Source for the tags of one GitHub repository, newest page first as the API returns them
///
/// The repository is fixed at construction so aliased packages (such as
/// `generic/miniupnpc`) can read another repository's tag stream.
pub struct GitHubTagSource {
    session: TagSession,
}

impl GitHubTagSource {
    pub fn new(
        http: HttpClient,
        token: Option<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            session: TagSession {
                http,
                api_url: DEFAULT_API_URL.to_string(),
                web_url: DEFAULT_WEB_URL.to_string(),
                token,
                owner: owner.into(),
                repo: repo.into(),
            },
        }
    }

    pub fn with_endpoints(mut self, api_url: impl Into<String>, web_url: impl Into<String>) -> Self {
        self.session.api_url = api_url.into();
        self.session.web_url = web_url.into();
        self
    }
}

impl ReleaseSource for GitHubTagSource {
    fn kind(&self) -> SourceKind {
        SourceKind::GitHubTags
    }

    fn enumerate(&self, _package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let session = self.session.clone();

        let pages = stream::try_unfold(Cursor::Start, move |cursor| {
            let session = session.clone();
            async move {
                let after = match cursor {
                    Cursor::Start => None,
                    Cursor::After(cursor) => Some(cursor),
                    Cursor::Done => return Ok(None),
                };
                let (rows, next) = session.fetch_page(after.as_deref()).await?;
                Ok::<_, ReleaseError>(Some((rows, next)))
            }
        });

        flatten_pages(pages)
    }
}
