//! Go module proxy source

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{join_url, stop_after_error};
use crate::release::timestamp::parse_timestamp;

/// Default base URL for Go proxy
pub const DEFAULT_BASE_URL: &str = "https://proxy.golang.org";

/// Where module documentation is published
const PKG_GO_DEV: &str = "https://pkg.go.dev";

/// Response from the `/@v/{version}.info` endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionInfo {
    time: Option<String>,
}

/// One line of a `/@v/list` answer: `v1.3.0` or `v1.3.0 2019-04-19T01:47:04Z`
#[derive(Debug, Clone, PartialEq, Eq)]
struct ListedVersion {
    version: String,
    time: Option<String>,
}

#[derive(Clone)]
struct ProxySession {
    http: HttpClient,
    base_url: String,
    module: String,
}

impl ProxySession {
    /// Fetch the version list, retrying once with the module root when the
    /// path names a package inside a module
    async fn list(&self) -> Result<(String, Vec<ListedVersion>), ReleaseError> {
        let escaped = encode_module_path(&self.module);
        match self.fetch_list(&escaped).await {
            Err(ReleaseError::NotFound(url)) => match trim_module_path(&escaped) {
                Some(trimmed) if trimmed != escaped => {
                    debug!("{} not found, retrying with module root {}", url, trimmed);
                    let versions = self.fetch_list(&trimmed).await?;
                    Ok((trimmed, versions))
                }
                _ => Err(ReleaseError::NotFound(url)),
            },
            Err(e) => Err(e),
            Ok(versions) => Ok((escaped, versions)),
        }
    }

    async fn fetch_list(&self, escaped_module: &str) -> Result<Vec<ListedVersion>, ReleaseError> {
        let url = join_url(&self.base_url, &format!("{}/@v/list", escaped_module));
        let body = self.http.get_text(&url, &[]).await?;
        Ok(body.lines().filter_map(parse_list_line).collect())
    }

    /// Build the candidate for one listed version, asking `.info` for its
    /// time when the list line carried none
    async fn candidate(
        &self,
        escaped_module: &str,
        listed: ListedVersion,
    ) -> Result<RawRelease, ReleaseError> {
        let escaped_version = encode_module_path(&listed.version);
        let version_url = |suffix: &str| {
            join_url(
                &self.base_url,
                &format!("{}/@v/{}.{}", escaped_module, escaped_version, suffix),
            )
        };

        let time = match listed.time {
            Some(time) => Some(time),
            None => {
                let info: VersionInfo = self.http.get_json(&version_url("info"), &[]).await?;
                if info.time.is_none() {
                    warn!("No time in version info for {}@{}", self.module, listed.version);
                }
                info.time
            }
        };

        Ok(RawRelease::new(listed.version.clone())
            .with_timestamp(time.as_deref().and_then(parse_timestamp))
            .with_source_url(Some(version_url("zip")))
            .with_homepage_url(Some(format!("{}/{}", PKG_GO_DEV, self.module))))
    }
}

/// Source for Go modules served by a module proxy
pub struct GoProxySource {
    http: HttpClient,
    base_url: String,
}

impl GoProxySource {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

impl ReleaseSource for GoProxySource {
    fn kind(&self) -> SourceKind {
        SourceKind::GoProxy
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let session = ProxySession {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            module: package.qualified_name(),
        };

        let candidates = stream::once({
            let session = session.clone();
            async move { session.list().await }
        })
        .map(move |listing| match listing {
            Ok((escaped_module, versions)) => {
                let session = session.clone();
                stream::iter(versions)
                    .then(move |listed| {
                        let session = session.clone();
                        let escaped_module = escaped_module.clone();
                        async move { session.candidate(&escaped_module, listed).await }
                    })
                    .boxed()
            }
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        })
        .flatten();

        stop_after_error(candidates)
    }
}

fn parse_list_line(line: &str) -> Option<ListedVersion> {
    let mut parts = line.split_whitespace();
    let version = parts.next()?.to_string();
    let time = parts.next().map(String::from);
    Some(ListedVersion { version, time })
}

/// Encodes a Go module path for use in proxy URLs.
/// Uppercase letters are escaped as !{lowercase}.
fn encode_module_path(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            result.push('!');
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Keep the first three path segments, the usual shape of a module root
/// (`github.com/nats-io/nats-server/v2/server` -> `github.com/nats-io/nats-server`)
fn trim_module_path(path: &str) -> Option<String> {
    let path = path.strip_prefix("https://pkg.go.dev/").unwrap_or(path);
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 3 {
        return None;
    }
    Some(segments[..3].join("/"))
}
