//! Source trait for enumerating raw release candidates from one upstream kind

#[cfg(test)]
use mockall::automock;

use chrono::NaiveDateTime;
use futures::stream::BoxStream;

use crate::config::{EndpointsConfig, FinderConfig};
use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;

/// Lazy, finite, non-restartable sequence of raw candidates
///
/// Each poll performs at most one upstream request. Dropping the stream
/// abandons the session; nothing else needs cleanup.
pub type RawReleaseStream = BoxStream<'static, Result<RawRelease, ReleaseError>>;

/// Release candidate as found upstream, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRelease {
    /// Tag or file name, checked against the rule's ignore list and ignore pattern
    pub name_token: String,
    /// Fragment the version is extracted from
    pub raw_version_fragment: String,
    pub timestamp: Option<NaiveDateTime>,
    /// Download location of the release artifact
    pub source_url: Option<String>,
    /// Page the candidate was found on
    pub homepage_url: Option<String>,
}

impl RawRelease {
    /// Candidate whose name token is also its version fragment
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            raw_version_fragment: token.clone(),
            name_token: token,
            timestamp: None,
            source_url: None,
            homepage_url: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Option<NaiveDateTime>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_source_url(mut self, url: Option<String>) -> Self {
        self.source_url = url;
        self
    }

    pub fn with_homepage_url(mut self, url: Option<String>) -> Self {
        self.homepage_url = url;
        self
    }
}

/// Trait for enumerating release candidates from an upstream
#[cfg_attr(test, automock)]
pub trait ReleaseSource: Send + Sync {
    /// Returns the kind of upstream this implementation reads
    fn kind(&self) -> SourceKind;

    /// Starts a new enumeration session for `package`
    ///
    /// No request is issued until the returned stream is polled.
    fn enumerate(&self, package: &PackageId, rule: &ExtractionRule) -> RawReleaseStream;
}

/// Shared collaborators handed to route handlers when they build a source
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub http: HttpClient,
    pub endpoints: EndpointsConfig,
    pub github_token: Option<String>,
}

impl SourceContext {
    pub fn new(http: HttpClient, endpoints: EndpointsConfig, github_token: Option<String>) -> Self {
        Self {
            http,
            endpoints,
            github_token,
        }
    }

    pub fn from_config(config: &FinderConfig) -> Result<Self, ReleaseError> {
        Ok(Self::new(
            HttpClient::new(&config.user_agent)?,
            config.endpoints.clone(),
            config.github_token.clone(),
        ))
    }
}
