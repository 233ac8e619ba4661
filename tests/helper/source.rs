//! Source and endpoint test utilities

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};

use release_finder::config::EndpointsConfig;
use release_finder::package::types::{PackageId, SourceKind};
use release_finder::release::http::HttpClient;
use release_finder::release::router::{Router, SourcePlan};
use release_finder::release::rule::ExtractionRule;
use release_finder::release::source::{RawRelease, RawReleaseStream, ReleaseSource, SourceContext};

/// In-memory source that counts how many candidates were pulled
pub struct CountingSource {
    kind: SourceKind,
    tokens: Vec<String>,
    pulled: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new(kind: SourceKind, tokens: &[&str]) -> Self {
        Self {
            kind,
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared pull counter, readable after the source moved into a plan
    pub fn pulled(&self) -> Arc<AtomicUsize> {
        self.pulled.clone()
    }
}

impl ReleaseSource for CountingSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn enumerate(&self, _package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let pulled = self.pulled.clone();
        stream::iter(self.tokens.clone())
            .inspect(move |_| {
                pulled.fetch_add(1, Ordering::SeqCst);
            })
            .map(|token| Ok(RawRelease::new(token)))
            .boxed()
    }
}

/// Endpoints with every upstream served by `base_url`
pub fn endpoints(base_url: &str) -> EndpointsConfig {
    EndpointsConfig {
        pypi: base_url.to_string(),
        npm: base_url.to_string(),
        crates_io: base_url.to_string(),
        rubygems: base_url.to_string(),
        hex: base_url.to_string(),
        hex_repo: base_url.to_string(),
        nuget: base_url.to_string(),
        packagist: base_url.to_string(),
        maven: base_url.to_string(),
        go_proxy: base_url.to_string(),
        debian: base_url.to_string(),
        launchpad: base_url.to_string(),
        github_api: base_url.to_string(),
        github: "https://github.com".to_string(),
        bitbucket_api: base_url.to_string(),
        bitbucket: "https://bitbucket.org".to_string(),
        conan: base_url.to_string(),
    }
}

pub fn test_context(base_url: &str, github_token: Option<&str>) -> SourceContext {
    SourceContext::new(
        HttpClient::new("release-finder-test").unwrap(),
        endpoints(base_url),
        github_token.map(String::from),
    )
}

/// Router with a single route serving `plan` for keys matching `pattern`
pub fn single_route(pattern: &str, plan: SourcePlan) -> Router {
    let mut router = Router::new();
    router
        .register(pattern, move |_, _| Ok(Some(plan.clone())))
        .unwrap();
    router
}

/// Apache-style autoindex page listing `names`
pub fn listing_html(names: &[&str]) -> String {
    let rows: String = names
        .iter()
        .map(|name| {
            format!(
                r#"<tr><td valign="top"><img src="/icons/unknown.gif" alt="[   ]"></td><td><a href="{0}">{0}</a></td><td align="right">2023-05-19 04:06  </td><td align="right">2.4M</td></tr>"#,
                name
            )
        })
        .collect();
    format!(
        r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 3.2 Final//EN">
<html><head><title>Index of /downloads</title></head><body>
<h1>Index of /downloads</h1>
<table>
<tr><th><a href="?C=N;O=D">Name</a></th><th><a href="?C=M;O=A">Last modified</a></th></tr>
<tr><td><a href="/">Parent Directory</a></td><td>&nbsp;</td></tr>
{}
</table></body></html>"#,
        rows
    )
}
