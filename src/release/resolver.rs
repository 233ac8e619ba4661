//! Release resolver
//!
//! Pulls raw candidates from the routed source one at a time, drops the
//! ignored and unparseable ones, and normalizes the rest. When the package
//! names a version, the first matching release ends the stream and the
//! source is never polled again.

use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::config::FinderConfig;
use crate::package::types::{PackageId, PackageVersion, Release, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::normalizer::{canonicalize, normalize};
use crate::release::router::{RouteError, Router, SourcePlan, default_router};
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, SourceContext};
use crate::release::sources::stop_after_error;

/// Lazy stream of normalized releases
pub type ReleaseStream = BoxStream<'static, Result<Release, ReleaseError>>;

/// Lazy stream of versions with their release dates
pub type VersionStream = BoxStream<'static, Result<PackageVersion, ReleaseError>>;

/// Entry point for release lookups
pub struct ReleaseResolver {
    router: Router,
    context: SourceContext,
}

impl ReleaseResolver {
    pub fn new(router: Router, context: SourceContext) -> Self {
        Self { router, context }
    }

    /// Resolver with the bundled routes and the configured endpoints
    pub fn from_config(config: &FinderConfig) -> Result<Self, ReleaseError> {
        Ok(Self::new(
            default_router()?,
            SourceContext::from_config(config)?,
        ))
    }

    /// Stream the releases of `package`
    ///
    /// Returns `None` when no source covers the package. Nothing is fetched
    /// until the stream is polled.
    pub fn releases(&self, package: &PackageId) -> Option<ReleaseStream> {
        match self.router.process(package, &self.context) {
            Ok(plan) => Some(filter_releases(package.clone(), plan)),
            Err(RouteError::NoRoute(key)) => {
                debug!("No source for {}", key);
                None
            }
            Err(RouteError::Rule(e)) => Some(stream::once(async move { Err(e) }).boxed()),
        }
    }

    /// Stream the versions of `package`, with the same filtering as [`Self::releases`]
    pub fn versions(&self, package: &PackageId) -> Option<VersionStream> {
        self.releases(package)
            .map(|releases| releases.map_ok(PackageVersion::from).boxed())
    }

    /// First release of `package`; with a requested version, that version if it exists
    pub async fn find_release(&self, package: &PackageId) -> Result<Option<Release>, ReleaseError> {
        match self.releases(package) {
            Some(mut releases) => releases.next().await.transpose(),
            None => Ok(None),
        }
    }
}

/// Normalize and filter the candidates of one enumeration session
pub fn filter_releases(package: PackageId, plan: SourcePlan) -> ReleaseStream {
    let SourcePlan { source, rule } = plan;
    let kind = source.kind();
    let raw = stop_after_error(source.enumerate(&package, &rule));

    let Some(requested) = package.version.clone() else {
        return raw
            .try_filter_map(move |raw| future::ready(Ok(to_release(&package, &rule, kind, raw))))
            .boxed();
    };

    let requested_normalized = canonicalize(&requested);
    raw.try_filter_map(move |raw| future::ready(Ok(to_release(&package, &rule, kind, raw))))
        .try_filter(move |release| {
            future::ready(version_matches(
                &requested,
                requested_normalized.as_deref(),
                release.version(),
            ))
        })
        // Stop at the first match or error; the source is not polled again
        .take(1)
        .boxed()
}

fn to_release(
    package: &PackageId,
    rule: &ExtractionRule,
    kind: SourceKind,
    raw: RawRelease,
) -> Option<Release> {
    if rule.is_ignored(&raw.name_token) {
        debug!("Ignoring {} for {}", raw.name_token, package.name);
        return None;
    }
    let Some(version) = normalize(&raw.raw_version_fragment, rule) else {
        debug!("No version in {} for {}", raw.raw_version_fragment, package.name);
        return None;
    };

    Some(Release {
        package: PackageId {
            version: Some(version),
            ..package.clone()
        },
        download_url: raw.source_url,
        release_date: raw.timestamp,
        homepage_url: raw.homepage_url,
        provenance: kind,
    })
}

/// A requested version matches the candidate itself or through its normalized form
fn version_matches(requested: &str, requested_normalized: Option<&str>, candidate: &str) -> bool {
    candidate == requested || requested_normalized == Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointsConfig;
    use crate::release::http::HttpClient;
    use crate::release::source::MockReleaseSource;
    use rstest::rstest;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock source yielding `tokens` and counting how many were pulled
    fn counting_source(tokens: &[&str], pulled: Arc<AtomicUsize>) -> MockReleaseSource {
        let tokens: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        let mut source = MockReleaseSource::new();
        source.expect_kind().return_const(SourceKind::GitHubTags);
        source.expect_enumerate().times(1).returning(move |_, _| {
            let pulled = pulled.clone();
            stream::iter(tokens.clone())
                .inspect(move |_| {
                    pulled.fetch_add(1, Ordering::SeqCst);
                })
                .map(|token| Ok(RawRelease::new(token)))
                .boxed()
        });
        source
    }

    fn tag_rule() -> ExtractionRule {
        ExtractionRule::new()
            .with_archive_pattern(r"v(?P<version>\d+\.\d+)")
            .unwrap()
    }

    async fn collect(stream: ReleaseStream) -> Vec<String> {
        stream
            .map_ok(|release| release.version().to_string())
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn filter_releases_drops_unmatched_tags() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let source = counting_source(&["v1.0", "v1.1", "unrelated-marker"], pulled.clone());
        let package = PackageId::new("github", "tool").with_namespace("acme");

        let versions = collect(filter_releases(package, SourcePlan::new(source, tag_rule()))).await;

        assert_eq!(versions, vec!["1.0", "1.1"]);
        assert_eq!(pulled.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn filter_releases_stops_pulling_after_requested_version() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let source = counting_source(&["v1.0", "v1.1", "v1.2", "v1.3"], pulled.clone());
        let package = PackageId::new("github", "tool")
            .with_namespace("acme")
            .with_version("1.1");

        let versions = collect(filter_releases(package, SourcePlan::new(source, tag_rule()))).await;

        assert_eq!(versions, vec!["1.1"]);
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    }

    #[rstest]
    #[case("v1.2")]
    #[case("1.2")]
    fn version_matches_through_normalized_request(#[case] requested: &str) {
        let normalized = canonicalize(requested);
        assert!(version_matches(requested, normalized.as_deref(), "1.2"));
    }

    #[test]
    fn version_matches_rejects_other_versions() {
        assert!(!version_matches("1.2", Some("1.2"), "1.20"));
    }

    #[tokio::test]
    async fn filter_releases_matches_prefixed_request() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let source = counting_source(&["v1.0", "v1.1"], pulled.clone());
        let package = PackageId::new("github", "tool")
            .with_namespace("acme")
            .with_version("v1.0");

        let versions = collect(filter_releases(package, SourcePlan::new(source, tag_rule()))).await;

        assert_eq!(versions, vec!["1.0"]);
        assert_eq!(pulled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn filter_releases_yields_nothing_for_missing_version() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let source = counting_source(&["v1.0", "v1.1"], pulled.clone());
        let package = PackageId::new("github", "tool")
            .with_namespace("acme")
            .with_version("9.9");

        let versions = collect(filter_releases(package, SourcePlan::new(source, tag_rule()))).await;

        assert!(versions.is_empty());
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn filter_releases_skips_ignored_names() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let source = counting_source(&["2.0", "2.1-broken", "2.2"], pulled);
        let rule = ExtractionRule::new().with_ignored_names(["2.1-broken"]);

        let versions = collect(filter_releases(
            PackageId::new("github", "tool").with_namespace("acme"),
            SourcePlan::new(source, rule),
        ))
        .await;

        assert_eq!(versions, vec!["2.0", "2.2"]);
    }

    #[tokio::test]
    async fn filter_releases_drops_ignored_tags_before_extraction() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let source = counting_source(
            &[
                "1.42.1",
                "1.42.1-debian_version_1_42_1-1_upstream_version_1_42_1",
                "1.41.0",
            ],
            pulled.clone(),
        );
        let rule = ExtractionRule::new()
            .with_archive_pattern(r"(?P<version>[\w.-]+)")
            .unwrap()
            .with_ignore_pattern(r"\S*debian_version\S+upstream_version\S+")
            .unwrap();

        let versions = collect(filter_releases(
            PackageId::new("github", "genext2fs").with_namespace("bestouff"),
            SourcePlan::new(source, rule),
        ))
        .await;

        assert_eq!(versions, vec!["1.42.1", "1.41.0"]);
        assert_eq!(pulled.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn filter_releases_fills_release_fields() {
        let mut source = MockReleaseSource::new();
        source.expect_kind().return_const(SourceKind::DirectoryListing);
        source.expect_enumerate().returning(|_, _| {
            stream::iter(vec![Ok(RawRelease::new("busybox-1.2.3.tar.bz2")
                .with_source_url(Some("https://dl.test/busybox-1.2.3.tar.bz2".to_string()))
                .with_homepage_url(Some("https://dl.test/".to_string())))])
            .boxed()
        });
        let rule = ExtractionRule::new()
            .with_archive_pattern(r"^(busybox-)(?P<version>[\w.-]*)(\.tar\.bz2)$")
            .unwrap();

        let releases: Vec<Release> = filter_releases(
            PackageId::new("generic", "busybox"),
            SourcePlan::new(source, rule),
        )
        .try_collect()
        .await
        .unwrap();

        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].package.package_type, "generic");
        assert_eq!(releases[0].package.name, "busybox");
        assert_eq!(releases[0].version(), "1.2.3");
        assert_eq!(
            releases[0].download_url.as_deref(),
            Some("https://dl.test/busybox-1.2.3.tar.bz2")
        );
        assert_eq!(releases[0].homepage_url.as_deref(), Some("https://dl.test/"));
        assert_eq!(releases[0].provenance, SourceKind::DirectoryListing);
    }

    #[tokio::test]
    async fn filter_releases_ends_at_first_source_error() {
        let mut source = MockReleaseSource::new();
        source.expect_kind().return_const(SourceKind::Pypi);
        source.expect_enumerate().returning(|_, _| {
            stream::iter(vec![
                Ok(RawRelease::new("1.0")),
                Err(ReleaseError::RateLimited {
                    retry_after_secs: Some(60),
                }),
                Ok(RawRelease::new("2.0")),
            ])
            .boxed()
        });

        let results: Vec<Result<Release, ReleaseError>> = filter_releases(
            PackageId::new("pypi", "flask"),
            SourcePlan::new(source, ExtractionRule::new()),
        )
        .collect()
        .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ReleaseError::RateLimited {
                retry_after_secs: Some(60)
            })
        ));
    }

    fn resolver_with(router: Router) -> ReleaseResolver {
        ReleaseResolver::new(
            router,
            SourceContext::new(
                HttpClient::new("test").unwrap(),
                EndpointsConfig::default(),
                None,
            ),
        )
    }

    #[test]
    fn releases_returns_none_for_unsupported_package() {
        let resolver = resolver_with(Router::new());

        assert!(resolver.releases(&PackageId::new("swift", "swift-nio")).is_none());
        assert!(resolver.versions(&PackageId::new("swift", "swift-nio")).is_none());
    }

    #[tokio::test]
    async fn releases_surfaces_rule_errors_on_first_pull() {
        let mut router = Router::new();
        router
            .register(r"pkg:generic/", |_, _| {
                Err(ReleaseError::Config("broken rule".to_string()))
            })
            .unwrap();
        let resolver = resolver_with(router);

        let mut stream = resolver
            .releases(&PackageId::new("generic", "busybox"))
            .unwrap();

        assert!(matches!(
            stream.next().await,
            Some(Err(ReleaseError::Config(_)))
        ));
    }

    #[tokio::test]
    async fn versions_and_find_release_use_routed_source() {
        let mut router = Router::new();
        router
            .register(r"pkg:npm/", |_, _| {
                let mut source = MockReleaseSource::new();
                source.expect_kind().return_const(SourceKind::Npm);
                source.expect_enumerate().returning(|_, _| {
                    stream::iter(vec![Ok(RawRelease::new("4.18.2")), Ok(RawRelease::new("4.18.1"))])
                        .boxed()
                });
                Ok(Some(SourcePlan::new(source, ExtractionRule::new())))
            })
            .unwrap();
        let resolver = resolver_with(router);
        let package = PackageId::new("npm", "express");

        let versions: Vec<PackageVersion> = resolver
            .versions(&package)
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let found = resolver
            .find_release(&package.clone().with_version("4.18.1"))
            .await
            .unwrap();

        let values: Vec<&str> = versions.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(values, vec!["4.18.2", "4.18.1"]);
        assert_eq!(found.map(|r| r.version().to_string()), Some("4.18.1".to_string()));
    }
}
