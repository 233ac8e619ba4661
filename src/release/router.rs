//! Pattern dispatch from a package to the source that lists its releases
//!
//! Routes are matched against [`PackageId::route_key`] in registration order;
//! the first matching pattern decides. A handler may still decline a package
//! (a generic name without a rule, a GitHub package without an owner), which
//! is reported the same way as an unmatched key.

use std::sync::Arc;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::package::types::PackageId;
use crate::release::error::ReleaseError;
use crate::release::rule::ExtractionRule;
use crate::release::rules::{self, DIRECTORY_SOURCES};
use crate::release::source::{ReleaseSource, SourceContext};
use crate::release::sources::{
    BitbucketTagSource, ComposerSource, ConanSource, CratesIoSource, DebianSource, DirectoryListingSource, GitHubTagSource,
    GoProxySource, HexSource, LaunchpadSource, MavenSource, NestedDirectoryListingSource,
    NpmSource, NuGetSource, PypiSource, RubyGemsSource, StaticTableSource,
};
use crate::release::sources::static_table::StaticTable;

/// A source paired with the rule its candidates are extracted with
#[derive(Clone)]
pub struct SourcePlan {
    pub source: Arc<dyn ReleaseSource>,
    pub rule: ExtractionRule,
}

impl SourcePlan {
    pub fn new(source: impl ReleaseSource + 'static, rule: ExtractionRule) -> Self {
        Self {
            source: Arc::new(source),
            rule,
        }
    }
}

/// Why a package could not be dispatched
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("No route available for {0}")]
    NoRoute(String),

    #[error(transparent)]
    Rule(#[from] ReleaseError),
}

/// Builds the plan for a package whose route key matched
///
/// `Ok(None)` declines the package.
pub type RouteHandler =
    Box<dyn Fn(&PackageId, &SourceContext) -> Result<Option<SourcePlan>, ReleaseError> + Send + Sync>;

struct Route {
    pattern: Regex,
    handler: RouteHandler,
}

/// Ordered table of route patterns
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route; `pattern` is matched at the start of the route key
    pub fn register<F>(&mut self, pattern: &str, handler: F) -> Result<(), ReleaseError>
    where
        F: Fn(&PackageId, &SourceContext) -> Result<Option<SourcePlan>, ReleaseError>
            + Send
            + Sync
            + 'static,
    {
        let anchored = format!("^(?:{})", pattern);
        let pattern = Regex::new(&anchored).map_err(|e| ReleaseError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.routes.push(Route {
            pattern,
            handler: Box::new(handler),
        });
        Ok(())
    }

    /// Dispatch `package` to the first route whose pattern matches its route key
    pub fn process(
        &self,
        package: &PackageId,
        context: &SourceContext,
    ) -> Result<SourcePlan, RouteError> {
        let key = package.route_key();
        let route = self
            .routes
            .iter()
            .find(|route| route.pattern.is_match(&key))
            .ok_or_else(|| RouteError::NoRoute(key.clone()))?;

        match (route.handler)(package, context)? {
            Some(plan) => {
                debug!("Routed {} to {}", key, plan.source.kind());
                Ok(plan)
            }
            None => Err(RouteError::NoRoute(key)),
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn github_plan(
    context: &SourceContext,
    (owner, repo): (&str, &str),
    rule: ExtractionRule,
) -> SourcePlan {
    let source = GitHubTagSource::new(
        context.http.clone(),
        context.github_token.clone(),
        owner,
        repo,
    )
    .with_endpoints(&context.endpoints.github_api, &context.endpoints.github);
    SourcePlan::new(source, rule)
}

fn directory_plan(context: &SourceContext, rule: ExtractionRule) -> SourcePlan {
    if rule.is_nested() {
        SourcePlan::new(NestedDirectoryListingSource::new(context.http.clone()), rule)
    } else {
        SourcePlan::new(DirectoryListingSource::new(context.http.clone()), rule)
    }
}

/// Route pattern for one or more exact `type/name` pairs
fn exact_names<'a>(package_type: &str, names: impl IntoIterator<Item = &'a str>) -> String {
    let names: Vec<String> = names.into_iter().map(regex::escape).collect();
    format!(r"pkg:{}/(?:{})(?:@.*)?$", package_type, names.join("|"))
}

/// Router with every bundled route registered
pub fn default_router() -> Result<Router, ReleaseError> {
    let mut router = Router::new();

    router.register(
        &exact_names("generic", rules::MINIUPNP_PACKAGES.iter().copied()),
        |package, context| {
            let rule = rules::miniupnp_rule(&package.name)?;
            Ok(Some(github_plan(context, rules::MINIUPNP_REPOSITORY, rule)))
        },
    )?;

    router.register(&exact_names("generic", ["erofs-utils"]), |_, context| {
        Ok(Some(github_plan(
            context,
            rules::EROFS_UTILS_REPOSITORY,
            ExtractionRule::new(),
        )))
    })?;

    let ipkg = Arc::new(StaticTable::ipkg()?);
    router.register(&exact_names("generic", ["ipkg"]), move |_, _| {
        Ok(Some(SourcePlan::new(
            StaticTableSource::new(ipkg.clone()),
            ExtractionRule::new(),
        )))
    })?;

    router.register(
        &exact_names("generic", DIRECTORY_SOURCES.iter().map(|source| source.name)),
        |package, context| {
            Ok(rules::resolve(&package.package_type, &package.name)?
                .map(|rule| directory_plan(context, rule)))
        },
    )?;

    router.register(&exact_names("openssl", ["openssl"]), |_, context| {
        Ok(Some(github_plan(
            context,
            rules::OPENSSL_REPOSITORY,
            rules::openssl_rule()?,
        )))
    })?;

    router.register(r"pkg:gnu/[^/@]+(?:@.*)?$", |package, context| {
        Ok(Some(directory_plan(context, rules::gnu_rule(&package.name)?)))
    })?;

    router.register(r"pkg:github/", |package, context| {
        let Some(owner) = package.namespace.as_deref() else {
            return Ok(None);
        };
        let rule = rules::github_rule(owner, &package.name)?;
        Ok(Some(github_plan(context, (owner, package.name.as_str()), rule)))
    })?;

    router.register(r"pkg:bitbucket/", |package, context| {
        if package.namespace.is_none() {
            return Ok(None);
        }
        Ok(Some(SourcePlan::new(
            BitbucketTagSource::new(
                context.http.clone(),
                &context.endpoints.bitbucket_api,
                &context.endpoints.bitbucket,
            ),
            ExtractionRule::new(),
        )))
    })?;

    router.register(r"pkg:pypi/", |_, context| {
        Ok(Some(SourcePlan::new(
            PypiSource::new(context.http.clone(), &context.endpoints.pypi),
            ExtractionRule::new(),
        )))
    })?;

    router.register(r"pkg:npm/", |_, context| {
        Ok(Some(SourcePlan::new(
            NpmSource::new(context.http.clone(), &context.endpoints.npm),
            ExtractionRule::new(),
        )))
    })?;

    router.register(r"pkg:cargo/", |_, context| {
        Ok(Some(SourcePlan::new(
            CratesIoSource::new(context.http.clone(), &context.endpoints.crates_io),
            ExtractionRule::new(),
        )))
    })?;

    router.register(r"pkg:gem/", |_, context| {
        Ok(Some(SourcePlan::new(
            RubyGemsSource::new(context.http.clone(), &context.endpoints.rubygems),
            ExtractionRule::new(),
        )))
    })?;

    router.register(r"pkg:hex/", |_, context| {
        Ok(Some(SourcePlan::new(
            HexSource::new(
                context.http.clone(),
                &context.endpoints.hex,
                &context.endpoints.hex_repo,
            ),
            ExtractionRule::new(),
        )))
    })?;

    router.register(r"pkg:nuget/", |_, context| {
        Ok(Some(SourcePlan::new(
            NuGetSource::new(context.http.clone(), &context.endpoints.nuget),
            ExtractionRule::new(),
        )))
    })?;

    router.register(r"pkg:composer/", |_, context| {
        Ok(Some(SourcePlan::new(
            ComposerSource::new(context.http.clone(), &context.endpoints.packagist),
            ExtractionRule::new(),
        )))
    })?;

    router.register(r"pkg:maven/", |_, context| {
        Ok(Some(SourcePlan::new(
            MavenSource::new(context.http.clone(), &context.endpoints.maven),
            ExtractionRule::new(),
        )))
    })?;

    router.register(r"pkg:golang/", |_, context| {
        Ok(Some(SourcePlan::new(
            GoProxySource::new(context.http.clone(), &context.endpoints.go_proxy),
            ExtractionRule::new(),
        )))
    })?;

    router.register(r"pkg:deb/debian/", |_, context| {
        Ok(Some(SourcePlan::new(
            DebianSource::new(context.http.clone(), &context.endpoints.debian),
            ExtractionRule::new(),
        )))
    })?;

    router.register(r"pkg:deb/ubuntu/", |_, context| {
        Ok(Some(SourcePlan::new(
            LaunchpadSource::new(context.http.clone(), &context.endpoints.launchpad),
            ExtractionRule::new(),
        )))
    })?;

    router.register(r"pkg:conan/", |_, context| {
        Ok(Some(SourcePlan::new(
            ConanSource::new(context.http.clone(), &context.endpoints.conan),
            ExtractionRule::new(),
        )))
    })?;

    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointsConfig;
    use crate::package::types::SourceKind;
    use crate::release::http::HttpClient;
    use crate::release::source::MockReleaseSource;
    use rstest::rstest;

    fn context() -> SourceContext {
        SourceContext::new(
            HttpClient::new("test").unwrap(),
            EndpointsConfig::default(),
            Some("token".to_string()),
        )
    }

    fn package(package_type: &str, namespace: Option<&str>, name: &str) -> PackageId {
        let package = PackageId::new(package_type, name);
        match namespace {
            Some(namespace) => package.with_namespace(namespace),
            None => package,
        }
    }

    #[rstest]
    #[case("generic", None, "busybox", SourceKind::DirectoryListing)]
    #[case("generic", None, "linux", SourceKind::NestedDirectoryListing)]
    #[case("generic", None, "util-linux", SourceKind::NestedDirectoryListing)]
    #[case("generic", None, "ipkg", SourceKind::StaticTable)]
    #[case("generic", None, "miniupnpd", SourceKind::GitHubTags)]
    #[case("generic", None, "erofs-utils", SourceKind::GitHubTags)]
    #[case("openssl", None, "openssl", SourceKind::GitHubTags)]
    #[case("gnu", None, "bash", SourceKind::DirectoryListing)]
    #[case("github", Some("nixos"), "nix", SourceKind::GitHubTags)]
    #[case("bitbucket", Some("ptmcg"), "pyparsing", SourceKind::BitbucketTags)]
    #[case("pypi", None, "requests", SourceKind::Pypi)]
    #[case("npm", Some("@types"), "node", SourceKind::Npm)]
    #[case("cargo", None, "serde", SourceKind::CratesIo)]
    #[case("gem", None, "rails", SourceKind::RubyGems)]
    #[case("hex", None, "jason", SourceKind::Hex)]
    #[case("nuget", None, "Newtonsoft.Json", SourceKind::NuGet)]
    #[case("composer", Some("laravel"), "laravel", SourceKind::Composer)]
    #[case("maven", Some("org.apache.commons"), "commons-lang3", SourceKind::Maven)]
    #[case("golang", Some("golang.org/x"), "text", SourceKind::GoProxy)]
    #[case("deb", Some("debian"), "dpkg", SourceKind::Debian)]
    #[case("deb", Some("ubuntu"), "dpkg", SourceKind::Launchpad)]
    #[case("conan", None, "zlib", SourceKind::Conan)]
    fn default_router_dispatches_by_route_key(
        #[case] package_type: &str,
        #[case] namespace: Option<&str>,
        #[case] name: &str,
        #[case] expected: SourceKind,
    ) {
        let router = default_router().unwrap();

        let plan = router
            .process(&package(package_type, namespace, name), &context())
            .unwrap();

        assert_eq!(plan.source.kind(), expected);
    }

    #[test]
    fn default_router_matches_versioned_keys() {
        let router = default_router().unwrap();
        let package = PackageId::new("generic", "busybox").with_version("1.36.1");

        let plan = router.process(&package, &context()).unwrap();

        assert_eq!(plan.source.kind(), SourceKind::DirectoryListing);
        assert_eq!(plan.rule.base_url(), Some("https://www.busybox.net/downloads/"));
    }

    #[rstest]
    #[case("generic", None, "not-a-known-package")]
    #[case("generic", None, "busybox-extra")]
    #[case("swift", None, "swift-nio")]
    #[case("github", None, "nix")]
    #[case("bitbucket", None, "pyparsing")]
    #[case("deb", Some("fedora"), "dpkg")]
    fn default_router_reports_no_route(
        #[case] package_type: &str,
        #[case] namespace: Option<&str>,
        #[case] name: &str,
    ) {
        let router = default_router().unwrap();

        let result = router.process(&package(package_type, namespace, name), &context());

        assert!(matches!(result, Err(RouteError::NoRoute(_))));
    }

    #[test]
    fn process_uses_first_matching_route() {
        let mut router = Router::new();
        router
            .register(r"pkg:generic/", |_, _| {
                let mut source = MockReleaseSource::new();
                source.expect_kind().return_const(SourceKind::StaticTable);
                Ok(Some(SourcePlan::new(source, ExtractionRule::new())))
            })
            .unwrap();
        router
            .register(r"pkg:generic/busybox", |_, _| {
                let mut source = MockReleaseSource::new();
                source.expect_kind().return_const(SourceKind::DirectoryListing);
                Ok(Some(SourcePlan::new(source, ExtractionRule::new())))
            })
            .unwrap();

        let plan = router
            .process(&PackageId::new("generic", "busybox"), &context())
            .unwrap();

        assert_eq!(plan.source.kind(), SourceKind::StaticTable);
    }

    #[test]
    fn process_surfaces_handler_errors() {
        let mut router = Router::new();
        router
            .register(r"pkg:generic/", |_, _| {
                Err(ReleaseError::Config("broken rule".to_string()))
            })
            .unwrap();

        let result = router.process(&PackageId::new("generic", "busybox"), &context());

        assert!(matches!(result, Err(RouteError::Rule(ReleaseError::Config(_)))));
    }

    #[test]
    fn register_rejects_invalid_pattern() {
        let mut router = Router::new();

        let result = router.register(r"pkg:(", |_, _| Ok(None));

        assert!(matches!(result, Err(ReleaseError::InvalidPattern { .. })));
        assert!(router.is_empty());
    }

    #[test]
    fn register_keeps_valid_routes_after_a_rejected_one() {
        let mut router = Router::new();

        router.register(r"pkg:pypi/", |_, _| Ok(None)).unwrap();
        assert!(router.register(r"pkg:[", |_, _| Ok(None)).is_err());
        router.register(r"pkg:npm/", |_, _| Ok(None)).unwrap();

        assert_eq!(router.len(), 2);
    }
}
