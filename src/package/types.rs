//! Common types for package identity and discovered releases

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Decomposed package identifier
///
/// Mirrors the type/namespace/name/version parts of a package URL. When
/// `version` is set, enumeration is constrained to at most one result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PackageId {
    #[serde(rename = "type")]
    pub package_type: String,
    pub namespace: Option<String>,
    pub name: String,
    pub version: Option<String>,
}

impl PackageId {
    pub fn new(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package_type: package_type.into(),
            namespace: None,
            name: name.into(),
            version: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Returns the `namespace/name` pair, or just the name when there is no namespace
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}/{}", namespace, self.name),
            None => self.name.clone(),
        }
    }

    /// Key matched by router patterns, e.g. `pkg:github/nixos/nix@2.18.1`
    pub fn route_key(&self) -> String {
        let mut key = format!("pkg:{}/{}", self.package_type, self.qualified_name());
        if let Some(version) = &self.version {
            key.push('@');
            key.push_str(version);
        }
        key
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.route_key())
    }
}

/// Kind of upstream a release was discovered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Flat HTML autoindex page
    DirectoryListing,
    /// HTML autoindex split across version-range sub-directories
    NestedDirectoryListing,
    /// GitHub tags through the GraphQL API
    #[serde(rename = "github_tags")]
    GitHubTags,
    /// Bundled table for frozen upstreams
    StaticTable,
    Pypi,
    Npm,
    CratesIo,
    #[serde(rename = "rubygems")]
    RubyGems,
    Hex,
    #[serde(rename = "nuget")]
    NuGet,
    Composer,
    Maven,
    GoProxy,
    Debian,
    Launchpad,
    /// Bitbucket Cloud tags through the REST API
    BitbucketTags,
    /// ConanCenter recipe index
    Conan,
}

impl SourceKind {
    /// Returns the string representation of the source kind
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::DirectoryListing => "directory_listing",
            SourceKind::NestedDirectoryListing => "nested_directory_listing",
            SourceKind::GitHubTags => "github_tags",
            SourceKind::StaticTable => "static_table",
            SourceKind::Pypi => "pypi",
            SourceKind::Npm => "npm",
            SourceKind::CratesIo => "crates_io",
            SourceKind::RubyGems => "rubygems",
            SourceKind::Hex => "hex",
            SourceKind::NuGet => "nuget",
            SourceKind::Composer => "composer",
            SourceKind::Maven => "maven",
            SourceKind::GoProxy => "go_proxy",
            SourceKind::Debian => "debian",
            SourceKind::Launchpad => "launchpad",
            SourceKind::BitbucketTags => "bitbucket_tags",
            SourceKind::Conan => "conan",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published version of a package with its download location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    /// Requested identifier with `version` set to the normalized version
    #[serde(flatten)]
    pub package: PackageId,
    pub download_url: Option<String>,
    pub release_date: Option<NaiveDateTime>,
    pub homepage_url: Option<String>,
    pub provenance: SourceKind,
}

impl Release {
    /// Normalized version of this release
    pub fn version(&self) -> &str {
        self.package.version.as_deref().unwrap_or_default()
    }
}

/// Version-only view of a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageVersion {
    pub value: String,
    pub release_date: Option<NaiveDateTime>,
}

impl From<Release> for PackageVersion {
    fn from(release: Release) -> Self {
        Self {
            value: release.package.version.unwrap_or_default(),
            release_date: release.release_date,
        }
    }
}
