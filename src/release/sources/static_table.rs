//! Frozen release tables bundled with the crate

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::normalizer::canonicalize;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::timestamp::parse_timestamp;

/// Archived download page of ipkg; the project is dead and its host is gone
pub const IPKG_HOMEPAGE: &str =
    "https://web.archive.org/web/20090326020239/http://handhelds.org/download/packages/ipkg/";

const IPKG_RELEASES: &str = include_str!("../data/ipkg_releases.json");

/// One frozen release
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StaticEntry {
    pub url: String,
    pub date: String,
}

/// Version-keyed release table in upstream order
#[derive(Debug, Clone)]
pub struct StaticTable {
    homepage_url: String,
    entries: IndexMap<String, StaticEntry>,
}

impl StaticTable {
    pub fn from_json(homepage_url: impl Into<String>, json: &str) -> Result<Self, ReleaseError> {
        let entries = serde_json::from_str(json)
            .map_err(|e| ReleaseError::Config(format!("invalid release table: {}", e)))?;
        Ok(Self {
            homepage_url: homepage_url.into(),
            entries,
        })
    }

    pub fn ipkg() -> Result<Self, ReleaseError> {
        Self::from_json(IPKG_HOMEPAGE, IPKG_RELEASES)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `version`, falling back to its canonical form (`v0.99.88` finds `0.99.88`)
    fn lookup(&self, version: &str) -> Option<(&str, &StaticEntry)> {
        if let Some((key, entry)) = self.entries.get_key_value(version) {
            return Some((key.as_str(), entry));
        }
        let canonical = canonicalize(version)?;
        self.entries
            .get_key_value(canonical.as_str())
            .map(|(key, entry)| (key.as_str(), entry))
    }

    fn candidate(&self, version: &str, entry: &StaticEntry) -> RawRelease {
        RawRelease::new(version)
            .with_timestamp(parse_timestamp(&entry.date))
            .with_source_url(Some(entry.url.clone()))
            .with_homepage_url(Some(self.homepage_url.clone()))
    }
}

/// Source serving a [`StaticTable`] without any network access
pub struct StaticTableSource {
    table: Arc<StaticTable>,
}

impl StaticTableSource {
    pub fn new(table: Arc<StaticTable>) -> Self {
        Self { table }
    }
}

impl ReleaseSource for StaticTableSource {
    fn kind(&self) -> SourceKind {
        SourceKind::StaticTable
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let rows: Vec<RawRelease> = match package.version.as_deref() {
            Some(version) => self
                .table
                .lookup(version)
                .map(|(version, entry)| self.table.candidate(version, entry))
                .into_iter()
                .collect(),
            None => self
                .table
                .entries
                .iter()
                .map(|(version, entry)| self.table.candidate(version, entry))
                .collect(),
        };

        stream::iter(rows.into_iter().map(Ok)).boxed()
    }
}
