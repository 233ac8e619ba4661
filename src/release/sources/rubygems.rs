//! RubyGems API source

use serde::Deserialize;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{join_url, single_page};
use crate::release::timestamp::parse_timestamp;

/// Default base URL for RubyGems
pub const DEFAULT_BASE_URL: &str = "https://rubygems.org";

/// Platform of gems that contain no native code
const RUBY_PLATFORM: &str = "ruby";

#[derive(Debug, Deserialize)]
struct GemVersion {
    number: String,
    platform: Option<String>,
    published_at: Option<String>,
    created_at: Option<String>,
}

/// Source for Ruby gems
pub struct RubyGemsSource {
    http: HttpClient,
    base_url: String,
}

impl RubyGemsSource {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

impl ReleaseSource for RubyGemsSource {
    fn kind(&self) -> SourceKind {
        SourceKind::RubyGems
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let http = self.http.clone();
        let base_url = self.base_url.clone();
        let name = package.name.clone();
        let url = join_url(&self.base_url, &format!("api/v1/versions/{}.json", name));

        single_page(async move {
            let versions: Vec<GemVersion> = http.get_json(&url, &[]).await?;
            Ok::<_, ReleaseError>(
                versions
                    .into_iter()
                    .map(|version| candidate(&base_url, &name, version))
                    .collect(),
            )
        })
    }
}

fn candidate(base_url: &str, name: &str, version: GemVersion) -> RawRelease {
    let file_name = match version.platform.as_deref() {
        Some(platform) if platform != RUBY_PLATFORM => {
            format!("{}-{}-{}.gem", name, version.number, platform)
        }
        _ => format!("{}-{}.gem", name, version.number),
    };
    let published = version
        .published_at
        .as_deref()
        .or(version.created_at.as_deref())
        .and_then(parse_timestamp);

    RawRelease::new(version.number)
        .with_timestamp(published)
        .with_source_url(Some(join_url(base_url, &format!("downloads/{}", file_name))))
        .with_homepage_url(Some(join_url(base_url, &format!("gems/{}", name))))
}
