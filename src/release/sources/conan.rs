//! ConanCenter recipe index source
//!
//! ConanCenter has no version API. Each recipe's `config.yml` in the
//! conan-center-index repository lists the versions it can build.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{join_url, single_page};

/// Default base URL for raw files of the conan-center-index repository
pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/conan-io/conan-center-index/master";

/// Recipe `config.yml`: `versions` maps each version to its recipe folder
#[derive(Debug, Deserialize)]
struct RecipeConfig {
    #[serde(default)]
    versions: IndexMap<String, serde_yaml::Value>,
}

/// Source for ConanCenter recipes
pub struct ConanSource {
    http: HttpClient,
    base_url: String,
}

impl ConanSource {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

impl ReleaseSource for ConanSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Conan
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let http = self.http.clone();
        let url = join_url(
            &self.base_url,
            &format!("recipes/{}/config.yml", package.name),
        );

        single_page(async move {
            let body = http.get_text(&url, &[]).await?;
            let config = parse_recipe_config(&body)?;
            Ok::<_, ReleaseError>(config.versions.into_keys().map(RawRelease::new).collect())
        })
    }
}

fn parse_recipe_config(body: &str) -> Result<RecipeConfig, ReleaseError> {
    serde_yaml::from_str(body)
        .map_err(|e| ReleaseError::InvalidResponse(format!("invalid recipe config: {}", e)))
}
