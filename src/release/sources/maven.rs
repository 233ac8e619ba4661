//! Maven repository metadata source

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use crate::package::types::{PackageId, SourceKind};
use crate::release::error::ReleaseError;
use crate::release::http::HttpClient;
use crate::release::rule::ExtractionRule;
use crate::release::source::{RawRelease, RawReleaseStream, ReleaseSource};
use crate::release::sources::{empty, join_url, single_page};

/// Default base URL for Maven Central
pub const DEFAULT_BASE_URL: &str = "https://repo1.maven.org/maven2";

/// Source for Maven artifacts, read from `maven-metadata.xml`
pub struct MavenSource {
    http: HttpClient,
    base_url: String,
}

impl MavenSource {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

impl ReleaseSource for MavenSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Maven
    }

    fn enumerate(&self, package: &PackageId, _rule: &ExtractionRule) -> RawReleaseStream {
        let Some(group_id) = package.namespace.as_deref() else {
            debug!("Maven artifact {} has no group id", package.name);
            return empty();
        };
        let http = self.http.clone();
        let artifact_id = package.name.clone();
        let artifact_url = join_url(
            &self.base_url,
            &format!("{}/{}", group_id.replace('.', "/"), artifact_id),
        );

        single_page(async move {
            let metadata_url = format!("{}/maven-metadata.xml", artifact_url);
            let body = http.get_bytes(&metadata_url, &[]).await?;
            let versions = extract_versions(&body)?;
            Ok::<_, ReleaseError>(
                versions
                    .into_iter()
                    .map(|version| {
                        let jar_url = format!(
                            "{}/{}/{}-{}.jar",
                            artifact_url, version, artifact_id, version
                        );
                        RawRelease::new(version).with_source_url(Some(jar_url))
                    })
                    .collect(),
            )
        })
    }
}

/// Collect the text of every `<version>` element, in document order
fn extract_versions(xml: &[u8]) -> Result<Vec<String>, ReleaseError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut in_version = false;
    let mut versions = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => in_version = element.name().as_ref() == b"version",
            Ok(Event::Text(text)) if in_version => {
                let text = text
                    .unescape()
                    .map_err(|e| ReleaseError::InvalidResponse(e.to_string()))?;
                if !text.is_empty() {
                    versions.push(text.into_owned());
                }
            }
            Ok(Event::End(_)) => in_version = false,
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ReleaseError::InvalidResponse(format!(
                    "malformed maven-metadata.xml at {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(versions)
}
