//! Extraction rule: how one upstream's tags or filenames map to versions

use std::collections::HashSet;

use regex::Regex;

use crate::release::error::ReleaseError;

/// Name of the capture group every extraction pattern must expose
pub const VERSION_GROUP: &str = "version";

/// Per-package extraction configuration
///
/// A rule with no archive pattern treats the whole candidate as the version
/// fragment, which is what registry sources rely on.
#[derive(Debug, Clone, Default)]
pub struct ExtractionRule {
    archive_regex: Option<Regex>,
    ignore_tag_regex: Option<Regex>,
    is_nested: bool,
    ignored_names: HashSet<String>,
    base_url: Option<String>,
}

impl ExtractionRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the extraction pattern; it must contain a `(?P<version>...)` group
    pub fn with_archive_pattern(mut self, pattern: &str) -> Result<Self, ReleaseError> {
        let regex = compile_anchored(pattern)?;
        if !regex.capture_names().flatten().any(|name| name == VERSION_GROUP) {
            return Err(ReleaseError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: format!("missing named capture group `{}`", VERSION_GROUP),
            });
        }
        self.archive_regex = Some(regex);
        Ok(self)
    }

    /// Sets a pattern for tags that are dropped before version extraction
    pub fn with_ignore_pattern(mut self, pattern: &str) -> Result<Self, ReleaseError> {
        self.ignore_tag_regex = Some(compile_anchored(pattern)?);
        Ok(self)
    }

    pub fn nested(mut self, is_nested: bool) -> Self {
        self.is_nested = is_nested;
        self
    }

    pub fn with_ignored_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn archive_regex(&self) -> Option<&Regex> {
        self.archive_regex.as_ref()
    }

    pub fn is_nested(&self) -> bool {
        self.is_nested
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// True when the candidate is on the ignore list or matches the ignore pattern
    pub fn is_ignored(&self, name_token: &str) -> bool {
        self.ignored_names.contains(name_token)
            || self
                .ignore_tag_regex
                .as_ref()
                .is_some_and(|regex| regex.is_match(name_token))
    }
}

/// Compiles `pattern` so that it only matches at the start of the candidate
fn compile_anchored(pattern: &str) -> Result<Regex, ReleaseError> {
    Regex::new(&format!("^(?:{})", pattern)).map_err(|e| ReleaseError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
