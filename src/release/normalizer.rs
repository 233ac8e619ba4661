//! Version normalizer
//!
//! Turns a raw tag or filename into a canonical version string, or rejects it.
//! Rejection is the common case: READMEs, signature files, maintenance tags
//! and index decoration all fall out here.

use crate::release::rule::{ExtractionRule, VERSION_GROUP};

/// Extract and canonicalize the version carried by `raw_fragment`
///
/// When the rule has an archive pattern, a candidate that does not match it
/// (or whose `version` group does not participate) is skipped entirely.
pub fn normalize(raw_fragment: &str, rule: &ExtractionRule) -> Option<String> {
    let fragment = match rule.archive_regex() {
        Some(regex) => regex.captures(raw_fragment)?.name(VERSION_GROUP)?.as_str(),
        None => raw_fragment,
    };
    canonicalize(fragment)
}

/// Canonicalize an already extracted version fragment
///
/// Strips a leading `v`/`V` and whitespace, turns `_` into `.` (only before
/// the first `+`, build metadata is kept verbatim) and requires the result to
/// start with a digit.
pub fn canonicalize(fragment: &str) -> Option<String> {
    let trimmed = fragment.trim().trim_start_matches(['v', 'V']).trim();

    let version = match trimmed.split_once('+') {
        Some((left, right)) => format!("{}+{}", left.replace('_', "."), right),
        None => trimmed.replace('_', "."),
    };

    version
        .starts_with(|c: char| c.is_ascii_digit())
        .then_some(version)
}
