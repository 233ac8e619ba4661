//! HTML autoindex listing parser
//!
//! Understands the directory pages served by Apache (table and `<pre>`
//! layouts), nginx and lighttpd. Every row becomes a [`ListingEntry`]; sort
//! links, parent links and absolute links are skipped.
//!
//! Format examples:
//! - Apache: `<td><a href="busybox-1.36.1.tar.bz2">busybox-1.36.1.tar.bz2</a></td><td align="right">2023-05-19 04:06  </td>`
//! - nginx: `<a href="bzip2-1.0.8.tar.gz">bzip2-1.0.8.tar.gz</a>     13-Jul-2019 20:06    810029`
//! - lighttpd: `<td class="n"><a href="lighttpd-1.4.73.tar.gz">lighttpd-1.4.73.tar.gz</a></td><td class="m">2023-Oct-30 04:27:24</td>`

use chrono::NaiveDateTime;
use regex::Regex;

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// File name, or directory name with a trailing `/`
    pub name: String,
    pub modified: Option<NaiveDateTime>,
    pub is_directory: bool,
}

/// Parser for HTML directory listings
#[derive(Debug, Clone)]
pub struct ListingParser {
    /// Regex for a link: `<a href="name">text</a>`
    anchor_re: Regex,
    /// Regex for any markup tag, stripped from the text between links
    tag_re: Regex,
    /// Regex for the modification date that follows a link
    date_re: Regex,
}

impl ListingParser {
    pub fn new() -> Self {
        Self {
            anchor_re: Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>.*?</a>"#)
                .unwrap(),
            tag_re: Regex::new(r"(?s)<[^>]*>").unwrap(),
            // 2023-05-19 04:06[:12] | 19-May-2023 04:06[:12] | 2023-May-19 04:06:12
            date_re: Regex::new(
                r"(\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}(?::\d{2})?|\d{1,2}-[A-Za-z]{3}-\d{4} \d{2}:\d{2}(?::\d{2})?|\d{4}-[A-Za-z]{3}-\d{2} \d{2}:\d{2}(?::\d{2})?)",
            )
            .unwrap(),
        }
    }

    /// Parse every file and sub-directory row of `html`, in page order
    pub fn parse(&self, html: &str) -> Vec<ListingEntry> {
        let anchors: Vec<_> = self.anchor_re.captures_iter(html).collect();
        let mut entries: Vec<ListingEntry> = Vec::new();

        for (index, captures) in anchors.iter().enumerate() {
            let (Some(whole), Some(href)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let Some(name) = entry_name(href.as_str()) else {
                continue;
            };

            // The row's date sits between this link and the next one
            let tail_end = anchors
                .get(index + 1)
                .and_then(|next| next.get(0))
                .map_or(html.len(), |next| next.start());
            let tail = html.get(whole.end()..tail_end).unwrap_or_default();
            let modified = self.modified_time(tail);

            // Icon links repeat the file link right before it
            if let Some(last) = entries.last_mut()
                && last.name == name
            {
                last.modified = last.modified.or(modified);
                continue;
            }

            entries.push(ListingEntry {
                is_directory: name.ends_with('/'),
                name,
                modified,
            });
        }

        entries
    }

    fn modified_time(&self, tail: &str) -> Option<NaiveDateTime> {
        let text = self.tag_re.replace_all(tail, " ");
        let raw = self.date_re.find(&text)?.as_str().replace('T', " ");
        parse_listing_date(&raw)
    }
}

impl Default for ListingParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the listing name for `href`, or `None` for links that are not entries
fn entry_name(href: &str) -> Option<String> {
    let href = href.trim().replace("&amp;", "&");

    if href.is_empty()
        || href.starts_with('?')
        || href.starts_with('#')
        || href.starts_with('/')
        || href.starts_with("..")
        || href == "./"
        || href.contains("://")
        || href.starts_with("mailto:")
    {
        return None;
    }

    let decoded = urlencoding::decode(&href)
        .map(|name| name.into_owned())
        .unwrap_or(href);

    let is_directory = decoded.ends_with('/');
    let last_segment = decoded.trim_end_matches('/').rsplit('/').next()?;
    if last_segment.is_empty() {
        return None;
    }

    Some(if is_directory {
        format!("{}/", last_segment)
    } else {
        last_segment.to_string()
    })
}

fn parse_listing_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    // Minutes-only rows get zero seconds
    let with_seconds = if raw.matches(':').count() == 1 {
        format!("{}:00", raw)
    } else {
        raw.to_string()
    };

    ["%Y-%m-%d %H:%M:%S", "%d-%b-%Y %H:%M:%S", "%Y-%b-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&with_seconds, format).ok())
}
