//! Extraction rule table
//!
//! Per-package rules for upstreams that need more than "the tag is the
//! version": HTML directory indexes, GitHub repositories with unusual tag
//! naming, and package names that alias a shared tag stream.

use crate::release::error::ReleaseError;
use crate::release::rule::ExtractionRule;

/// Base URL of the GNU release mirror; every `gnu/<name>` package lives below it
pub const GNU_BASE_URL: &str = "https://ftp.gnu.org/pub/gnu/";

/// Packages published from the shared `miniupnp/miniupnp` repository
pub const MINIUPNP_PACKAGES: &[&str] = &["miniupnpc", "miniupnpd", "minissdpd"];

/// Repository the miniupnp packages are tagged in
pub const MINIUPNP_REPOSITORY: (&str, &str) = ("miniupnp", "miniupnp");

/// Repository OpenSSL releases are tagged in
pub const OPENSSL_REPOSITORY: (&str, &str) = ("openssl", "openssl");

/// Repository erofs-utils releases are tagged in
pub const EROFS_UTILS_REPOSITORY: (&str, &str) = ("erofs", "erofs-utils");

/// Tag pattern of OpenSSL releases (`OpenSSL_1_1_1w`, `openssl-3.2.0`)
pub const OPENSSL_TAG_PATTERN: &str = r"(OpenSSL_|openssl-)(?P<version>.+)";

/// A generic package released as archives in an HTML directory index
#[derive(Debug, Clone, Copy)]
pub struct DirectorySource {
    pub name: &'static str,
    pub base_url: &'static str,
    pub pattern: &'static str,
    /// Releases are split across one level of sub-directories
    pub nested: bool,
    pub ignored: &'static [&'static str],
}

impl DirectorySource {
    pub fn rule(&self) -> Result<ExtractionRule, ReleaseError> {
        Ok(ExtractionRule::new()
            .with_archive_pattern(self.pattern)?
            .nested(self.nested)
            .with_ignored_names(self.ignored.iter().copied())
            .with_base_url(self.base_url))
    }
}

const fn flat(name: &'static str, base_url: &'static str, pattern: &'static str) -> DirectorySource {
    DirectorySource {
        name,
        base_url,
        pattern,
        nested: false,
        ignored: &[],
    }
}

const fn nested(
    name: &'static str,
    base_url: &'static str,
    pattern: &'static str,
    ignored: &'static [&'static str],
) -> DirectorySource {
    DirectorySource {
        name,
        base_url,
        pattern,
        nested: true,
        ignored,
    }
}

pub const DIRECTORY_SOURCES: &[DirectorySource] = &[
    flat(
        "busybox",
        "https://www.busybox.net/downloads/",
        r"^(busybox-)(?P<version>[\w.-]*)(\.tar\.bz2)$",
    ),
    flat(
        "bzip2",
        "https://sourceware.org/pub/bzip2/",
        r"^(bzip2-)(?P<version>[\w.-]*)(\.tar\.gz)$",
    ),
    flat(
        "dnsmasq",
        "https://thekelleys.org.uk/dnsmasq/",
        r"^(dnsmasq-)(?P<version>[\w.-]*)(\.tar\.xz|\.tar\.gz)$",
    ),
    DirectorySource {
        name: "dropbear",
        base_url: "https://matt.ucc.asn.au/dropbear/releases/",
        pattern: r"^(dropbear-)(?P<version>[\w.-]*)(\.tar\.bz2|_i386\.deb)$",
        nested: false,
        ignored: &[
            "dropbear-0.44test1.tar.bz2",
            "dropbear-0.44test1.tar.gz",
            "dropbear-0.44test2.tar.bz2",
            "dropbear-0.44test2.tar.gz",
            "dropbear-0.44test3.tar.bz2",
            "dropbear-0.44test3.tar.gz",
            "dropbear-0.44test4.tar.bz2",
            "dropbear-0.44test4.tar.gz",
        ],
    },
    flat(
        "ebtables",
        "https://www.netfilter.org/pub/ebtables/",
        r"^(ebtables-)(?P<version>[\w.-]*)(\.tar\.gz)$",
    ),
    flat(
        "hostapd",
        "https://w1.fi/releases/",
        r"^(hostapd-)(?P<version>[\w.-]*)(\.tar\.gz)$",
    ),
    flat(
        "iproute2",
        "https://mirrors.edge.kernel.org/pub/linux/utils/net/iproute2/",
        r"^(iproute2-)(?P<version>[\w.-]*)(\.tar\.xz|\.tar\.gz)$",
    ),
    flat(
        "iptables",
        "https://www.netfilter.org/pub/iptables/",
        r"^(iptables-)(?P<version>[\w.-]*)(\.tar\.bz2)$",
    ),
    flat(
        "libnl",
        "https://www.infradead.org/~tgr/libnl/files/",
        r"^(libnl-)(?P<version>[\w.-]*)(\.tar\.gz)$",
    ),
    flat(
        "lighttpd",
        "https://download.lighttpd.net/lighttpd/releases-1.4.x/",
        r"^(lighttpd-)(?P<version>[\w.-]*)(\.tar\.gz)$",
    ),
    flat(
        "nftables",
        "https://www.netfilter.org/pub/nftables/",
        r"^(nftables-)(?P<version>[\w.-]*)(\.tar\.xz|\.tar\.bz2)$",
    ),
    flat(
        "openssh",
        "https://cdn.openbsd.org/pub/OpenBSD/OpenSSH/",
        r"^(openssh-)(?P<version>[\w.-]*)(\.tgz|\.tar\.gz)$",
    ),
    flat(
        "samba",
        "https://download.samba.org/pub/samba/stable/",
        r"^(samba-)(?P<version>[\w.-]*)(\.tar\.gz)$",
    ),
    flat(
        "syslinux",
        "https://mirrors.edge.kernel.org/pub/linux/utils/boot/syslinux/",
        r"^(syslinux-)(?P<version>[\w.-]*)(\.tar\.gz)$",
    ),
    flat(
        "toybox",
        "http://www.landley.net/toybox/downloads/",
        r"^(toybox-)(?P<version>[\w.-]*)(\.tar\.gz|\.tar\.bz2)$",
    ),
    flat(
        "uclibc",
        "https://www.uclibc.org/downloads/",
        r"^(uClibc-)(?P<version>[\w.-]*)(\.tar\.gz)$",
    ),
    nested(
        "uclibc-ng",
        "https://downloads.uclibc-ng.org/releases/",
        r"^(uClibc-ng-)(?P<version>[\w.-]*)(\.tar\.gz)$",
        &[],
    ),
    nested(
        "util-linux",
        "https://mirrors.edge.kernel.org/pub/linux/utils/util-linux/",
        r"^(util-linux-ng-|util-linux-)(?P<version>[\w.-]*)(\.tar\.gz)$",
        &[],
    ),
    flat(
        "wpa_supplicant",
        "https://w1.fi/releases/",
        r"^(wpa_supplicant-)(?P<version>[\w.-]*)(\.tar\.gz)$",
    ),
    flat(
        "mtd-utils",
        "https://infraroot.at/pub/mtd/",
        r"^(mtd-utils-)(?P<version>[\w.-]*)(\.tar\.bz2)$",
    ),
    flat(
        "barebox",
        "https://www.barebox.org/download/",
        r"^(barebox-)(?P<version>[\w.-]*)(\.tar\.bz2)$",
    ),
    nested(
        "linux",
        "https://mirrors.edge.kernel.org/pub/linux/kernel/",
        r"^(linux-)(?P<version>[\w.-]*)(\.tar\.gz)$",
        &[
            "Historic/",
            "SillySounds/",
            "crypto/",
            "firmware/",
            "next/",
            "people/",
            "ports/",
            "projects/",
            "testing/",
            "tools/",
            "uemacs/",
        ],
    ),
    nested(
        "e2fsprogs",
        "https://mirrors.edge.kernel.org/pub/linux/kernel/people/tytso/e2fsprogs/",
        r"^(e2fsprogs-)(?P<version>[\w.-]*)(\.tar\.gz)$",
        &["testing/"],
    ),
];

/// A GitHub repository whose tags need a custom extraction rule
#[derive(Debug, Clone, Copy)]
pub struct GitHubTagRule {
    /// `owner/name`, lowercase
    pub repo: &'static str,
    pub version_pattern: Option<&'static str>,
    pub ignore_pattern: Option<&'static str>,
}

/// Semver-ish tags with an optional `v`, e.g. `v1.1.0` or `4.6.1`
const DOTTED_TAG_PATTERN: &str = r"\b[vV]?(?P<version>(?:\d+(\.\d+){1,2}))\b";

pub const GITHUB_TAG_RULES: &[GitHubTagRule] = &[
    GitHubTagRule {
        repo: "u-boot/u-boot",
        version_pattern: Some(r"(?P<version>v\d{4}\.\d{2})(?:[^\w.-]|$)"),
        ignore_pattern: None,
    },
    GitHubTagRule {
        repo: "bestouff/genext2fs",
        version_pattern: None,
        ignore_pattern: Some(r"debian_version\S+upstream_version\S+"),
    },
    GitHubTagRule {
        repo: "plougher/squashfs-tools",
        version_pattern: Some(DOTTED_TAG_PATTERN),
        ignore_pattern: None,
    },
    GitHubTagRule {
        repo: "pupnp/pupnp",
        version_pattern: Some(r"\brelease-?(?P<version>(?:\d+(\.\d+){1,2}))\b"),
        ignore_pattern: None,
    },
    GitHubTagRule {
        repo: "google/brotli",
        version_pattern: Some(DOTTED_TAG_PATTERN),
        ignore_pattern: None,
    },
    GitHubTagRule {
        repo: "libbpf/bpftool",
        version_pattern: Some(DOTTED_TAG_PATTERN),
        ignore_pattern: None,
    },
    GitHubTagRule {
        repo: "sqlite/sqlite",
        version_pattern: Some(r"\bversion-?(?P<version>(?:\d+(\.\d+){1,2}))\b"),
        ignore_pattern: None,
    },
    GitHubTagRule {
        repo: "llvm/llvm-project",
        version_pattern: Some(r"llvmorg-(?P<version>.+)"),
        ignore_pattern: None,
    },
    // `rpm-4.18.0-release` is 4.18.0 while `rpm-4.18.0-rc1` keeps its suffix.
    // The regex engine has no lookahead, so "not followed by release" is spelled out.
    GitHubTagRule {
        repo: "rpm-software-management/rpm",
        version_pattern: Some(
            r"rpm-(?P<version>[^-]+(?:-[^r].*|-r[^e].*|-re[^l].*|-rel[^e].*|-rele[^a].*|-relea[^s].*|-releas[^e].*)?)",
        ),
        ignore_pattern: None,
    },
];

impl GitHubTagRule {
    pub fn rule(&self) -> Result<ExtractionRule, ReleaseError> {
        let mut rule = ExtractionRule::new();
        if let Some(pattern) = self.version_pattern {
            rule = rule.with_archive_pattern(pattern)?;
        }
        if let Some(pattern) = self.ignore_pattern {
            rule = rule.with_ignore_pattern(pattern)?;
        }
        Ok(rule)
    }
}

/// Returns the directory-listed source for a generic package name
pub fn directory_source(name: &str) -> Option<&'static DirectorySource> {
    DIRECTORY_SOURCES.iter().find(|source| source.name == name)
}

/// Rule for a package hosted on the GNU mirror
pub fn gnu_rule(name: &str) -> Result<ExtractionRule, ReleaseError> {
    let pattern = format!(
        r"^({}-)(?P<version>[\w.-]*)(\.tar\.gz)$",
        regex::escape(name)
    );
    Ok(ExtractionRule::new()
        .with_archive_pattern(&pattern)?
        .with_base_url(format!("{}{}/", GNU_BASE_URL, name)))
}

/// Rule for the tags of a GitHub repository; unknown repositories use the tag as-is
pub fn github_rule(owner: &str, name: &str) -> Result<ExtractionRule, ReleaseError> {
    let repo = format!("{}/{}", owner, name).to_ascii_lowercase();
    match GITHUB_TAG_RULES.iter().find(|entry| entry.repo == repo) {
        Some(entry) => entry.rule(),
        None => Ok(ExtractionRule::new()),
    }
}

/// Rule selecting one package's tags out of the shared miniupnp tag stream
///
/// The package name is an explicit parameter so concurrent lookups for
/// different packages never share state.
pub fn miniupnp_rule(package_name: &str) -> Result<ExtractionRule, ReleaseError> {
    let pattern = format!(r"{}_(?P<version>.+)", regex::escape(package_name));
    ExtractionRule::new().with_archive_pattern(&pattern)
}

pub fn openssl_rule() -> Result<ExtractionRule, ReleaseError> {
    ExtractionRule::new().with_archive_pattern(OPENSSL_TAG_PATTERN)
}

/// Look up the rule for a package by type and name
///
/// `Ok(None)` means the package is not covered by any rule table.
pub fn resolve(package_type: &str, name: &str) -> Result<Option<ExtractionRule>, ReleaseError> {
    match package_type {
        "generic" if MINIUPNP_PACKAGES.contains(&name) => miniupnp_rule(name).map(Some),
        "generic" if name == "erofs-utils" => Ok(Some(ExtractionRule::new())),
        "generic" => directory_source(name).map(DirectorySource::rule).transpose(),
        "gnu" => gnu_rule(name).map(Some),
        "openssl" if name == "openssl" => openssl_rule().map(Some),
        _ => Ok(None),
    }
}
