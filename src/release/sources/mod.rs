//! Release source implementations, one per upstream kind

pub mod bitbucket;
pub mod composer;
pub mod conan;
pub mod crates_io;
pub mod debian;
pub mod directory;
pub mod github;
pub mod go_proxy;
pub mod hex;
pub mod launchpad;
pub mod maven;
pub mod npm;
pub mod nuget;
pub mod pypi;
pub mod rubygems;
pub mod static_table;

pub use bitbucket::BitbucketTagSource;
pub use composer::ComposerSource;
pub use conan::ConanSource;
pub use crates_io::CratesIoSource;
pub use debian::DebianSource;
pub use directory::{DirectoryListingSource, NestedDirectoryListingSource};
pub use github::GitHubTagSource;
pub use go_proxy::GoProxySource;
pub use hex::HexSource;
pub use launchpad::LaunchpadSource;
pub use maven::MavenSource;
pub use npm::NpmSource;
pub use nuget::NuGetSource;
pub use pypi::PypiSource;
pub use rubygems::RubyGemsSource;
pub use static_table::StaticTableSource;

use std::future::Future;

use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};

use crate::release::error::ReleaseError;
use crate::release::source::{RawRelease, RawReleaseStream};

/// End `stream` right after its first error
///
/// The inner stream is never polled again once it has failed, so no request
/// queued behind the failing one is issued.
pub(crate) fn stop_after_error<T, S>(stream: S) -> BoxStream<'static, Result<T, ReleaseError>>
where
    T: Send + 'static,
    S: Stream<Item = Result<T, ReleaseError>> + Send + 'static,
{
    stream::unfold(Some(stream.boxed()), |pending| async move {
        let mut stream = pending?;
        let item = stream.next().await?;
        let pending = item.is_ok().then_some(stream);
        Some((item, pending))
    })
    .boxed()
}

/// Flatten a lazy stream of fetched pages into a stream of candidates
///
/// The next page is only requested once every candidate of the current page
/// has been pulled, and a failed page ends the stream.
pub(crate) fn flatten_pages<S>(pages: S) -> RawReleaseStream
where
    S: Stream<Item = Result<Vec<RawRelease>, ReleaseError>> + Send + 'static,
{
    stop_after_error(pages)
        .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<_, ReleaseError>)))
        .try_flatten()
        .boxed()
}

/// Stream over an upstream that answers with all candidates in one response
pub(crate) fn single_page<F>(fetch: F) -> RawReleaseStream
where
    F: Future<Output = Result<Vec<RawRelease>, ReleaseError>> + Send + 'static,
{
    flatten_pages(stream::once(fetch))
}

/// Stream that yields nothing and performs no request
pub(crate) fn empty() -> RawReleaseStream {
    stream::empty().boxed()
}

/// Stream whose first pull fails with `error`
pub(crate) fn failed(error: ReleaseError) -> RawReleaseStream {
    stream::once(async move { Err(error) }).boxed()
}

/// Drop the `0:` epoch Debian-style versions carry by default
pub(crate) fn strip_default_epoch(version: &str) -> &str {
    version.strip_prefix("0:").unwrap_or(version)
}

/// Join a base URL and a path without doubling the slash
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
