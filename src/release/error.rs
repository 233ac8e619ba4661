use thiserror::Error;

/// Failure of a whole enumeration call
///
/// Per-candidate problems (a tag that does not match, a row without a
/// version) never surface here; they only drop that candidate.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Rate limited: retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Package not found: {0}")]
    NotFound(String),

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("GitHub API token not set: set GH_TOKEN or the githubToken config field")]
    MissingCredential,

    #[error("Invalid GitHub token: {0}")]
    InvalidCredential(String),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Invalid extraction pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
