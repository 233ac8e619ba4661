//! Package identity and the records produced for it

pub mod types;

pub use types::{PackageId, PackageVersion, Release, SourceKind};
