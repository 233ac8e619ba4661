//! Release discovery and normalization across package ecosystems
//!
//! Given a decomposed package identifier, `release-finder` enumerates the
//! published releases of that package from its upstream (a language registry,
//! a GitHub tag stream, an HTML directory index or a frozen table) and
//! normalizes each one into a [`package::types::Release`].

pub mod config;
pub mod package;
pub mod release;
