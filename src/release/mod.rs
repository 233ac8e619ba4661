//! Release discovery layer
//!
//! Turns a [`PackageId`](crate::package::types::PackageId) into a lazy stream
//! of normalized releases, reading whichever upstream publishes that package.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Router    │────▶│  Resolver   │────▶│ Normalizer  │
//! │ (dispatch)  │     │ (filtering) │     │ (versions)  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                   ▲
//!        ▼                   │
//! ┌─────────────┐     ┌─────────────┐
//! │    Rules    │     │   Sources   │
//! │  (tables)   │     │ (upstreams) │
//! └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`router`]: Pattern dispatch from a package route key to a source and rule
//! - [`resolver`]: Pulls candidates, normalizes them and stops early on a requested version
//! - [`source`]: Source trait and the raw candidate type
//! - [`sources`]: Concrete sources (directory listings, GitHub tags, registries, static tables)
//! - [`rule`]: Extraction rule record
//! - [`rules`]: Bundled per-package rule tables
//! - [`normalizer`]: Version extraction and canonicalization
//! - [`http`]: HTTP fetch primitive
//! - [`listing`]: HTML autoindex parser
//! - [`timestamp`]: Upstream date parsing
//! - [`error`]: Error type for enumeration failures

pub mod error;
pub mod http;
pub mod listing;
pub mod normalizer;
pub mod resolver;
pub mod router;
pub mod rule;
pub mod rules;
pub mod source;
pub mod sources;
pub mod timestamp;
