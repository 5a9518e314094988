//! # Core Catalog Module
//!
//! Typed view of the remote asset service and the on-disk library:
//! - Asset records and download manifests parsed from service JSON
//! - Asset list retrieval with an on-disk cache and freshness window
//! - Content store for per-asset directories, marker files, and payloads
//!
//! ## Overview
//!
//! The catalog layer owns everything about *what* exists, remotely and
//! locally. It never downloads payloads itself; the sync layer drives
//! downloads through `bridge-traits` and uses this crate to decide which
//! assets need work and where their files belong.

pub mod catalog;
pub mod error;
pub mod models;
pub mod store;

pub use catalog::AssetCatalog;
pub use error::{CatalogError, Result};
pub use models::{AssetKind, AssetRecord, DownloadManifest, FileEntry};
pub use store::ContentStore;
