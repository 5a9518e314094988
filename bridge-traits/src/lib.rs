//! # Bridge Traits
//!
//! Platform abstraction seams for the asset library core.
//!
//! The core crates never talk to the network or to a rendering toolkit
//! directly. They depend on the traits defined here, and a host platform
//! supplies the implementations:
//!
//! - [`http::AssetFetcher`]: one GET-to-memory call and one streaming
//!   download-to-file call (implemented by `bridge-desktop` with reqwest)
//! - [`ui::RefreshSink`]: a changed-region notification any presentation
//!   layer can implement; the thumbnail cache has no thread-affinity to a
//!   specific rendering model

pub mod error;
pub mod http;
pub mod ui;

pub use error::{BridgeError, Result};
pub use http::AssetFetcher;
pub use ui::{NullRefreshSink, RefreshSink};
