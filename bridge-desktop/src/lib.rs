//! # Bridge Desktop
//!
//! Desktop implementations of the `bridge-traits` seams. Currently that is
//! the reqwest-backed [`http::ReqwestFetcher`]; file system access goes
//! through `tokio::fs` directly in the core crates.

pub mod http;

pub use http::ReqwestFetcher;
