//! Workspace facade crate.
//!
//! Re-exports the individual workspace crates so host applications can depend
//! on `asset-library-core` alone instead of wiring each member crate
//! individually.

pub use bridge_desktop;
pub use bridge_traits;
pub use core_catalog;
pub use core_runtime;
pub use core_sync;
pub use core_thumbs;
