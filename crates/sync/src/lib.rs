//! Media synchronisation for the camera
//!
//! This crate provides:
//! - Streaming downloads and the two bulk sync walks (`engine`)
//! - A cooperative cancellation flag for the date-index walk (`cancel`)
//! - `CameraSession`, which chains discovery, tree generation and sync (`session`)
//!
//! ```
//! use alphasync_sync::SyncCancel;
//!
//! let cancel = SyncCancel::new();
//! let handle = cancel.clone();
//! handle.cancel();
//! assert!(cancel.take());
//! assert!(!cancel.is_cancelled());
//! ```

pub mod cancel;
pub mod engine;
pub mod session;

pub use cancel::SyncCancel;
pub use engine::SyncEngine;
pub use session::CameraSession;
