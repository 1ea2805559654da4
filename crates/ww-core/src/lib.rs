//! wastewise/crates/ww-core/src/lib.rs
//!
//! Domain types and interface definitions for WasteWise.

pub mod error;
pub mod geo;
pub mod models;
pub mod subscription;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use subscription::*;
pub use traits::*;
