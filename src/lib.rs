//! Inline image uploads for a rich-text editor
//!
//! Inserted images are read, downscaled and re-encoded until they fit a size
//! budget, then resolved as self-contained `data:` URLs. A sibling adapter
//! posts the file to an upload endpoint instead.

pub mod adapter;
pub mod codec;
pub mod data_url;
pub mod error;
pub mod loader;
pub mod mime;
pub mod models;
pub mod repository;
pub mod transcoder;

pub use error::{Error, Result};
