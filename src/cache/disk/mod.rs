//! Disk-based generation storage
//!
//! Each generation lives in its own directory under the cache root; a JSON
//! manifest at the root records generation ids in creation order. Every entry is a
//! `.meta` file (status, headers, name of the body file) plus a `.data` body file.
//! A write stores a fresh body file first and then swaps the metadata in with an
//! atomic rename, so readers see either the old entry or the new one.

pub mod backend;
mod error;
mod storage;
pub mod tokio_backend;
mod types;
mod utils;

pub use self::error::DiskCacheError;
pub use self::storage::DiskCacheStorage;
