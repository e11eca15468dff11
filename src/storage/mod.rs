//! Persistence: the JSON store shared with the dashboard and the scan
//! cache abstraction over it.

pub mod store;

pub use store::{JsonStore, MemoryCache, ScanCache, ScanCacheEntry, StoreData};
