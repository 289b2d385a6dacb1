//! Retrieval of packages from the shared cache.
//!
//! Coordinates whether a `(name, version)` pair needs re-fetching and
//! holds the cross-process lock while it is mutated; the actual network
//! or filesystem acquisition is delegated to `crate::remote`.

pub mod cache;

pub use self::cache::Cache;
