//! Offcache - offline-first asset and model cache
//!
//! Precaches a web app's shell into a versioned partition, gates the switch
//! to a new generation on an integrity check, and routes requests through
//! the cache: stale-while-revalidate for the app's own origin, and
//! cache-first with mirror rewriting for model downloads.

pub mod activate;
pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod host;
pub mod http;
pub mod import;
pub mod manifest;
pub mod messaging;
pub mod normalize;
pub mod precache;
pub mod report;
pub mod router;
pub mod store;
pub mod ui;
pub mod verify;
pub mod worker;

#[cfg(test)]
mod testing;

pub use error::{OffcacheError, OffcacheResult};
