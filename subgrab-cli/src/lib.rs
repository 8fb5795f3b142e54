//! Library target for the `subgrab` package.
//!
//! The primary deliverable of this package is the `subgrab` CLI binary
//! (`src/main.rs`). The library holds its argument handling, sinks and
//! progress rendering so they can be tested without spawning the binary.

pub mod cli;
pub mod config;
pub mod error;
pub mod listing;
pub mod progress;
pub mod sink;
pub mod utils;

#[doc(hidden)]
pub use subgrab_engine;
