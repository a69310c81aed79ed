//! Contraction Hierarchies and Customizable Contraction Hierarchies for fast shortest path queries on road networks.
//!
//! The crate is split into leaf data structures (`datastr`), the routing algorithms (`algo`)
//! and a few utilities for file IO, reporting and permutations.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod report;
pub mod algo;
pub mod datastr;
pub mod error;
pub mod io;
pub mod util;

pub use error::{Error, Result};

pub mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
