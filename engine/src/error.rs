//! Crate wide error type.

use thiserror::Error;

/// Everything that can go wrong while building, loading or customizing a hierarchy.
/// Misuse of the query state machines is a caller bug and panics instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt contraction hierarchy: {0}")]
    Corrupt(String),
    #[error("too many arcs, arc ids must fit into 32 bits")]
    TooManyArcs,
    #[error("could not build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
