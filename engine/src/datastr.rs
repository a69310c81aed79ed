//! Data structures used by algorithms.

pub mod graph;
pub mod index_heap;
pub mod rank_select_map;
pub mod timestamped_vector;
