//! Core model of the ortho mosaic tile cache: pyramid descriptor, tile/slab
//! geometry, color registry, metadata persistence and the job DAG emitted for
//! distributed execution.

pub mod grid;
pub mod jobs;
pub mod metadata;
pub use metadata::*;
pub mod progress;
pub mod registry;
pub use registry::*;
pub mod types;
pub use types::*;
