//! Shared value types: world rectangles, pixel sizes, tile/slab limits and
//! slab coordinates with their base-36 filesystem encoding.

mod geo_rect;
mod limits;
mod pyramid;
mod size;
mod slab;

pub use geo_rect::*;
pub use limits::*;
pub use pyramid::*;
pub use size::*;
pub use slab::*;
