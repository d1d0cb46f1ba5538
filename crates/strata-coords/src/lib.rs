//! Region addressing for the streaming world.
//!
//! The world is cut into fixed-size cubic regions addressed by an integer
//! triple. Region `c` is centred on `c * size` and spans
//! `[c * size - size / 2, c * size + size / 2)` on every axis. Geometry is
//! expressed relative to the region's min corner and translated to world space
//! by a single additive offset, so math inside a region never sees large
//! world coordinates.

mod aabb;
mod coord;
mod layout;
mod side;

pub use aabb::Aabb;
pub use coord::RegionCoord;
pub use layout::{LayoutError, RegionLayout};
pub use side::BoundarySide;
