//! 2D integer and 3D floating-point geometry kernel.
//!
//! The 2D half is integer-only: every occupancy cell lives at an integer
//! lattice coordinate, and boxes are `min`-inclusive / `max`-exclusive so
//! that tile-aligned regions compose without off-by-one slop. The 3D half
//! is floating-point and only exists to support the projection pipeline
//! (camera poses, ray directions); it never touches the lattice directly.

mod box2;
mod line;
mod vec2;
mod vec3;

pub use box2::Box2i;
pub use line::{line_box_intersection, rasterize, LineSegment2i, LineStepper2i};
pub use vec2::Vector2i;
pub use vec3::{Mat3, Rotor3, Transform3, Vector3};
