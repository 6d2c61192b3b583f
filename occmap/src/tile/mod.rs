//! Fixed-width binary occupancy tiles and their gradient/separated
//! variants. A tile's log2-width `W` (`W >= 3`) is a runtime parameter
//! threaded through every cell-addressing call, rather than a compile-time
//! constant, since a single engine instance may host tiles of more than
//! one width over its lifetime.

mod gradient;
mod mini;
mod plain;
mod separated;

pub use gradient::{GradientTile, CMAX};
pub use mini::{bit_index, mini_index, tile_area, tile_area_minis, tile_side, tile_width_minis, LOG2_MINI_W};
pub use plain::PlainTile;
pub use separated::SeparatedTile;
