//! Tiles near the robot are linked into a small graph so the observer can
//! step from tile to tile in O(1) without re-descending the map's quadtree
//! on every move. Ownership is arena-style, the same choice made for the
//! quadtree itself: tiles live in a [`TileArena`] and refer to each other by
//! index rather than by pointer.

use crate::geometry::{Box2i, Vector2i};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileHandle(usize);

struct Slot<T> {
	tile: T,
	nbrs: [Option<TileHandle>; 8],
}

/// Maps `(dx, dy)`, `dx, dy in {-1, 0, 1}` and not both zero, to a slot in
/// the 8-element neighbor array: row-major over the 3x3 neighborhood with
/// the center (0, 0) excluded.
fn nbr_slot_index(dx: i32, dy: i32) -> usize {
	let compressed = ((dx + 1) + 3 * (dy + 1)) as usize;
	compressed - (compressed > 4) as usize
}

/// Owns every tile the robot has loaded near its path. Never shrinks; a
/// tile is evicted only by dropping the whole arena.
pub struct TileArena<T> {
	slots: Vec<Slot<T>>,
}

impl<T> TileArena<T> {
	pub fn new() -> Self { TileArena { slots: Vec::new() } }

	pub fn insert(&mut self, tile: T) -> TileHandle {
		self.slots.push(Slot { tile, nbrs: [None; 8] });
		TileHandle(self.slots.len() - 1)
	}

	pub fn get(&self, h: TileHandle) -> &T { &self.slots[h.0].tile }

	pub fn get_mut(&mut self, h: TileHandle) -> &mut T { &mut self.slots[h.0].tile }

	/// The tile at `(dx, dy)` relative to `h`, if linked. `(0, 0)` is `h`
	/// itself.
	pub fn nbr(&self, h: TileHandle, dx: i32, dy: i32) -> Option<TileHandle> {
		if dx == 0 && dy == 0 {
			return Some(h);
		}
		self.slots[h.0].nbrs[nbr_slot_index(dx, dy)]
	}

	/// Symmetrically links `a` and `b`, with `b` at `a`'s `(dx, dy)` (and
	/// `a` at `b`'s `(-dx, -dy)`). Called once, when a tile is created or
	/// loaded next to one already in the arena.
	pub fn connect(&mut self, a: TileHandle, b: TileHandle, dx: i32, dy: i32) {
		self.slots[a.0].nbrs[nbr_slot_index(dx, dy)] = Some(b);
		self.slots[b.0].nbrs[nbr_slot_index(-dx, -dy)] = Some(a);
	}
}

impl<T> Default for TileArena<T> {
	fn default() -> Self { Self::new() }
}

/// Populates a missing neighbor on demand: creates a blank tile or lazily
/// loads one from persistent storage, inserts it into `arena`, and `connect`s
/// it to `from`. Returns `false` if no such tile exists (the edge of
/// persistent storage with nothing there to load).
pub trait Requestee<T> {
	fn populate(&mut self, arena: &mut TileArena<T>, from: TileHandle, dx: i32, dy: i32, nbr_origin: Vector2i) -> bool;
}

/// A focal tile plus its eight neighbors, as a 3x3 snapshot taken from the
/// arena. `origin` is the southwest corner of the southwest neighbor.
pub struct TileNeighborhood {
	pub origin: Vector2i,
	handles: [[TileHandle; 3]; 3],
}

impl TileNeighborhood {
	/// Builds a snapshot around `focal` (whose own tile-aligned origin is
	/// `focal_origin`). Returns `None` if any of the eight neighbors isn't
	/// currently linked.
	pub fn build<T>(arena: &TileArena<T>, focal: TileHandle, focal_origin: Vector2i, log2_tile_w: u32) -> Option<Self> {
		let mut handles = [[focal; 3]; 3];
		for dy in -1..=1i32 {
			for dx in -1..=1i32 {
				handles[(dy + 1) as usize][(dx + 1) as usize] = arena.nbr(focal, dx, dy)?;
			}
		}
		let tile_w = 1i64 << log2_tile_w;
		let origin = focal_origin - Vector2i::new(tile_w, tile_w);
		Some(TileNeighborhood { origin, handles })
	}

	pub fn nbr(&self, dx: i32, dy: i32) -> TileHandle { self.handles[(dy + 1) as usize][(dx + 1) as usize] }

	pub fn bounds(&self, log2_tile_w: u32) -> Box2i { Box2i::from_origin_width(self.origin, 3 * (1i64 << log2_tile_w)) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn connect_is_symmetric_and_skips_center() {
		let mut arena = TileArena::new();
		let a = arena.insert(1u8);
		let b = arena.insert(2u8);
		arena.connect(a, b, 1, 0);
		assert_eq!(arena.nbr(a, 1, 0), Some(b));
		assert_eq!(arena.nbr(b, -1, 0), Some(a));
		assert_eq!(arena.nbr(a, 0, 0), Some(a));
		assert_eq!(arena.nbr(a, -1, 0), None);
	}

	#[test]
	fn neighborhood_requires_all_eight_links() {
		let mut arena = TileArena::new();
		let focal = arena.insert(0u8);
		let east = arena.insert(1u8);
		arena.connect(focal, east, 1, 0);
		assert!(TileNeighborhood::build(&arena, focal, Vector2i::ZERO, 3).is_none());

		for dy in -1..=1i32 {
			for dx in -1..=1i32 {
				if dx == 0 && dy == 0 || arena.nbr(focal, dx, dy).is_some() {
					continue;
				}
				let t = arena.insert(0u8);
				arena.connect(focal, t, dx, dy);
			}
		}
		let nbrhood = TileNeighborhood::build(&arena, focal, Vector2i::ZERO, 3).unwrap();
		assert_eq!(nbrhood.origin, Vector2i::new(-8, -8));
		assert_eq!(nbrhood.nbr(1, 0), east);
	}
}
