use crate::{
	error::MapError,
	geometry::{Box2i, Vector2i},
	quadtree::{self, Combinable, Info, Node, WriteMode},
	stream::{BoxIntersectable, InMemoryWalker, TileIStream},
};

/// Owns a quadtree of tiles, growing monotonically by root-doubling
/// ("stretch") in whichever direction a write needs to reach. Tiles are
/// owned by their parent node; the whole tree is dropped recursively when
/// the map is.
pub struct InMemoryMap<T> {
	root: Option<Node<T>>,
	info: Info,
	log2_tile_w: u32,
	write_mode: WriteMode,
}

impl<T: Default + Clone + Combinable> InMemoryMap<T> {
	pub fn new(origin: Vector2i, log2_tile_w: u32) -> Self {
		InMemoryMap { root: None, info: Info::new(origin, 1), log2_tile_w, write_mode: WriteMode::Overwrite }
	}

	pub fn write_mode(&self) -> WriteMode { self.write_mode }

	pub fn set_write_mode(&mut self, mode: WriteMode) { self.write_mode = mode; }

	pub fn get_bounds(&self) -> Box2i { self.info.bounds(self.log2_tile_w) }

	/// Returns the leaf at `p` if present, or `Ok(None)` if `p` is in bounds
	/// but unwritten. Fails with [`MapError::BoundsViolation`] if `p` falls
	/// outside [`InMemoryMap::get_bounds`] — this map never auto-stretches
	/// on read, only on write. Never allocates or mutates.
	pub fn read(&self, p: Vector2i) -> Result<Option<&T>, MapError> {
		if !self.get_bounds().contains_point(p) {
			return Err(MapError::BoundsViolation);
		}
		let root = match self.root.as_ref() {
			Some(root) => root,
			None => return Ok(None),
		};
		let (node, leaf_info) = quadtree::seek(root, self.info, p, 0, self.log2_tile_w);
		if leaf_info.depth != 0 {
			return Ok(None);
		}
		match node {
			Node::Leaf(tile) => Ok(Some(tile)),
			Node::Branch(_) => Ok(None),
		}
	}

	pub fn read_stream(&self) -> InMemoryWalker<'_, T> { InMemoryWalker::new(self.root.as_ref(), self.info, self.log2_tile_w) }

	pub fn read_limited(&self, limit: Box<dyn BoxIntersectable + '_>) -> InMemoryWalker<'_, T> {
		InMemoryWalker::with_limit(self.root.as_ref(), self.info, self.log2_tile_w, limit)
	}

	/// `fit(p)`, `alloc(root, p, 0)`, then copy or combine into the leaf
	/// depending on `write_mode`.
	pub fn write(&mut self, p: Vector2i, tile: T) {
		tracy::zone!("InMemoryMap::write");
		quadtree::fit_point(&mut self.root, &mut self.info, p, self.log2_tile_w);
		let (node, _) = quadtree::alloc_mut(&mut self.root, self.info, p, 0, self.log2_tile_w);
		match node {
			Node::Leaf(existing) => match self.write_mode {
				WriteMode::Overwrite => *existing = tile,
				WriteMode::Add => existing.combine(&tile),
			},
			Node::Branch(_) => unreachable!("alloc_mut at depth 0 always yields a leaf"),
		}
	}

	/// `fit(stream.bounds())`; finds the tightest sub-item containing the
	/// stream's bounds, allocates it, then allocates and combines each
	/// incoming tile. A stream with zero-area bounds is a silent no-op.
	pub fn write_stream(&mut self, src: &mut impl TileIStream<T>) {
		tracy::zone!("InMemoryMap::write_stream");
		let bounds = src.get_bounds();
		if bounds.area() == 0 {
			return;
		}
		quadtree::fit_box(&mut self.root, &mut self.info, bounds, self.log2_tile_w);
		let virtual_dst = quadtree::fitted_info(self.info, bounds, self.log2_tile_w);
		quadtree::alloc_mut(&mut self.root, self.info, virtual_dst.origin, virtual_dst.depth, self.log2_tile_w);
		while let Some(next_tile) = src.next() {
			let origin = src.last_origin();
			let (node, _) = quadtree::alloc_mut(&mut self.root, self.info, origin, 0, self.log2_tile_w);
			match node {
				Node::Leaf(existing) => match self.write_mode {
					WriteMode::Overwrite => *existing = next_tile.clone(),
					WriteMode::Add => existing.combine(next_tile),
				},
				Node::Branch(_) => unreachable!("alloc_mut at depth 0 always yields a leaf"),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tile::PlainTile;

	#[test]
	fn write_then_read_round_trips() {
		let mut map = InMemoryMap::<PlainTile>::new(Vector2i::ZERO, 3);
		let mut t = PlainTile::empty(3);
		t.set_bit(1, 1, 3, true);
		map.write(Vector2i::new(0, 0), t.clone());
		assert_eq!(map.read(Vector2i::new(0, 0)).unwrap(), Some(&t));
		// In bounds (the root's initial depth-1 span covers it) but never
		// written.
		assert_eq!(map.read(Vector2i::new(10, 10)).unwrap(), None);
	}

	#[test]
	fn read_outside_bounds_is_a_bounds_violation() {
		let map = InMemoryMap::<PlainTile>::new(Vector2i::ZERO, 3);
		assert!(matches!(map.read(Vector2i::new(100, 100)), Err(MapError::BoundsViolation)));
	}

	#[test]
	fn write_stretches_root_to_contain_negative_point() {
		let mut map = InMemoryMap::<PlainTile>::new(Vector2i::ZERO, 4);
		let t = PlainTile::empty(4);
		map.write(Vector2i::new(-25, 5), t.clone());
		assert!(map.get_bounds().contains_point(Vector2i::new(-25, 5)));
		assert_eq!(map.read(Vector2i::new(-25, 5)).unwrap(), Some(&t));
	}
}
