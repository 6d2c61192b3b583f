//! Tile iteration: a stateful, single-pass source of `(tile, origin)`
//! pairs over any quadtree-shaped source. [`InMemoryWalker`] is the
//! variant over a live [`Node`] tree; the persistent map's own walker
//! (`map::file::FileWalker`) implements the same trait over its lazily
//! populated file index.

use crate::{
	geometry::{Box2i, Vector2i},
	quadtree::{align_out, next_branch_disp, Info, Node},
};

/// A single-pass source of tiles. `next()` must be callable repeatedly
/// until it returns `None`; `last_origin()` is only meaningful after a
/// `next()` call that returned `Some`.
pub trait TileIStream<T> {
	fn reset(&mut self);
	fn next(&mut self) -> Option<&T>;
	fn last_origin(&self) -> Vector2i;
	fn get_bounds(&self) -> Box2i;
	fn set_bounds(&mut self, new_bounds: Box2i);
}

/// An arbitrary region predicate a tile stream can be filtered against.
/// Implemented by [`Box2i`] itself for the common case, and by anything
/// else (a neighborhood's footprint, a ray's swept volume) that can answer
/// "does my region intersect this box".
pub trait BoxIntersectable {
	fn intersects(&self, b: Box2i) -> bool;
}

impl BoxIntersectable for Box2i {
	fn intersects(&self, b: Box2i) -> bool { Box2i::intersects(self, &b) }
}

/// Depth-first walker over an in-memory [`Node`] tree. Branch order is
/// `0 -> 3` (SW, SE, NW, NE); whole sub-trees whose bounds miss the
/// requested bounds (or an optional limit predicate) are pruned without
/// being visited.
pub struct InMemoryWalker<'a, T> {
	root: Option<&'a Node<T>>,
	root_info: Info,
	log2_tile_w: u32,
	bounds: Box2i,
	limit: Option<Box<dyn BoxIntersectable + 'a>>,
	stack: Vec<(&'a Node<T>, Info, u8)>,
	last_origin: Vector2i,
}

impl<'a, T> InMemoryWalker<'a, T> {
	pub fn new(root: Option<&'a Node<T>>, root_info: Info, log2_tile_w: u32) -> Self {
		let bounds = root_info.bounds(log2_tile_w);
		let mut w = InMemoryWalker { root, root_info, log2_tile_w, bounds, limit: None, stack: Vec::new(), last_origin: Vector2i::ZERO };
		w.reset();
		w
	}

	pub fn with_limit(root: Option<&'a Node<T>>, root_info: Info, log2_tile_w: u32, limit: Box<dyn BoxIntersectable + 'a>) -> Self {
		let mut w = Self::new(root, root_info, log2_tile_w);
		w.limit = Some(limit);
		w.reset();
		w
	}

	fn passes_limit(&self, b: Box2i) -> bool { self.limit.as_ref().map_or(true, |l| l.intersects(b)) }
}

impl<'a, T> TileIStream<T> for InMemoryWalker<'a, T> {
	fn reset(&mut self) {
		self.stack.clear();
		if let Some(node) = self.root {
			let b = self.root_info.bounds(self.log2_tile_w);
			if b.intersects(&self.bounds) && self.passes_limit(b) {
				self.stack.push((node, self.root_info, 0));
			}
		}
	}

	fn next(&mut self) -> Option<&T> {
		loop {
			let (node, info, idx) = self.stack.last().copied()?;
			match node {
				Node::Leaf(tile) => {
					self.stack.pop();
					self.last_origin = info.origin;
					return Some(tile);
				}
				Node::Branch(children) => {
					if idx >= 4 {
						self.stack.pop();
						continue;
					}
					self.stack.last_mut().unwrap().2 += 1;
					let child_depth = info.depth - 1;
					let hwidth = 1i64 << (child_depth + self.log2_tile_w);
					let child_origin = info.origin + next_branch_disp(idx as usize, hwidth);
					let child_info = Info::new(child_origin, child_depth);
					let child_bounds = child_info.bounds(self.log2_tile_w);
					if !child_bounds.intersects(&self.bounds) || !self.passes_limit(child_bounds) {
						continue;
					}
					match &children[idx as usize] {
						None => continue,
						Some(Node::Leaf(tile)) => {
							self.last_origin = child_origin;
							return Some(tile);
						}
						Some(child @ Node::Branch(_)) => {
							self.stack.push((child, child_info, 0));
						}
					}
				}
			}
		}
	}

	fn last_origin(&self) -> Vector2i { self.last_origin }

	fn get_bounds(&self) -> Box2i { self.bounds }

	fn set_bounds(&mut self, new_bounds: Box2i) {
		let aligned = align_out(new_bounds, self.root_info.origin, self.log2_tile_w);
		self.bounds = self.root_info.bounds(self.log2_tile_w).intersection(aligned);
		self.reset();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::quadtree::alloc_mut;

	#[test]
	fn walker_visits_every_leaf_exactly_once() {
		let mut root: Option<Node<u8>> = None;
		let info = Info::new(Vector2i::ZERO, 2);
		for p in [Vector2i::new(0, 0), Vector2i::new(20, 0), Vector2i::new(0, 20), Vector2i::new(20, 20)] {
			alloc_mut(&mut root, info, p, 0, 3);
		}

		let mut walker = InMemoryWalker::new(root.as_ref(), info, 3);
		let mut count = 0;
		let mut origins = vec![];
		while walker.next().is_some() {
			origins.push(walker.last_origin());
			count += 1;
		}
		assert_eq!(count, 4);
		for p in [Vector2i::new(0, 0), Vector2i::new(16, 0), Vector2i::new(0, 16), Vector2i::new(16, 16)] {
			assert!(origins.contains(&p), "missing origin {:?}", p);
		}
	}

	#[test]
	fn set_bounds_restricts_visited_tiles() {
		let mut root: Option<Node<u8>> = None;
		let info = Info::new(Vector2i::ZERO, 2);
		for p in [Vector2i::new(0, 0), Vector2i::new(20, 0)] {
			alloc_mut(&mut root, info, p, 0, 3);
		}

		let mut walker = InMemoryWalker::new(root.as_ref(), info, 3);
		walker.set_bounds(Box2i::from_origin_width(Vector2i::ZERO, 8));
		let mut count = 0;
		while walker.next().is_some() {
			count += 1;
		}
		assert_eq!(count, 1);
	}
}
