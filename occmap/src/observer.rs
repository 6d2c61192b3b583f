//! Raises and decays per-cell occupancy certainty from a stream of observed
//! points, reporting only what actually changed.

use crate::{
	error::MapError,
	geometry::{line_box_intersection, Box2i, LineSegment2i, LineStepper2i, Vector2i},
	neighborhood::{Requestee, TileArena, TileHandle, TileNeighborhood},
	quadtree,
	tile::{tile_width_minis, GradientTile, PlainTile, SeparatedTile},
};

/// The unit of storage in the observer's tile graph: a persisted
/// required/temporary layer plus the live certainty view used to decay and
/// refresh it between flushes.
#[derive(Clone)]
pub struct ObservedTile {
	pub separated: SeparatedTile,
	gradient: GradientTile,
}

impl ObservedTile {
	pub fn blank(log2_tile_w: u32) -> Self {
		let separated = SeparatedTile::empty(log2_tile_w);
		let gradient = GradientTile::from_separated(&separated, log2_tile_w);
		ObservedTile { separated, gradient }
	}

	pub fn from_separated(separated: SeparatedTile, log2_tile_w: u32) -> Self {
		let gradient = GradientTile::from_separated(&separated, log2_tile_w);
		ObservedTile { separated, gradient }
	}
}

/// Exposes a tile's certainty view to callers outside this module, such as
/// the projection pipeline's occupancy-map collider, without handing out
/// the whole [`ObservedTile`].
pub trait HasGradient {
	fn gradient(&self) -> &GradientTile;
}

impl HasGradient for ObservedTile {
	fn gradient(&self) -> &GradientTile { &self.gradient }
}

/// Receives one event per occupancy bit that changed and isn't required,
/// with the bit's new state.
pub trait ChangesListener {
	fn on_change(&mut self, point: Vector2i, occupied: bool);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObserverState {
	Idle,
	Accumulating,
	Flushing,
}

/// A grid of minis spanning the 3x3 neighborhood's footprint, collecting one
/// wave of observed points between `move()` and `flush()`. Not tile-aligned
/// to a power of two itself (its side is `3 * 2^W`), so it's its own small
/// type rather than a [`PlainTile`].
struct Aggregator {
	minis: Vec<u64>,
	width_minis: usize,
}

impl Aggregator {
	fn new(log2_tile_w: u32) -> Self {
		let width_minis = 3 * tile_width_minis(log2_tile_w);
		Aggregator { minis: vec![0u64; width_minis * width_minis], width_minis }
	}

	fn clear(&mut self) {
		self.minis.iter_mut().for_each(|m| *m = 0);
	}

	fn side(&self) -> i64 { (self.width_minis * 8) as i64 }

	fn set(&mut self, local_x: i64, local_y: i64) {
		if local_x < 0 || local_y < 0 || local_x >= self.side() || local_y >= self.side() {
			return;
		}
		let idx = (local_x >> 3) as usize + (local_y >> 3) as usize * self.width_minis;
		let bit = (local_x & 7) | ((local_y & 7) << 3);
		self.minis[idx] |= 1u64 << bit;
	}

	fn set_points(&self) -> Vec<Vector2i> {
		let mut points = Vec::new();
		for my in 0..self.width_minis {
			for mx in 0..self.width_minis {
				let mini = self.minis[mx + my * self.width_minis];
				if mini == 0 {
					continue;
				}
				for bit in 0..64u32 {
					if (mini >> bit) & 1 != 0 {
						let local_x = (mx as i64) * 8 + (bit as i64 & 7);
						let local_y = (my as i64) * 8 + (bit as i64 >> 3);
						points.push(Vector2i::new(local_x, local_y));
					}
				}
			}
		}
		points
	}
}

/// Certainty-raise/decay state machine over a 3x3 neighborhood of tiles
/// linked in a [`TileArena`]. Owns the whole local working set of loaded
/// tiles; the persistent map (if any) is synced to it only through the
/// `requestee` callback each `move()` is given.
pub struct OccupancyObserver {
	arena: TileArena<ObservedTile>,
	current: TileHandle,
	position: Vector2i,
	tile_origin: Vector2i,
	log2_tile_w: u32,
	state: ObserverState,
	aggregator: Aggregator,
	aggregator_origin: Vector2i,
}

impl OccupancyObserver {
	pub fn new(initial_position: Vector2i, initial_tile: ObservedTile, any_tile_origin: Vector2i, log2_tile_w: u32) -> Self {
		let mut arena = TileArena::new();
		let current = arena.insert(initial_tile);
		let tile_origin = quadtree::align_down(initial_position, any_tile_origin, log2_tile_w);
		OccupancyObserver {
			arena,
			current,
			position: initial_position,
			tile_origin,
			log2_tile_w,
			state: ObserverState::Idle,
			aggregator: Aggregator::new(log2_tile_w),
			aggregator_origin: Vector2i::ZERO,
		}
	}

	pub fn state(&self) -> ObserverState { self.state }

	pub fn position(&self) -> Vector2i { self.position }

	pub fn current_tile(&self) -> &ObservedTile { self.arena.get(self.current) }

	pub fn arena(&self) -> &TileArena<ObservedTile> { &self.arena }

	/// Recomputes which tile owns `new_position`. If it differs from the
	/// current tile, steps through neighbor links one tile at a time,
	/// asking `requestee` to populate any link that's missing. Fails with
	/// [`MapError::MapEdge`] if a still-missing link leaves nowhere to step.
	pub fn mv(&mut self, new_position: Vector2i, requestee: &mut impl Requestee<ObservedTile>) -> Result<(), MapError> {
		tracy::zone!("OccupancyObserver::move");
		let tile_w = 1i64 << self.log2_tile_w;
		let new_tile_origin = quadtree::align_down(new_position, self.tile_origin, self.log2_tile_w);

		while self.tile_origin != new_tile_origin {
			let disp = new_tile_origin - self.tile_origin;
			let step = |d: i64| -> i32 {
				if d >= tile_w {
					1
				} else if d < 0 {
					-1
				} else {
					0
				}
			};
			let (dx, dy) = (step(disp.x), step(disp.y));
			let nbr_origin = self.tile_origin + Vector2i::new(dx as i64, dy as i64) * tile_w;

			if self.arena.nbr(self.current, dx, dy).is_none() {
				log::debug!("requesting missing neighbor tile at {:?}", nbr_origin);
				requestee.populate(&mut self.arena, self.current, dx, dy, nbr_origin);
			}
			match self.arena.nbr(self.current, dx, dy) {
				Some(next) => {
					self.current = next;
					self.tile_origin = nbr_origin;
				}
				None => {
					log::warn!("observer fell off the loaded tile graph at {:?}", nbr_origin);
					return Err(MapError::MapEdge);
				}
			}
		}

		self.position = new_position;
		self.aggregator_origin = self.tile_origin - Vector2i::new(tile_w, tile_w);
		self.aggregator.clear();
		self.state = ObserverState::Accumulating;
		Ok(())
	}

	/// Marks `point` observed, if it falls within the current neighborhood.
	/// O(1), no allocation.
	pub fn write(&mut self, point: Vector2i) {
		if self.state != ObserverState::Accumulating {
			return;
		}
		let local = point - self.aggregator_origin;
		self.aggregator.set(local.x, local.y);
	}

	/// Runs one decay-then-refresh pass over every point observed since the
	/// last flush, then commits the result. A panicking `listener` leaves
	/// every tile's committed `separated` layer untouched: decay/refresh
	/// mutate only the scratch gradient state, and the actual commit
	/// (writing `separated.temporary`) happens in a final pass after every
	/// listener call for this flush has already returned normally.
	pub fn flush(&mut self, listener: &mut impl ChangesListener) {
		tracy::zone!("OccupancyObserver::flush");
		self.state = ObserverState::Flushing;
		let tile_w = 1i64 << self.log2_tile_w;

		let nbrhood = match TileNeighborhood::build(&self.arena, self.current, self.tile_origin, self.log2_tile_w) {
			Some(n) => n,
			None => {
				log::warn!("flush skipped: neighborhood around {:?} is not fully loaded", self.tile_origin);
				self.state = ObserverState::Idle;
				return;
			}
		};

		let mut touched = [[false; 3]; 3];
		// Cells to refresh once the decay pass below has finished with every
		// aggregator point, so a point observed earlier in this same flush
		// can't be decayed again by a later point's ray (spec.md's decay and
		// refresh are two strictly sequential phases over the whole wave,
		// not interleaved point by point).
		let mut to_refresh: Vec<(i32, i32, Vector2i)> = Vec::new();

		for local in self.aggregator.set_points() {
			let cell = self.aggregator_origin + local;
			let segment = LineSegment2i::new(self.position, cell);

			for dy in -1..=1i32 {
				for dx in -1..=1i32 {
					let tile_origin = nbrhood.origin + Vector2i::new((dx + 1) as i64, (dy + 1) as i64) * tile_w;
					let tile_box = Box2i::from_origin_width(tile_origin, tile_w);

					if let Some(clipped) = line_box_intersection(segment, tile_box) {
						touched[(dy + 1) as usize][(dx + 1) as usize] = true;
						let handle = nbrhood.nbr(dx, dy);
						let mut stepper = LineStepper2i::new(clipped, 1.0);
						loop {
							let c = stepper.cell() - tile_origin;
							if c.x >= 0 && c.y >= 0 && c.x < tile_w && c.y < tile_w {
								self.arena.get_mut(handle).gradient.decrement_if_nonzero(c.x, c.y, self.log2_tile_w);
							}
							if stepper.at_end() {
								break;
							}
							stepper.step();
						}
					}

					if tile_box.contains_point(cell) {
						touched[(dy + 1) as usize][(dx + 1) as usize] = true;
						to_refresh.push((dx, dy, cell - tile_origin));
					}
				}
			}
		}

		for (dx, dy, local_c) in to_refresh {
			let handle = nbrhood.nbr(dx, dy);
			self.arena.get_mut(handle).gradient.refresh(local_c.x, local_c.y, self.log2_tile_w);
		}

		struct Staged {
			handle: TileHandle,
			new_temporary: PlainTile,
			diffs: Vec<(Vector2i, bool)>,
		}
		let side = 1i64 << self.log2_tile_w;
		let mut staged = Vec::new();

		for dy in 0..3usize {
			for dx in 0..3usize {
				if !touched[dy][dx] {
					continue;
				}
				let handle = nbrhood.nbr(dx as i32 - 1, dy as i32 - 1);
				let observed = self.arena.get(handle);
				let compiled = observed.gradient.to_plain(self.log2_tile_w);
				let existing = observed.separated.required.union(&observed.separated.temporary);
				let diff = compiled.symmetric_difference(&existing);
				let reportable = diff.minus(&observed.separated.required);

				let tile_origin = nbrhood.origin + Vector2i::new(dx as i64, dy as i64) * tile_w;
				let mut diffs = Vec::new();
				for y in 0..side {
					for x in 0..side {
						if reportable.get_bit(x, y, self.log2_tile_w) {
							diffs.push((tile_origin + Vector2i::new(x, y), compiled.get_bit(x, y, self.log2_tile_w)));
						}
					}
				}

				let new_temporary = compiled.union(&observed.separated.required);
				staged.push(Staged { handle, new_temporary, diffs });
			}
		}

		for s in &staged {
			for &(point, occupied) in &s.diffs {
				listener.on_change(point, occupied);
			}
		}

		for s in staged {
			self.arena.get_mut(s.handle).separated.temporary = s.new_temporary;
		}

		self.aggregator.clear();
		self.state = ObserverState::Idle;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct CountingListener {
		events: Vec<(Vector2i, bool)>,
	}

	impl ChangesListener for CountingListener {
		fn on_change(&mut self, point: Vector2i, occupied: bool) { self.events.push((point, occupied)); }
	}

	struct BlankRequestee;

	impl Requestee<ObservedTile> for BlankRequestee {
		fn populate(&mut self, arena: &mut TileArena<ObservedTile>, from: TileHandle, dx: i32, dy: i32, _nbr_origin: Vector2i) -> bool {
			let blank = arena.insert(ObservedTile::blank(3));
			arena.connect(from, blank, dx, dy);
			true
		}
	}

	fn fully_linked_observer(log2_tile_w: u32) -> OccupancyObserver {
		let mut observer = OccupancyObserver::new(Vector2i::ZERO, ObservedTile::blank(log2_tile_w), Vector2i::ZERO, log2_tile_w);
		let mut requestee = BlankRequestee;
		let tile_w = 1i64 << log2_tile_w;
		// Force every neighbor link into existence by visiting each of the 8 surrounding tiles.
		for dy in [-1i64, 0, 1] {
			for dx in [-1i64, 0, 1] {
				if dx == 0 && dy == 0 {
					continue;
				}
				observer.mv(Vector2i::new(dx * tile_w, dy * tile_w), &mut requestee).unwrap();
				observer.mv(Vector2i::ZERO, &mut requestee).unwrap();
			}
		}
		observer
	}

	#[test]
	fn move_without_requestee_progress_fails_with_map_edge() {
		let mut observer = OccupancyObserver::new(Vector2i::ZERO, ObservedTile::blank(3), Vector2i::ZERO, 3);
		struct NoOpRequestee;
		impl Requestee<ObservedTile> for NoOpRequestee {
			fn populate(&mut self, _arena: &mut TileArena<ObservedTile>, _from: TileHandle, _dx: i32, _dy: i32, _nbr_origin: Vector2i) -> bool {
				false
			}
		}
		let mut requestee = NoOpRequestee;
		assert!(matches!(observer.mv(Vector2i::new(100, 0), &mut requestee), Err(MapError::MapEdge)));
	}

	#[test]
	fn write_then_flush_raises_certainty_and_reports_change() {
		let mut observer = fully_linked_observer(3);
		let mut requestee = BlankRequestee;
		observer.mv(Vector2i::new(1, 1), &mut requestee).unwrap();
		assert_eq!(observer.state(), ObserverState::Accumulating);

		observer.write(Vector2i::new(2, 2));
		let mut listener = CountingListener { events: Vec::new() };
		observer.flush(&mut listener);

		assert_eq!(observer.state(), ObserverState::Idle);
		assert!(listener.events.iter().any(|&(p, occ)| p == Vector2i::new(2, 2) && occ));
		assert!(observer.current_tile().separated.temporary.get_bit(2, 2, 3));
	}

	#[test]
	fn write_outside_neighborhood_is_discarded() {
		let mut observer = fully_linked_observer(3);
		let mut requestee = BlankRequestee;
		observer.mv(Vector2i::ZERO, &mut requestee).unwrap();
		observer.write(Vector2i::new(10_000, 10_000));
		let mut listener = CountingListener { events: Vec::new() };
		observer.flush(&mut listener);
		assert!(listener.events.is_empty());
	}

	/// Two aggregator points on the same ray, nearer one first: the decay
	/// walk for the farther point passes back over the nearer one, which
	/// must not undercut it below `CMAX` just because its own refresh
	/// hasn't happened yet within this flush.
	#[test]
	fn decay_does_not_undercut_a_point_observed_in_the_same_flush() {
		use crate::tile::CMAX;

		let mut observer = fully_linked_observer(3);
		let mut requestee = BlankRequestee;
		observer.mv(Vector2i::ZERO, &mut requestee).unwrap();

		observer.write(Vector2i::new(5, 0));
		observer.write(Vector2i::new(10, 0));
		let mut listener = CountingListener { events: Vec::new() };
		observer.flush(&mut listener);

		assert_eq!(observer.current_tile().gradient().certainty(5, 0, 3), CMAX);
	}
}
