use crate::{
	geometry::{line_box_intersection, Box2i, LineSegment2i, LineStepper2i, Vector2i, Vector3},
	neighborhood::{TileArena, TileNeighborhood},
	observer::HasGradient,
};

use super::marcher::Collidable;

/// Step used to walk a ray through the neighborhood footprint when looking
/// for an occupied cell: fine enough that no 1x1 cell is skipped.
const WALK_STEP: f64 = 1.0 / 8.0;

/// Treats a focal tile's 3x3 neighborhood as a field of vertical prisms,
/// one per cell with non-zero certainty, and collides a ray against
/// whichever such prism it meets first — the collider `project()` uses to
/// synthesize a depth image straight from the occupancy map.
pub struct MapCollider<'a, T> {
	nbrhood: &'a TileNeighborhood,
	arena: &'a TileArena<T>,
	log2_tile_w: u32,
}

impl<'a, T: HasGradient> MapCollider<'a, T> {
	pub fn new(nbrhood: &'a TileNeighborhood, arena: &'a TileArena<T>, log2_tile_w: u32) -> Self {
		MapCollider { nbrhood, arena, log2_tile_w }
	}

	fn cell_occupied(&self, cell: Vector2i) -> bool {
		let bounds = self.nbrhood.bounds(self.log2_tile_w);
		if !bounds.contains_point(cell) {
			return false;
		}
		let tile_w = 1i64 << self.log2_tile_w;
		let rel = cell - self.nbrhood.origin;
		let (tx, ty) = (rel.x.div_euclid(tile_w) as i32 - 1, rel.y.div_euclid(tile_w) as i32 - 1);
		let local = Vector2i::new(rel.x.rem_euclid(tile_w), rel.y.rem_euclid(tile_w));
		let handle = self.nbrhood.nbr(tx, ty);
		self.arena.get(handle).gradient().get_occ(local.x, local.y, self.log2_tile_w)
	}
}

impl<'a, T: HasGradient> Collidable for MapCollider<'a, T> {
	fn ray_distance(&self, origin: Vector3, direction: Vector3) -> Option<f32> {
		let bounds = self.nbrhood.bounds(self.log2_tile_w);
		if direction.x == 0.0 && direction.y == 0.0 {
			return None;
		}
		let reach = bounds.width().max(bounds.height()) as f32 * 2.0;
		let far = origin + direction * reach;
		let seg = LineSegment2i::new(
			Vector2i::new(origin.x.round() as i64, origin.y.round() as i64),
			Vector2i::new(far.x.round() as i64, far.y.round() as i64),
		);
		let clipped = line_box_intersection(seg, bounds)?;

		let mut stepper = LineStepper2i::new(clipped, WALK_STEP);
		let flat_origin = Vector3::new(origin.x, origin.y, 0.0);
		loop {
			let cell = stepper.cell();
			if self.cell_occupied(cell) {
				let hit = Vector3::new(cell.x as f32 + 0.5, cell.y as f32 + 0.5, 0.0);
				return Some((hit - flat_origin).magnitude());
			}
			if stepper.at_end() {
				return None;
			}
			stepper.step();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{observer::ObservedTile, tile::SeparatedTile};

	fn neighborhood_with_one_occupied_cell(log2_tile_w: u32, cell: Vector2i) -> (TileArena<ObservedTile>, TileNeighborhood) {
		let mut arena = TileArena::new();
		let tile_w = 1i64 << log2_tile_w;
		let focal_origin = Vector2i::ZERO;
		let focal = arena.insert(ObservedTile::blank(log2_tile_w));

		for dy in -1..=1i32 {
			for dx in -1..=1i32 {
				if dx == 0 && dy == 0 {
					continue;
				}
				let mut separated = SeparatedTile::empty(log2_tile_w);
				let tile_origin = focal_origin + Vector2i::new(dx as i64, dy as i64) * tile_w;
				if tile_origin.x <= cell.x && cell.x < tile_origin.x + tile_w && tile_origin.y <= cell.y && cell.y < tile_origin.y + tile_w {
					let local = cell - tile_origin;
					separated.required.set_bit(local.x, local.y, log2_tile_w, true);
				}
				let neighbor = arena.insert(ObservedTile::from_separated(separated, log2_tile_w));
				arena.connect(focal, neighbor, dx, dy);
			}
		}
		if focal_origin.x <= cell.x && cell.x < focal_origin.x + tile_w && focal_origin.y <= cell.y && cell.y < focal_origin.y + tile_w {
			let local = cell - focal_origin;
			let mut separated = SeparatedTile::empty(log2_tile_w);
			separated.required.set_bit(local.x, local.y, log2_tile_w, true);
			*arena.get_mut(focal) = ObservedTile::from_separated(separated, log2_tile_w);
		}

		let nbrhood = TileNeighborhood::build(&arena, focal, focal_origin, log2_tile_w).unwrap();
		(arena, nbrhood)
	}

	#[test]
	fn ray_stops_at_first_occupied_cell() {
		let (arena, nbrhood) = neighborhood_with_one_occupied_cell(3, Vector2i::new(5, 0));
		let collider = MapCollider::new(&nbrhood, &arena, 3);
		let hit = collider.ray_distance(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
		assert!(hit.is_some());
		let d = hit.unwrap();
		assert!((d - 5.5).abs() < 0.2, "expected a hit near x=5.5, got distance {d}");
	}

	#[test]
	fn ray_missing_every_occupied_cell_reports_none() {
		let (arena, nbrhood) = neighborhood_with_one_occupied_cell(3, Vector2i::new(5, 0));
		let collider = MapCollider::new(&nbrhood, &arena, 3);
		let hit = collider.ray_distance(Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0));
		assert!(hit.is_none());
	}
}
