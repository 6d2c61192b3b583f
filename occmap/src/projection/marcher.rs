use crate::geometry::{line_box_intersection, Box2i, LineSegment2i, Vector2i, Vector3};

/// Marching stops once the remaining step drops below this; `2^-8`.
pub const MIN_DIST: f32 = 1.0 / 256.0;
/// Marching gives up once cumulative distance exceeds this, reporting a
/// miss at the ray's `MAX_DIST` point rather than failing.
pub const MAX_DIST: f32 = 1024.0;

/// Something that reports a signed distance from an arbitrary point to its
/// surface: negative inside, zero on the surface, positive outside.
pub trait Measurable {
	fn distance(&self, p: Vector3) -> f32;
}

/// Something that reports the distance along a fixed ray to its first
/// collision, computed once for the whole ray rather than re-evaluated as
/// the marcher advances.
pub trait Collidable {
	fn ray_distance(&self, origin: Vector3, direction: Vector3) -> Option<f32>;
}

/// Anything a ray marcher can be asked to collide against.
pub trait RayCollider {
	/// Always returns a point: the surface hit, or the ray's `MAX_DIST`
	/// point if nothing was close enough.
	fn collide(&self, origin: Vector3, direction: Vector3) -> Vector3;
}

#[derive(Copy, Clone, Debug)]
pub struct Sphere {
	pub center: Vector3,
	pub radius: f32,
}

impl Measurable for Sphere {
	fn distance(&self, p: Vector3) -> f32 { (p - self.center).magnitude() - self.radius }
}

/// An infinite cylinder along the world Z axis, over a circle in the XY
/// plane.
#[derive(Copy, Clone, Debug)]
pub struct VerticalCylinder {
	pub center_xy: (f32, f32),
	pub radius: f32,
}

impl Measurable for VerticalCylinder {
	fn distance(&self, p: Vector3) -> f32 {
		let dx = p.x - self.center_xy.0;
		let dy = p.y - self.center_xy.1;
		(dx * dx + dy * dy).sqrt() - self.radius
	}
}

/// An infinite (in Z) vertical prism whose footprint is an integer box in
/// the XY plane. Its ray-distance is computed by clipping the ray's XY
/// projection to the footprint with the same [`line_box_intersection`] the
/// tile iterator uses to prune sub-trees.
#[derive(Copy, Clone, Debug)]
pub struct VerticalPrism {
	pub footprint: Box2i,
}

impl Collidable for VerticalPrism {
	fn ray_distance(&self, origin: Vector3, direction: Vector3) -> Option<f32> {
		if direction.x == 0.0 && direction.y == 0.0 {
			return None;
		}
		let reach = (self.footprint.width().max(self.footprint.height()) as f32 * 2.0).max(1.0) + MAX_DIST;
		let far = origin + direction * reach;
		let seg = LineSegment2i::new(Vector2i::new(origin.x.round() as i64, origin.y.round() as i64), Vector2i::new(far.x.round() as i64, far.y.round() as i64));
		let clipped = line_box_intersection(seg, self.footprint)?;
		let hit = Vector3::new(clipped.a.x as f32, clipped.a.y as f32, 0.0);
		let flat_origin = Vector3::new(origin.x, origin.y, 0.0);
		Some((hit - flat_origin).magnitude())
	}
}

/// Steps along a ray, taking the minimum of every [`Measurable`]'s distance
/// at the current point and every [`Collidable`]'s (fixed) remaining
/// ray-distance, until the step drops below [`MIN_DIST`] (a hit) or
/// cumulative distance exceeds [`MAX_DIST`] (a miss).
#[derive(Default)]
pub struct RayMarcher<'a> {
	measurables: Vec<&'a dyn Measurable>,
	collidables: Vec<&'a dyn Collidable>,
}

impl<'a> RayMarcher<'a> {
	pub fn new() -> Self { RayMarcher { measurables: Vec::new(), collidables: Vec::new() } }

	pub fn with_measurable(mut self, m: &'a dyn Measurable) -> Self {
		self.measurables.push(m);
		self
	}

	pub fn with_collidable(mut self, c: &'a dyn Collidable) -> Self {
		self.collidables.push(c);
		self
	}
}

impl<'a> RayCollider for RayMarcher<'a> {
	fn collide(&self, origin: Vector3, direction: Vector3) -> Vector3 {
		let dir = direction.normalized();
		let collidable_dists: Vec<f32> = self.collidables.iter().filter_map(|c| c.ray_distance(origin, dir)).collect();

		let mut travelled = 0.0f32;
		loop {
			let p = origin + dir * travelled;
			let mut step = f32::INFINITY;
			for m in &self.measurables {
				step = step.min(m.distance(p));
			}
			for &d in &collidable_dists {
				step = step.min(d - travelled);
			}
			let step = step.max(0.0);

			if step < MIN_DIST {
				return p + dir * MIN_DIST;
			}
			travelled += step;
			if travelled > MAX_DIST {
				return origin + dir * MAX_DIST;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	/// S6: a sphere and a prism the ray never enters; the sphere alone
	/// determines the hit.
	#[test]
	fn marches_to_sphere_surface_ignoring_unreached_prism() {
		let sphere = Sphere { center: Vector3::new(0.0, 10.0, 0.0), radius: 3.0 };
		let prism = VerticalPrism { footprint: Box2i::new(Vector2i::new(4, 18), Vector2i::new(6, 22)) };
		let marcher = RayMarcher::new().with_measurable(&sphere).with_collidable(&prism);

		let hit = marcher.collide(Vector3::ZERO, Vector3::new(0.0, 1.0, 0.0));
		assert!((hit.x - 0.0).abs() < 1e-2);
		assert!((hit.y - 7.0).abs() < 1e-2);
		assert!((hit.z - 0.0).abs() < 1e-2);
	}

	#[test]
	fn miss_reports_max_dist_point() {
		let sphere = Sphere { center: Vector3::new(1000.0, 1000.0, 1000.0), radius: 1.0 };
		let marcher = RayMarcher::new().with_measurable(&sphere);
		let hit = marcher.collide(Vector3::ZERO, Vector3::new(0.0, 1.0, 0.0));
		assert!((hit.y - MAX_DIST).abs() < 1.0);
	}

	#[test]
	fn prism_is_hit_when_ray_crosses_its_footprint() {
		let prism = VerticalPrism { footprint: Box2i::new(Vector2i::new(-2, 4), Vector2i::new(2, 8)) };
		let marcher = RayMarcher::new().with_collidable(&prism);
		let hit = marcher.collide(Vector3::ZERO, Vector3::new(0.0, 1.0, 0.0));
		assert!(hit.y >= 4.0 && hit.y < 8.0, "expected a hit inside the prism's footprint, got {:?}", hit);
	}
}
