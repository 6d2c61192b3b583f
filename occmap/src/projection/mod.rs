//! Depth-camera projection pipeline: a camera model, deprojection of a
//! depth image into world-space points, and a ray marcher (plus an
//! occupancy-map-backed collider) that produces synthetic depth images by
//! casting rays through a virtual world.

mod camera;
mod map_collider;
mod marcher;

pub use camera::CamInfo;
pub use map_collider::MapCollider;
pub use marcher::{Collidable, Measurable, RayCollider, RayMarcher, Sphere, VerticalCylinder, VerticalPrism, MAX_DIST, MIN_DIST};

use crate::geometry::{Vector2i, Vector3};

/// Casts one ray per pixel of `cam` through `collider`, writing the +Y
/// (cam-frame "forward") component of each collision into `depths`, which
/// must be `width * height` long, row-major.
pub fn project(cam: &CamInfo, collider: &impl RayCollider, depths: &mut [f32]) {
	tracy::zone!("projection::project");
	assert_eq!(depths.len(), (cam.width() * cam.height()) as usize);
	for y in 0..cam.height() {
		for x in 0..cam.width() {
			let (shift_x, shift_y) = cam.pixel_shift(x, y);
			let dir_cam = Vector3::new(shift_x * cam.image_scale(), 1.0, shift_y * cam.image_scale());
			let origin_world = cam.cam_to_world().translation;
			let dir_world = cam.cam_to_world().rotation * dir_cam;
			let hit_world = collider.collide(origin_world, dir_world);
			let hit_cam = cam.world_to_cam().apply(hit_world);
			depths[(y * cam.width() + x) as usize] = hit_cam.y;
		}
	}
}

/// Inverse of [`project`]: reconstructs a 2D world-space point (dropping the
/// cam-frame Z / world "up" component) for every pixel's depth, in
/// row-major pixel order.
pub fn deproject_2d(cam: &CamInfo, depths: &[f32], mut sink: impl FnMut(Vector2i)) {
	tracy::zone!("projection::deproject_2d");
	assert_eq!(depths.len(), (cam.width() * cam.height()) as usize);
	for y in 0..cam.height() {
		for x in 0..cam.width() {
			let d = depths[(y * cam.width() + x) as usize];
			let world = cam.deproject_pixel(x, y, d);
			sink(Vector2i::new(world.x.floor() as i64, world.y.floor() as i64));
		}
	}
}

/// Like [`deproject_2d`], but emits the full 3D world-space point.
pub fn deproject_3d(cam: &CamInfo, depths: &[f32], mut sink: impl FnMut(Vector3)) {
	tracy::zone!("projection::deproject_3d");
	assert_eq!(depths.len(), (cam.width() * cam.height()) as usize);
	for y in 0..cam.height() {
		for x in 0..cam.width() {
			let d = depths[(y * cam.width() + x) as usize];
			sink(cam.deproject_pixel(x, y, d));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::geometry::Transform3;

	/// S4: a centered beam through an identity-posed camera. The expected
	/// x-coordinates follow directly from `shift_x * image_scale * depth`
	/// (shift_x = -1.5, -0.5, 0.5, 1.5 for a 4-pixel-wide image), floored.
	#[test]
	fn deproject_centered_beam() {
		let cam = CamInfo::new(std::f32::consts::FRAC_PI_2, 4, 1, Transform3::IDENTITY);
		let depths = [10.0f32, 11.0, 12.0, 13.0];
		let mut points = vec![];
		deproject_2d(&cam, &depths, |p| points.push(p));
		assert_eq!(points, vec![Vector2i::new(-8, 10), Vector2i::new(-3, 11), Vector2i::new(3, 12), Vector2i::new(9, 13)]);
	}

	#[test]
	fn project_then_deproject_recovers_depth_for_flat_wall() {
		struct Wall;
		impl RayCollider for Wall {
			fn collide(&self, origin: Vector3, direction: Vector3) -> Vector3 {
				// Plane y = 20, hit by scaling the ray until its y reaches 20.
				let t = (20.0 - origin.y) / direction.y;
				origin + direction * t
			}
		}

		let cam = CamInfo::new(std::f32::consts::FRAC_PI_2, 8, 6, Transform3::IDENTITY);
		let mut depths = vec![0.0f32; 8 * 6];
		project(&cam, &Wall, &mut depths);
		for d in depths {
			assert!((d - 20.0).abs() < 1e-3, "expected depth ~20, got {d}");
		}
	}
}
