use std::ops::{Add, Mul, Neg, Sub};

/// A point or direction in camera/world space.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vector3 {
	pub x: f32,
	pub y: f32,
	pub z: f32,
}

impl Vector3 {
	pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

	pub fn new(x: f32, y: f32, z: f32) -> Self { Vector3 { x, y, z } }

	pub fn dot(self, rhs: Vector3) -> f32 { self.x * rhs.x + self.y * rhs.y + self.z * rhs.z }

	pub fn cross(self, rhs: Vector3) -> Vector3 {
		Vector3::new(
			self.y * rhs.z - self.z * rhs.y,
			self.z * rhs.x - self.x * rhs.z,
			self.x * rhs.y - self.y * rhs.x,
		)
	}

	pub fn magnitude(self) -> f32 { self.dot(self).sqrt() }

	pub fn normalized(self) -> Vector3 { self * (1.0 / self.magnitude()) }
}

impl Add for Vector3 {
	type Output = Vector3;

	fn add(self, rhs: Vector3) -> Vector3 { Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z) }
}

impl Sub for Vector3 {
	type Output = Vector3;

	fn sub(self, rhs: Vector3) -> Vector3 { Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z) }
}

impl Neg for Vector3 {
	type Output = Vector3;

	fn neg(self) -> Vector3 { Vector3::new(-self.x, -self.y, -self.z) }
}

impl Mul<f32> for Vector3 {
	type Output = Vector3;

	fn mul(self, rhs: f32) -> Vector3 { Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs) }
}

/// Row-major 3x3 matrix, used exclusively for rotations in the projection
/// pipeline.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Mat3 {
	pub rows: [[f32; 3]; 3],
}

impl Mat3 {
	pub const IDENTITY: Mat3 = Mat3 {
		rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
	};

	pub fn from_rows(r0: Vector3, r1: Vector3, r2: Vector3) -> Self {
		Mat3 {
			rows: [[r0.x, r0.y, r0.z], [r1.x, r1.y, r1.z], [r2.x, r2.y, r2.z]],
		}
	}

	/// Valid as a true inverse only when the matrix is orthonormal (a pure
	/// rotation), which is the only case the projection pipeline ever needs.
	pub fn transpose(&self) -> Mat3 {
		let m = &self.rows;
		Mat3 {
			rows: [
				[m[0][0], m[1][0], m[2][0]],
				[m[0][1], m[1][1], m[2][1]],
				[m[0][2], m[1][2], m[2][2]],
			],
		}
	}
}

impl Mul for Mat3 {
	type Output = Mat3;

	fn mul(self, rhs: Mat3) -> Mat3 {
		let mut rows = [[0.0; 3]; 3];
		for i in 0..3 {
			for j in 0..3 {
				rows[i][j] = (0..3).map(|k| self.rows[i][k] * rhs.rows[k][j]).sum();
			}
		}
		Mat3 { rows }
	}
}

impl Mul<Vector3> for Mat3 {
	type Output = Vector3;

	fn mul(self, v: Vector3) -> Vector3 {
		let m = &self.rows;
		Vector3::new(
			m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
			m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
			m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
		)
	}
}

/// A rigid transform (rotation + translation), used to keep a camera's pose
/// and its world/camera-frame conversions in lock step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform3 {
	pub rotation: Mat3,
	pub translation: Vector3,
}

impl Transform3 {
	pub const IDENTITY: Transform3 = Transform3 {
		rotation: Mat3::IDENTITY,
		translation: Vector3::ZERO,
	};

	pub fn new(rotation: Mat3, translation: Vector3) -> Self { Transform3 { rotation, translation } }

	/// True inverse only when `rotation` is orthonormal.
	pub fn inverse(&self) -> Transform3 {
		let rt = self.rotation.transpose();
		Transform3::new(rt, -(rt * self.translation))
	}

	pub fn apply(&self, p: Vector3) -> Vector3 { self.rotation * p + self.translation }
}

impl Mul for Transform3 {
	type Output = Transform3;

	fn mul(self, rhs: Transform3) -> Transform3 {
		Transform3::new(self.rotation * rhs.rotation, self.rotation * rhs.translation + self.translation)
	}
}

/// Half-angle scalar + bivector representation of a rotation, constructed
/// from an axis and angle. Cheaper to compose than `Mat3` when chaining
/// several rotations, at the cost of needing [`Rotor3::to_mat3`] before use
/// in the camera pipeline.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rotor3 {
	pub a: f32,
	pub b: Vector3,
}

impl Rotor3 {
	/// `axis` need not be normalized.
	pub fn from_axis_angle(axis: Vector3, theta: f32) -> Self {
		let half = theta * 0.5;
		Rotor3 {
			a: half.cos(),
			b: -axis.normalized() * half.sin(),
		}
	}

	pub fn invert(self) -> Rotor3 { Rotor3 { a: self.a, b: -self.b } }

	pub fn apply(self, v: Vector3) -> Vector3 {
		let b_cross_v = self.b.cross(v);
		v * (self.a * self.a) - b_cross_v * (2.0 * self.a) + self.b.cross(b_cross_v) + self.b * self.b.dot(v)
	}

	pub fn to_mat3(self) -> Mat3 {
		Mat3::from_rows(
			self.apply(Vector3::new(1.0, 0.0, 0.0)),
			self.apply(Vector3::new(0.0, 1.0, 0.0)),
			self.apply(Vector3::new(0.0, 0.0, 1.0)),
		)
		.transpose()
	}
}

impl Mul for Rotor3 {
	type Output = Rotor3;

	fn mul(self, rhs: Rotor3) -> Rotor3 {
		Rotor3 {
			a: self.a * rhs.a - self.b.dot(rhs.b),
			b: rhs.b * self.a + self.b * rhs.a - self.b.cross(rhs.b),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::f32::consts::FRAC_PI_2;

	use super::*;

	#[test]
	fn transpose_is_inverse_for_rotation() {
		let r = Rotor3::from_axis_angle(Vector3::new(0.0, 0.0, 1.0), FRAC_PI_2).to_mat3();
		let should_be_identity = r * r.transpose();
		for i in 0..3 {
			for j in 0..3 {
				let expected = if i == j { 1.0 } else { 0.0 };
				assert!((should_be_identity.rows[i][j] - expected).abs() < 1e-5);
			}
		}
	}

	#[test]
	fn rotor_rotates_quarter_turn() {
		let r = Rotor3::from_axis_angle(Vector3::new(0.0, 0.0, 1.0), FRAC_PI_2);
		let rotated = r.apply(Vector3::new(1.0, 0.0, 0.0));
		assert!((rotated.x - 0.0).abs() < 1e-5);
		assert!((rotated.y - 1.0).abs() < 1e-5);
	}

	#[test]
	fn transform_inverse_round_trips() {
		let t = Transform3::new(Rotor3::from_axis_angle(Vector3::new(0.0, 1.0, 0.0), 0.7).to_mat3(), Vector3::new(1.0, 2.0, 3.0));
		let p = Vector3::new(4.0, -1.0, 2.0);
		let round_tripped = t.inverse().apply(t.apply(p));
		assert!((round_tripped.x - p.x).abs() < 1e-4);
		assert!((round_tripped.y - p.y).abs() < 1e-4);
		assert!((round_tripped.z - p.z).abs() < 1e-4);
	}
}
