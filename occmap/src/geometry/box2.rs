use std::ops::{Add, Sub};

use super::Vector2i;

/// An axis-aligned box on the integer lattice: `min` is inclusive, `max` is
/// exclusive. A box with `area() == 0` is a valid, degenerate value — it
/// contains nothing and intersects nothing.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Box2i {
	pub min: Vector2i,
	pub max: Vector2i,
}

impl Box2i {
	pub fn new(min: Vector2i, max: Vector2i) -> Self { Box2i { min, max } }

	/// A box of the given `width` with its southwest corner at `origin`.
	pub fn from_origin_width(origin: Vector2i, width: i64) -> Self {
		Box2i::new(origin, Vector2i::new(origin.x + width, origin.y + width))
	}

	pub fn width(&self) -> i64 { self.max.x - self.min.x }

	pub fn height(&self) -> i64 { self.max.y - self.min.y }

	pub fn area(&self) -> i64 {
		let (w, h) = (self.width(), self.height());
		if w <= 0 || h <= 0 {
			0
		} else {
			w * h
		}
	}

	pub fn center(&self) -> Vector2i { (self.min + self.max) >> 1 }

	pub fn contains_point(&self, p: Vector2i) -> bool {
		self.min.x <= p.x && self.min.y <= p.y && p.x < self.max.x && p.y < self.max.y
	}

	pub fn contains_box(&self, other: Box2i) -> bool {
		self.min.x <= other.min.x && self.min.y <= other.min.y && other.max.x <= self.max.x && other.max.y <= self.max.y
	}

	/// Intersection, valid only when `intersects(self, other)`.
	pub fn intersection(&self, other: Box2i) -> Box2i {
		Box2i::new(
			Vector2i::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
			Vector2i::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
		)
	}

	/// Same as [`Box2i::intersection`], but also reports whether the boxes
	/// actually intersect rather than requiring the caller to check first.
	pub fn intersection_checked(&self, other: Box2i) -> (Box2i, bool) {
		(self.intersection(other), self.intersects(&other))
	}

	pub fn intersects(&self, other: &Box2i) -> bool { (*self - *other).contains_point(Vector2i::ZERO) }

	pub fn bounds_of_point(p: Vector2i) -> Box2i { Box2i::new(p, p + Vector2i::new(1, 1)) }

	pub fn bounds_of_line(a: Vector2i, b: Vector2i) -> Box2i {
		let min = Vector2i::new(a.x.min(b.x), a.y.min(b.y));
		let max = Vector2i::new(a.x.max(b.x), a.y.max(b.y)) + Vector2i::new(1, 1);
		Box2i::new(min, max)
	}

	pub fn bounds_of_ball(center: Vector2i, radius: i64) -> Box2i {
		let r = Vector2i::new(radius, radius);
		Box2i::new(center - r, center + r + Vector2i::new(1, 1))
	}
}

/// Minkowski sum.
impl Add for Box2i {
	type Output = Box2i;

	fn add(self, rhs: Box2i) -> Box2i { Box2i::new(self.min + rhs.min, self.max + rhs.max) }
}

/// Minkowski difference.
impl Sub for Box2i {
	type Output = Box2i;

	fn sub(self, rhs: Box2i) -> Box2i {
		let d1 = self.min - rhs.max;
		let d2 = self.max - rhs.min;
		if d1.x < d2.x || d1.y < d2.y {
			Box2i::new(d1, d2)
		} else {
			Box2i::new(d2, d1)
		}
	}
}

impl Add<Vector2i> for Box2i {
	type Output = Box2i;

	fn add(self, rhs: Vector2i) -> Box2i { Box2i::new(self.min + rhs, self.max + rhs) }
}

impl Sub<Vector2i> for Box2i {
	type Output = Box2i;

	fn sub(self, rhs: Vector2i) -> Box2i { Box2i::new(self.min - rhs, self.max - rhs) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn degenerate_box_is_empty() {
		let b = Box2i::new(Vector2i::new(3, 3), Vector2i::new(3, 3));
		assert_eq!(b.area(), 0);
		assert!(!b.intersects(&Box2i::from_origin_width(Vector2i::ZERO, 10)));
	}

	#[test]
	fn contains_is_half_open() {
		let b = Box2i::from_origin_width(Vector2i::ZERO, 4);
		assert!(b.contains_point(Vector2i::new(3, 3)));
		assert!(!b.contains_point(Vector2i::new(4, 0)));
		assert!(!b.contains_point(Vector2i::new(0, 4)));
	}

	#[test]
	fn intersects_touching_boxes_is_false() {
		let a = Box2i::from_origin_width(Vector2i::ZERO, 4);
		let b = Box2i::from_origin_width(Vector2i::new(4, 0), 4);
		assert!(!a.intersects(&b));
		let c = Box2i::from_origin_width(Vector2i::new(3, 0), 4);
		assert!(a.intersects(&c));
	}

	#[test]
	fn minkowski_sum_and_difference() {
		let a = Box2i::from_origin_width(Vector2i::ZERO, 4);
		let b = Box2i::from_origin_width(Vector2i::ZERO, 2);
		let sum = a + b;
		assert_eq!(sum, Box2i::new(Vector2i::ZERO, Vector2i::new(6, 6)));
	}
}
