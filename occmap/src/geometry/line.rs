use super::{Box2i, Vector2i};

/// An integer line segment. Like [`Box2i`], endpoint semantics are
/// asymmetric: `a` is the "start" / near endpoint, `b` the "end" / far
/// endpoint, and callers that clip a segment are expected to preserve that
/// ordering (near endpoint first).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LineSegment2i {
	pub a: Vector2i,
	pub b: Vector2i,
}

impl LineSegment2i {
	pub fn new(a: Vector2i, b: Vector2i) -> Self { LineSegment2i { a, b } }
}

/// Walks a segment in floating-point at a fixed world-space step, exposing
/// the integer cell nearest the current position. `length` is the number
/// of steps it takes to traverse the whole segment; callers loop
/// `0..=length` and call [`LineStepper2i::step`] after each iteration.
pub struct LineStepper2i {
	origin: (f64, f64),
	step_vec: (f64, f64),
	t: i64,
	pub length: i64,
}

impl LineStepper2i {
	pub fn new(line: LineSegment2i, step: f64) -> Self {
		let a = (line.a.x as f64, line.a.y as f64);
		let b = (line.b.x as f64, line.b.y as f64);
		let (dx, dy) = (b.0 - a.0, b.1 - a.1);
		let total_length = (dx * dx + dy * dy).sqrt();
		let (ux, uy) = if total_length > 0.0 { (dx / total_length, dy / total_length) } else { (0.0, 0.0) };
		LineStepper2i {
			origin: a,
			step_vec: (ux * step, uy * step),
			t: 0,
			length: (total_length / step).floor() as i64,
		}
	}

	/// The integer cell nearest the stepper's current position.
	pub fn cell(&self) -> Vector2i {
		let t = self.t as f64;
		Vector2i::new(
			(self.origin.0 + self.step_vec.0 * t).round() as i64,
			(self.origin.1 + self.step_vec.1 * t).round() as i64,
		)
	}

	pub fn step(&mut self) { self.t += 1; }

	pub fn at_end(&self) -> bool { self.t > self.length }
}

/// Visits every integer cell whose center lies within 0.5 units of the
/// segment, in no particular order.
pub fn rasterize(line: LineSegment2i, mut sink: impl FnMut(Vector2i)) {
	let a = (line.a.x as f64 + 0.5, line.a.y as f64 + 0.5);
	let b = (line.b.x as f64 + 0.5, line.b.y as f64 + 0.5);
	let bounds = Box2i::bounds_of_line(line.a, line.b);
	// Inflate by one cell in every direction: a cell just outside the
	// endpoints' bounding box can still have its center within 0.5 of the
	// segment near a shallow-angle endpoint.
	for x in (bounds.min.x - 1)..(bounds.max.x + 1) {
		for y in (bounds.min.y - 1)..(bounds.max.y + 1) {
			let p = (x as f64 + 0.5, y as f64 + 0.5);
			if dist_point_to_segment(p, a, b) <= 0.5 {
				sink(Vector2i::new(x, y));
			}
		}
	}
}

fn dist_point_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
	let ab = (b.0 - a.0, b.1 - a.1);
	let len_sq = ab.0 * ab.0 + ab.1 * ab.1;
	let t = if len_sq > 0.0 {
		(((p.0 - a.0) * ab.0 + (p.1 - a.1) * ab.1) / len_sq).clamp(0.0, 1.0)
	} else {
		0.0
	};
	let proj = (a.0 + ab.0 * t, a.1 + ab.1 * t);
	((p.0 - proj.0).powi(2) + (p.1 - proj.1).powi(2)).sqrt()
}

/// Clips `line` to `b`, honoring the half-open `max` convention: a true
/// intersection that lands exactly on `b.max` is reported one cell inside
/// instead, so the returned segment's endpoints are always valid cells of
/// `b`. Returns `None` if the segment misses the box entirely.
pub fn line_box_intersection(line: LineSegment2i, b: Box2i) -> Option<LineSegment2i> {
	let (ax, ay) = (line.a.x as f64, line.a.y as f64);
	let (bx, by) = (line.b.x as f64, line.b.y as f64);
	let (dx, dy) = (bx - ax, by - ay);

	let mut t0 = 0.0_f64;
	let mut t1 = 1.0_f64;

	let clip = |p: f64, q: f64, t0: &mut f64, t1: &mut f64| -> bool {
		if p.abs() < 1e-12 {
			return q >= 0.0;
		}
		let r = q / p;
		if p < 0.0 {
			if r > *t1 {
				return false;
			}
			if r > *t0 {
				*t0 = r;
			}
		} else {
			if r < *t0 {
				return false;
			}
			if r < *t1 {
				*t1 = r;
			}
		}
		true
	};

	if !clip(-dx, ax - b.min.x as f64, &mut t0, &mut t1) {
		return None;
	}
	if !clip(dx, b.max.x as f64 - ax, &mut t0, &mut t1) {
		return None;
	}
	if !clip(-dy, ay - b.min.y as f64, &mut t0, &mut t1) {
		return None;
	}
	if !clip(dy, b.max.y as f64 - ay, &mut t0, &mut t1) {
		return None;
	}
	if t0 > t1 {
		return None;
	}

	let clamp_into = |x: i64, y: i64| Vector2i::new(x.clamp(b.min.x, b.max.x - 1), y.clamp(b.min.y, b.max.y - 1));
	let pa = clamp_into((ax + t0 * dx).round() as i64, (ay + t0 * dy).round() as i64);
	let pb = clamp_into((ax + t1 * dx).round() as i64, (ay + t1 * dy).round() as i64);
	Some(LineSegment2i::new(pa, pb))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn intersection_at_max_corner_stays_half_open() {
		let line = LineSegment2i::new(Vector2i::new(0, 0), Vector2i::new(16, 16));
		let b = Box2i::from_origin_width(Vector2i::ZERO, 16);
		let clipped = line_box_intersection(line, b).unwrap();
		assert_eq!(clipped.b, Vector2i::new(15, 15));
	}

	#[test]
	fn segment_missing_box_returns_none() {
		let line = LineSegment2i::new(Vector2i::new(-10, 5), Vector2i::new(-1, 5));
		let b = Box2i::from_origin_width(Vector2i::ZERO, 8);
		assert!(line_box_intersection(line, b).is_none());
	}

	#[test]
	fn stepper_covers_whole_segment() {
		let line = LineSegment2i::new(Vector2i::new(0, 0), Vector2i::new(10, 0));
		let mut stepper = LineStepper2i::new(line, 1.0);
		let mut visited = vec![];
		for _ in 0..=stepper.length {
			visited.push(stepper.cell());
			stepper.step();
		}
		assert_eq!(visited.first(), Some(&Vector2i::new(0, 0)));
		assert_eq!(visited.last(), Some(&Vector2i::new(10, 0)));
	}

	#[test]
	fn rasterize_horizontal_line_visits_exact_cells() {
		let line = LineSegment2i::new(Vector2i::new(0, 0), Vector2i::new(3, 0));
		let mut cells = vec![];
		rasterize(line, |c| cells.push(c));
		for x in 0..=3 {
			assert!(cells.contains(&Vector2i::new(x, 0)), "missing cell {x}");
		}
	}
}
