use super::{mini::tile_area, plain::PlainTile, separated::SeparatedTile};

/// Maximum certainty for a temporary occupancy. 255 is reserved to mean
/// "required" and is never produced by decay or clamped into by conversion.
pub const CMAX: u8 = 63;

/// One byte of certainty per cell: 0 = known-free, 1..=CMAX = temporary
/// with linear certainty, 255 = required.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GradientTile {
	certainties: Vec<u8>,
}

impl GradientTile {
	pub fn empty(log2_w: u32) -> Self { GradientTile { certainties: vec![0u8; tile_area(log2_w)] } }

	fn index(x: i64, y: i64, log2_w: u32) -> usize { (x | (y << log2_w)) as usize }

	pub fn certainty(&self, x: i64, y: i64, log2_w: u32) -> u8 { self.certainties[Self::index(x, y, log2_w)] }

	pub fn get_occ(&self, x: i64, y: i64, log2_w: u32) -> bool { self.certainty(x, y, log2_w) != 0 }

	/// Decrements the cell's certainty by one, unless it is already zero or
	/// is the required sentinel 255, which this never touches.
	pub fn decrement_if_nonzero(&mut self, x: i64, y: i64, log2_w: u32) {
		let c = &mut self.certainties[Self::index(x, y, log2_w)];
		if *c != 0 && *c != 255 {
			*c -= 1;
		}
	}

	/// Raises the cell's certainty to `CMAX`, unless it is already the
	/// required sentinel 255.
	pub fn refresh(&mut self, x: i64, y: i64, log2_w: u32) {
		let c = &mut self.certainties[Self::index(x, y, log2_w)];
		if *c != 255 {
			*c = (*c).max(CMAX);
		}
	}

	pub fn from_plain(t: &PlainTile, log2_w: u32) -> GradientTile {
		let side = 1i64 << log2_w;
		let mut g = GradientTile::empty(log2_w);
		for y in 0..side {
			for x in 0..side {
				if t.get_bit(x, y, log2_w) {
					g.certainties[Self::index(x, y, log2_w)] = CMAX;
				}
			}
		}
		g
	}

	pub fn from_separated(t: &SeparatedTile, log2_w: u32) -> GradientTile {
		let side = 1i64 << log2_w;
		let mut g = GradientTile::empty(log2_w);
		for y in 0..side {
			for x in 0..side {
				let idx = Self::index(x, y, log2_w);
				g.certainties[idx] = if t.required.get_bit(x, y, log2_w) {
					255
				} else if t.temporary.get_bit(x, y, log2_w) {
					CMAX
				} else {
					0
				};
			}
		}
		g
	}

	/// Decimation clamps any certainty above `CMAX` other than 255 down to
	/// `CMAX`; 255 is preserved.
	pub fn to_plain(&self, log2_w: u32) -> PlainTile {
		let side = 1i64 << log2_w;
		let mut t = PlainTile::empty(log2_w);
		for y in 0..side {
			for x in 0..side {
				if self.get_occ(x, y, log2_w) {
					t.set_bit(x, y, log2_w, true);
				}
			}
		}
		t
	}

	pub fn to_separated(&self, log2_w: u32) -> SeparatedTile {
		let side = 1i64 << log2_w;
		let mut t = SeparatedTile::empty(log2_w);
		for y in 0..side {
			for x in 0..side {
				match self.certainty(x, y, log2_w) {
					0 => {}
					255 => t.required.set_bit(x, y, log2_w, true),
					_ => t.temporary.set_bit(x, y, log2_w, true),
				}
			}
		}
		t
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn refresh_never_touches_required() {
		let mut g = GradientTile::empty(3);
		g.certainties[0] = 255;
		g.refresh(0, 0, 3);
		assert_eq!(g.certainty(0, 0, 3), 255);
	}

	#[test]
	fn decay_stops_at_zero_and_skips_required() {
		let mut g = GradientTile::empty(3);
		g.refresh(1, 0, 3);
		g.certainties[GradientTile::index(0, 0, 3)] = 255;
		for _ in 0..(CMAX as u32 + 5) {
			g.decrement_if_nonzero(1, 0, 3);
			g.decrement_if_nonzero(0, 0, 3);
		}
		assert_eq!(g.certainty(1, 0, 3), 0);
		assert_eq!(g.certainty(0, 0, 3), 255);
	}

	#[test]
	fn round_trip_through_plain_loses_certainty_not_occupancy() {
		let mut t = PlainTile::empty(3);
		t.set_bit(4, 4, 3, true);
		let g = GradientTile::from_plain(&t, 3);
		assert_eq!(g.to_plain(3), t);
	}
}
