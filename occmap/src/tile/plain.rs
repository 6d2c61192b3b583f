use crate::quadtree::Combinable;

use super::mini::{bit_index, mini_index, tile_area_minis};

/// One bit per cell, packed into 64-bit minis. All elementwise algebra
/// (`union`, `symmetric_difference`, `minus`) is commutative/associative
/// where the names promise it, since it reduces to bitwise ops on the
/// underlying words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlainTile {
	minis: Vec<u64>,
}

impl PlainTile {
	pub fn empty(log2_w: u32) -> Self { PlainTile { minis: vec![0u64; tile_area_minis(log2_w)] } }

	pub fn from_minis(minis: Vec<u64>) -> Self { PlainTile { minis } }

	pub fn minis(&self) -> &[u64] { &self.minis }

	pub fn get_bit(&self, x: i64, y: i64, log2_w: u32) -> bool {
		(self.minis[mini_index(x, y, log2_w)] >> bit_index(x, y)) & 1 != 0
	}

	pub fn set_bit(&mut self, x: i64, y: i64, log2_w: u32, value: bool) {
		let idx = mini_index(x, y, log2_w);
		let bit = 1u64 << bit_index(x, y);
		if value {
			self.minis[idx] |= bit;
		} else {
			self.minis[idx] &= !bit;
		}
	}

	pub fn is_occupied(&self) -> bool { self.minis.iter().any(|&m| m != 0) }

	pub fn union(&self, other: &PlainTile) -> PlainTile {
		PlainTile::from_minis(self.minis.iter().zip(&other.minis).map(|(a, b)| a | b).collect())
	}

	pub fn symmetric_difference(&self, other: &PlainTile) -> PlainTile {
		PlainTile::from_minis(self.minis.iter().zip(&other.minis).map(|(a, b)| a ^ b).collect())
	}

	/// `self` minus `other`: bits set in `self` but not in `other`.
	pub fn minus(&self, other: &PlainTile) -> PlainTile {
		PlainTile::from_minis(self.minis.iter().zip(&other.minis).map(|(a, b)| a & !b).collect())
	}
}

impl Combinable for PlainTile {
	fn combine(&mut self, incoming: &Self) { *self = self.union(incoming); }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bit_round_trip() {
		let mut t = PlainTile::empty(3);
		t.set_bit(2, 5, 3, true);
		assert!(t.get_bit(2, 5, 3));
		t.set_bit(2, 5, 3, true);
		assert!(t.get_bit(2, 5, 3));
		t.set_bit(2, 5, 3, false);
		assert!(!t.get_bit(2, 5, 3));
	}

	#[test]
	fn algebra_laws() {
		let mut a = PlainTile::empty(3);
		a.set_bit(0, 0, 3, true);
		let mut b = PlainTile::empty(3);
		b.set_bit(1, 1, 3, true);
		let mut c = PlainTile::empty(3);
		c.set_bit(2, 2, 3, true);

		assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));

		let a_and_b = PlainTile::from_minis(a.minis.iter().zip(&b.minis).map(|(x, y)| x & y).collect());
		assert_eq!(a.minus(&b), a.symmetric_difference(&a_and_b));
		assert!(!a.minus(&a).is_occupied());
	}
}
