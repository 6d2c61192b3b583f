use super::plain::PlainTile;

/// A tile split into a `required` layer (never cleared) and a `temporary`
/// layer (observable, forgettable). Invariant: `required` is always a
/// subset of `temporary`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeparatedTile {
	pub required: PlainTile,
	pub temporary: PlainTile,
}

impl SeparatedTile {
	pub fn empty(log2_w: u32) -> Self {
		SeparatedTile { required: PlainTile::empty(log2_w), temporary: PlainTile::empty(log2_w) }
	}
}
