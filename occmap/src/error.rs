use std::{
	error::Error,
	fmt::{Debug, Display},
};

/// Every fallible operation in the map surfaces one of these; there are no
/// exceptions and no implicit retries.
pub enum MapError {
	/// File open / read / write failed at the OS level.
	IoFailure(std::io::Error),
	/// Persistent map header mismatch, truncation, or tile-width disagreement.
	BadFormat,
	/// The observer moved outside the currently loaded tile graph and no
	/// requestee could supply the missing neighbor.
	MapEdge,
	/// Read or write to a point outside the bounds of a map that does not
	/// auto-stretch.
	BoundsViolation,
}

impl Display for MapError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::IoFailure(x) => write!(f, "IO error: {}", x),
			Self::BadFormat => write!(f, "malformed persistent map header"),
			Self::MapEdge => write!(f, "observer moved past the edge of the loaded tile graph"),
			Self::BoundsViolation => write!(f, "point or box outside map bounds"),
		}
	}
}

impl Debug for MapError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result { Display::fmt(self, f) }
}

impl Error for MapError {}

impl From<std::io::Error> for MapError {
	fn from(x: std::io::Error) -> Self { Self::IoFailure(x) }
}
