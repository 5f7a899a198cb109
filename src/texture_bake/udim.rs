use std::fmt;

use glam::{vec2, Vec2};

use crate::scene::UvLayer;

/// Integer UV square a mesh's bake region starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UdimTile {
	pub u: i32,
	pub v: i32,
}

impl UdimTile {
	pub const FIRST: i32 = 1001;

	/// Tile holding the lower-left corner `min` of a UV bounding box.
	pub fn containing(min: Vec2) -> Self {
		Self {
			u: min.x.floor() as i32,
			v: min.y.floor() as i32,
		}
	}

	/// Tile of the minimum coordinate of a layer. `None` for an empty layer.
	pub fn of_layer(layer: &UvLayer) -> Option<Self> {
		layer.min().map(Self::containing)
	}

	/// `1001 + u + 10 * v`.
	pub fn number(self) -> i32 {
		Self::FIRST + self.u + 10 * self.v
	}

	/// Translation that moves this tile onto the unit square.
	pub fn to_unit(self) -> Vec2 {
		vec2(-(self.u as f32), -(self.v as f32))
	}
}

impl fmt::Display for UdimTile {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.number())
	}
}
