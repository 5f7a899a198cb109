use glam::{Vec2, Vec3};

use super::store::impl_data_block;

/// Per-loop UV coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct UvLayer {
	pub name: String,
	/// One coordinate per loop of the owning mesh.
	pub uvs: Vec<Vec2>,
}

impl UvLayer {
	/// Moves every coordinate by `delta`.
	pub fn translate(&mut self, delta: Vec2) {
		for uv in &mut self.uvs {
			*uv += delta;
		}
	}

	/// Component-wise minimum over all coordinates, `None` for an empty layer.
	pub fn min(&self) -> Option<Vec2> {
		self.uvs.iter().copied().reduce(Vec2::min)
	}
}

/// Triangulated mesh geometry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
	pub name: String,
	pub vertices: Vec<Vec3>,
	/// Vertex index of each triangle corner. Three loops make a triangle.
	pub loops: Vec<u32>,
	pub uv_layers: Vec<UvLayer>,
	active_uv: Option<usize>,
}

impl_data_block!(Mesh);

impl Mesh {
	pub fn new(name: impl Into<String>, vertices: Vec<Vec3>, loops: Vec<u32>) -> Self {
		Self {
			name: name.into(),
			vertices,
			loops,
			uv_layers: Vec::new(),
			active_uv: None,
		}
	}

	pub fn triangle_count(&self) -> usize {
		self.loops.len() / 3
	}

	pub fn active_uv_layer(&self) -> Option<&UvLayer> {
		self.uv_layers.get(self.active_uv?)
	}

	pub fn uv_layer(&self, name: &str) -> Option<&UvLayer> {
		self.uv_layers.iter().find(|layer| layer.name == name)
	}

	pub fn uv_layer_mut(&mut self, name: &str) -> Option<&mut UvLayer> {
		self.uv_layers.iter_mut().find(|layer| layer.name == name)
	}

	/// Adds a UV layer, returning its (uniquified) name. The first layer becomes active.
	///
	/// `uvs` is resized to the loop count; missing coordinates are zero.
	pub fn add_uv_layer(&mut self, name: &str, mut uvs: Vec<Vec2>) -> String {
		let mut unique = name.to_owned();
		let mut n = 1;
		while self.uv_layer(&unique).is_some() {
			unique = crate::naming::numbered(name, n);
			n += 1;
		}

		uvs.resize(self.loops.len(), Vec2::ZERO);
		self.uv_layers.push(UvLayer {
			name: unique.clone(),
			uvs,
		});
		if self.active_uv.is_none() {
			self.active_uv = Some(self.uv_layers.len() - 1);
		}
		unique
	}

	/// Removes a UV layer by name. The active layer index follows the remaining layers.
	pub fn remove_uv_layer(&mut self, name: &str) -> Option<UvLayer> {
		let index = self.uv_layers.iter().position(|layer| layer.name == name)?;
		let layer = self.uv_layers.remove(index);

		self.active_uv = match self.active_uv {
			_ if self.uv_layers.is_empty() => None,
			Some(active) if active > index => Some(active - 1),
			Some(active) if active == index => Some(index.min(self.uv_layers.len() - 1)),
			other => other,
		};
		Some(layer)
	}

	/// Makes the named layer active. Returns `false` if there is no such layer.
	pub fn set_active_uv_layer(&mut self, name: &str) -> bool {
		match self.uv_layers.iter().position(|layer| layer.name == name) {
			Some(index) => {
				self.active_uv = Some(index);
				true
			}
			None => false,
		}
	}

	/// UV coordinates of the `i`-th triangle in `layer`.
	pub fn uv_triangle(&self, layer: &UvLayer, i: usize) -> [Vec2; 3] {
		[layer.uvs[3 * i], layer.uvs[3 * i + 1], layer.uvs[3 * i + 2]]
	}
}

#[cfg(test)]
mod tests {
	use glam::vec2;

	use super::*;

	fn quad() -> Mesh {
		Mesh::new(
			"Quad",
			vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE],
			vec![0, 1, 2, 1, 3, 2],
		)
	}

	#[test]
	fn first_layer_becomes_active() {
		let mut mesh = quad();
		assert!(mesh.active_uv_layer().is_none());

		let name = mesh.add_uv_layer("UVMap", vec![vec2(0.5, 0.5); 6]);
		assert_eq!(name, "UVMap");
		assert_eq!(mesh.active_uv_layer().unwrap().name, "UVMap");

		let second = mesh.add_uv_layer("UVMap", Vec::new());
		assert_eq!(second, "UVMap.001");
		assert_eq!(mesh.uv_layer(&second).unwrap().uvs.len(), 6);
		assert_eq!(mesh.active_uv_layer().unwrap().name, "UVMap");
	}

	#[test]
	fn removing_layers_keeps_active_index_valid() {
		let mut mesh = quad();
		mesh.add_uv_layer("A", Vec::new());
		mesh.add_uv_layer("B", Vec::new());
		mesh.add_uv_layer("C", Vec::new());
		assert!(mesh.set_active_uv_layer("C"));

		mesh.remove_uv_layer("A");
		assert_eq!(mesh.active_uv_layer().unwrap().name, "C");

		mesh.remove_uv_layer("C");
		assert_eq!(mesh.active_uv_layer().unwrap().name, "B");

		mesh.remove_uv_layer("B");
		assert!(mesh.active_uv_layer().is_none());
		assert!(mesh.remove_uv_layer("B").is_none());
	}

	#[test]
	fn uv_min_and_translate() {
		let mut layer = UvLayer {
			name: "UVMap".to_owned(),
			uvs: vec![vec2(1.25, 0.5), vec2(1.75, 0.1), vec2(1.5, 0.9)],
		};
		assert_eq!(layer.min(), Some(vec2(1.25, 0.1)));

		layer.translate(vec2(-1.0, 0.0));
		assert_eq!(layer.min(), Some(vec2(0.25, 0.1)));
	}
}
