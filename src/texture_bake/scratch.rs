use tracing::debug;

use crate::scene::{Image, ImageId, MaterialId, MeshId, NodeId, Scene, SceneError, ShaderNodeKind};

use super::rewire;
use super::udim::UdimTile;
use super::TextureBakeError;

/// Name of the shifted UV layer the bake renders through.
pub const TEMP_UV_LAYER: &str = "TEMP_BAKEOFFSET";

/// Temporary state of one mesh bake, undone when dropped.
///
/// Dropping removes the shifted UV layer and reactivates the original one, removes the
/// UV source and target nodes, and deletes the bake target image unless something uses it.
pub(super) struct BakeScratch<'s> {
	scene: &'s mut Scene,
	mesh: MeshId,
	material: MaterialId,
	original_uv: String,
	temp_uv: Option<String>,
	nodes: Vec<NodeId>,
	image: ImageId,
}

impl<'s> BakeScratch<'s> {
	/// Creates the bake target, the UV layer shifted onto the unit square and the nodes
	/// the renderer needs in `material`.
	pub fn begin(
		scene: &'s mut Scene,
		mesh: MeshId,
		material: MaterialId,
		original_uv: &str,
		tile: UdimTile,
		image: Image,
	) -> Result<Self, TextureBakeError> {
		let image = scene.images.insert(image);
		let mut scratch = Self {
			scene,
			mesh,
			material,
			original_uv: original_uv.to_owned(),
			temp_uv: None,
			nodes: Vec::new(),
			image,
		};
		scratch.add_shifted_uv(tile)?;
		scratch.add_bake_nodes()?;
		Ok(scratch)
	}

	fn add_shifted_uv(&mut self, tile: UdimTile) -> Result<(), TextureBakeError> {
		let mesh = self.scene.mesh_mut(self.mesh)?;
		let mut uvs = (mesh.uv_layer(&self.original_uv))
			.map(|layer| layer.uvs.clone())
			.ok_or_else(|| TextureBakeError::MissingUvLayer(self.original_uv.clone()))?;
		let offset = tile.to_unit();
		uvs.iter_mut().for_each(|uv| *uv += offset);

		let name = mesh.add_uv_layer(TEMP_UV_LAYER, uvs);
		mesh.set_active_uv_layer(&name);
		self.temp_uv = Some(name);
		Ok(())
	}

	fn add_bake_nodes(&mut self) -> Result<(), TextureBakeError> {
		let images = &self.scene.images;
		let material = (self.scene.materials.get_mut(self.material)).ok_or(SceneError::MissingMaterial(self.material))?;
		material.use_nodes = true;
		let tree = &mut material.node_tree;

		let uv_source = rewire::lock_tiled_textures(tree, images, &self.original_uv)?;
		self.nodes.push(uv_source);

		let target = tree.add(ShaderNodeKind::tex_image(Some(self.image)));
		self.nodes.push(target);
		tree.set_active(target)?;
		Ok(())
	}

	pub fn scene(&self) -> &Scene {
		self.scene
	}

	pub fn scene_mut(&mut self) -> &mut Scene {
		self.scene
	}

	/// The bake target.
	pub fn image(&self) -> ImageId {
		self.image
	}
}

impl Drop for BakeScratch<'_> {
	fn drop(&mut self) {
		if let Ok(mesh) = self.scene.mesh_mut(self.mesh) {
			if let Some(temp) = self.temp_uv.take() {
				mesh.remove_uv_layer(&temp);
			}
			mesh.set_active_uv_layer(&self.original_uv);
		}

		if let Ok(material) = self.scene.material_mut(self.material) {
			for node in self.nodes.drain(..) {
				material.node_tree.remove(node);
			}
		}

		if self.scene.remove_image_if_orphan(self.image) {
			debug!("Removed bake target {:?}", self.image);
		}
	}
}
