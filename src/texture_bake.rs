//! Flattening each selected mesh's shading into one PNG in its own UDIM tile,
//! then pointing its material at that image.

mod rewire;
mod scratch;
mod udim;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::ImageError;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::host::{BakeRenderer, BakeSettings, RenderError};
use crate::naming;
use crate::scene::{
	Image, ImageId, MaterialId, MeshId, NodeId, NodeTreeError, ObjectId, ObjectKind, ObjectMode, Scene, SceneError,
};

use scratch::BakeScratch;

pub use rewire::BAKED_RESULT;
pub use scratch::TEMP_UV_LAYER;
pub use udim::UdimTile;

#[derive(Debug, thiserror::Error)]
pub enum TextureBakeError {
	#[error("No valid mesh objects selected")]
	NoValidSelection,
	#[error("Could not create output directory {}", path.display())]
	OutputDir {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("UV layer {0:?} disappeared during the bake")]
	MissingUvLayer(String),
	#[error("Could not write or read back {}", path.display())]
	Image {
		path: PathBuf,
		#[source]
		source: ImageError,
	},
	#[error(transparent)]
	Render(#[from] RenderError),
	#[error(transparent)]
	NodeTree(#[from] NodeTreeError),
	#[error(transparent)]
	Scene(#[from] SceneError),
}

/// Why a mesh was left out of a texture bake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	NoActiveUv,
	/// The active UV layer holds no coordinates.
	EmptyUv,
	NoMaterial,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMesh {
	pub object: String,
	pub reason: SkipReason,
}

#[derive(Debug)]
pub struct FailedMesh {
	pub object: String,
	pub error: TextureBakeError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakedMesh {
	pub object: ObjectId,
	pub tile: UdimTile,
	/// The written PNG.
	pub path: PathBuf,
	/// Image loaded back from `path`.
	pub image: ImageId,
	/// The `BAKED_RESULT` node now feeding the surface.
	pub node: NodeId,
}

/// Per-mesh outcome of a texture bake. Skips and failures do not stop the other meshes.
#[derive(Debug, Default)]
pub struct BakeReport {
	pub baked: Vec<BakedMesh>,
	pub skipped: Vec<SkippedMesh>,
	pub failed: Vec<FailedMesh>,
}

enum Outcome {
	Baked(BakedMesh),
	Skipped(SkipReason),
}

/// What a mesh bake works on, gathered before anything is created.
struct Prepared {
	name: String,
	mesh: MeshId,
	material: MaterialId,
	uv_layer: String,
	tile: UdimTile,
}

/// Bakes every selected mesh except those with an excluded suffix. See [`bake_textures`].
pub fn bake_selected(
	scene: &mut Scene,
	renderer: &mut dyn BakeRenderer,
	config: &Config,
) -> Result<BakeReport, TextureBakeError> {
	let selection = scene.selected_objects();
	bake_textures(scene, renderer, config, &selection)
}

/// Bakes each mesh of `selection` into `{object}_{tile}.png` under the output directory.
///
/// Per mesh: the active UV layer is shifted onto the unit square in a temporary layer,
/// the primary material's diffuse colour is rendered into a fresh target image, the PNG
/// is written, the original UV layer is shifted by the same amount and the material is
/// rewired to sample the written image. Temporary layers, nodes and the target image are
/// removed on every path out of a mesh bake.
///
/// Non-mesh objects and meshes whose base name ends with an excluded suffix are ignored.
/// Fails without touching the scene when nothing is left to bake.
pub fn bake_textures(
	scene: &mut Scene,
	renderer: &mut dyn BakeRenderer,
	config: &Config,
	selection: &[ObjectId],
) -> Result<BakeReport, TextureBakeError> {
	let excluded = &config.texture_bake.excluded_suffixes;
	let mut meshes: Vec<ObjectId> = Vec::new();
	for &id in selection {
		let Ok(object) = scene.object(id) else {
			continue;
		};
		if object.kind() == ObjectKind::Mesh && !naming::has_excluded_suffix(&object.name, excluded) && !meshes.contains(&id)
		{
			meshes.push(id);
		}
	}
	if meshes.is_empty() {
		return Err(TextureBakeError::NoValidSelection);
	}

	let out_dir = config.resolved_output_dir();
	fs::create_dir_all(&out_dir).map_err(|source| TextureBakeError::OutputDir {
		path: out_dir.clone(),
		source,
	})?;

	let settings = BakeSettings {
		margin: config.texture_bake.margin,
		samples: config.texture_bake.samples,
		..Default::default()
	};

	let mut report = BakeReport::default();
	for id in meshes {
		let name = scene.object(id)?.name.clone();
		scene.deselect_all();
		scene.select(id, true)?;
		scene.set_active(Some(id));
		scene.object_mut(id)?.mode = ObjectMode::Object;

		match bake_mesh(scene, renderer, config, &settings, &out_dir, id) {
			Ok(Outcome::Baked(baked)) => {
				info!("Baked {name:?} into {}", baked.path.display());
				report.baked.push(baked);
			}
			Ok(Outcome::Skipped(reason)) => {
				warn!("Skipping {name:?}: {reason:?}");
				report.skipped.push(SkippedMesh { object: name, reason });
			}
			Err(e) => {
				error!("Baking {name:?} failed: {e}");
				report.failed.push(FailedMesh { object: name, error: e });
			}
		}
	}

	info!(
		"Texture bake finished: {} baked, {} skipped, {} failed",
		report.baked.len(),
		report.skipped.len(),
		report.failed.len()
	);
	Ok(report)
}

fn prepare(scene: &Scene, id: ObjectId) -> Result<Result<Prepared, SkipReason>, TextureBakeError> {
	let object = scene.object(id)?;
	let Some(mesh_id) = object.mesh() else {
		return Err(SceneError::MissingObject(id).into());
	};
	let mesh = scene.mesh(mesh_id)?;

	let Some(layer) = mesh.active_uv_layer() else {
		return Ok(Err(SkipReason::NoActiveUv));
	};
	let Some(tile) = UdimTile::of_layer(layer) else {
		return Ok(Err(SkipReason::EmptyUv));
	};
	let Some(material) = object.primary_material() else {
		return Ok(Err(SkipReason::NoMaterial));
	};

	Ok(Ok(Prepared {
		name: object.name.clone(),
		mesh: mesh_id,
		material,
		uv_layer: layer.name.clone(),
		tile,
	}))
}

fn bake_mesh(
	scene: &mut Scene,
	renderer: &mut dyn BakeRenderer,
	config: &Config,
	settings: &BakeSettings,
	out_dir: &Path,
	id: ObjectId,
) -> Result<Outcome, TextureBakeError> {
	let job = match prepare(scene, id)? {
		Ok(job) => job,
		Err(reason) => return Ok(Outcome::Skipped(reason)),
	};
	let tile = job.tile;
	debug!("{:?} sits in tile {tile}", job.name);

	let size = config.texture_bake.image_size;
	let target = Image::new_generated(format!("Bake_{}_{tile}", job.name), size, size, true);
	let mut scratch = BakeScratch::begin(scene, job.mesh, job.material, &job.uv_layer, tile, target)?;

	let target = scratch.image();
	let pixels = renderer.bake(scratch.scene(), id, target, settings)?;

	let path = out_dir.join(format!("{}_{tile}.png", job.name));
	let image_error = |source| TextureBakeError::Image {
		path: path.clone(),
		source,
	};
	let scene = scratch.scene_mut();
	let target = scene.image_mut(target)?;
	target.pixels = pixels;
	target.save_png(&path).map_err(image_error)?;
	let baked = Image::load(&path).map_err(image_error)?;

	let image = scene.images.insert(baked);
	let node = match rewire::rewire_to_baked(&mut scene.material_mut(job.material)?.node_tree, image) {
		Ok(node) => node,
		Err(e) => {
			scene.remove_image_if_orphan(image);
			return Err(e.into());
		}
	};
	debug!("Rewired material {:?} of {:?}", job.material, job.name);

	// only a rewired material samples the baked tile through unit-square UVs
	scene
		.mesh_mut(job.mesh)?
		.uv_layer_mut(&job.uv_layer)
		.ok_or_else(|| TextureBakeError::MissingUvLayer(job.uv_layer.clone()))?
		.translate(tile.to_unit());

	drop(scratch);
	Ok(Outcome::Baked(BakedMesh {
		object: id,
		tile,
		path,
		image,
		node,
	}))
}
