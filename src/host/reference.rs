use glam::Vec4;
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::math::triangle::covered_pixels;
use crate::scene::{ImageId, Mesh, Modifier, ModifierKind, NodeTree, ObjectId, Scene, SceneError, ShaderNodeKind, SocketValue};

use super::{BakeRenderer, BakeSettings, ModifierError, ModifierEvaluator, RenderError};

/// Evaluates procedural node modifiers to the geometry the mesh already stores.
///
/// Any other modifier type is unsupported.
#[derive(Debug, Default)]
pub struct PassthroughEvaluator {
	updates: usize,
}

impl PassthroughEvaluator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of dependency graph updates requested so far.
	pub fn updates(&self) -> usize {
		self.updates
	}
}

impl ModifierEvaluator for PassthroughEvaluator {
	fn update(&mut self, _scene: &Scene) {
		self.updates += 1;
		debug!("Dependency graph update #{}", self.updates);
	}

	fn apply(&mut self, scene: &Scene, object: ObjectId, modifier: &Modifier) -> Result<Mesh, ModifierError> {
		let evaluation_error = |msg: String| ModifierError::Evaluation {
			modifier: modifier.name.clone(),
			msg,
		};

		match modifier.kind {
			ModifierKind::Nodes { .. } => {
				let obj = scene.object(object).map_err(|e| evaluation_error(e.to_string()))?;
				let mesh = obj
					.mesh()
					.ok_or_else(|| evaluation_error(format!("{:?} is not a mesh", obj.name)))?;
				scene.mesh(mesh).cloned().map_err(|e| evaluation_error(e.to_string()))
			}
			_ => Err(ModifierError::Unsupported {
				modifier: modifier.name.clone(),
				type_name: modifier.type_name().to_owned(),
			}),
		}
	}
}

/// Splats the material's flat surface colour over every triangle of the active UV layer.
#[derive(Debug, Default)]
pub struct UvSplatRenderer;

const FALLBACK_SURFACE: Vec4 = Vec4::new(0.8, 0.8, 0.8, 1.0);

/// Colour of the shader feeding the material output's surface, taken from its unlinked inputs.
fn surface_color(tree: &NodeTree) -> Vec4 {
	let surface = (tree.output_node())
		.and_then(|output| tree.link_into(output, "Surface"))
		.and_then(|link| tree.get(link.from_node));
	let Some(node) = surface else {
		return FALLBACK_SURFACE;
	};

	let color_of = |socket: &str| match node.inputs.get(socket) {
		Some(SocketValue::Color(color)) => Some(*color),
		_ => None,
	};
	let color = match node.kind {
		ShaderNodeKind::BsdfPrincipled => color_of("Base Color").map(|c| match node.inputs.get("Alpha") {
			Some(SocketValue::Float(alpha)) => c * Vec4::new(1.0, 1.0, 1.0, *alpha),
			_ => c,
		}),
		ShaderNodeKind::BsdfDiffuse | ShaderNodeKind::BsdfTransparent => color_of("Color"),
		ShaderNodeKind::Group { .. } => node.inputs.values().find_map(|value| match value {
			SocketValue::Color(color) => Some(*color),
			_ => None,
		}),
		_ => None,
	};
	color.unwrap_or(FALLBACK_SURFACE)
}

fn to_rgba8(color: Vec4) -> Rgba<u8> {
	let c = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
	Rgba([c.x as u8, c.y as u8, c.z as u8, c.w as u8])
}

/// Grows the filled region by one pixel per pass, copying the colour of a filled 4-neighbour.
fn dilate(pixels: &mut RgbaImage, filled: &mut [bool], margin: u32) {
	let (width, height) = pixels.dimensions();
	let index = |x: u32, y: u32| (y * width + x) as usize;

	for _ in 0..margin {
		let mut grown = Vec::new();
		for y in 0..height {
			for x in 0..width {
				if filled[index(x, y)] {
					continue;
				}
				let neighbours = [
					(x.checked_sub(1), Some(y)),
					((x + 1 < width).then_some(x + 1), Some(y)),
					(Some(x), y.checked_sub(1)),
					(Some(x), (y + 1 < height).then_some(y + 1)),
				];
				let source = neighbours.into_iter().find_map(|(nx, ny)| match (nx, ny) {
					(Some(nx), Some(ny)) if filled[index(nx, ny)] => Some(*pixels.get_pixel(nx, ny)),
					_ => None,
				});
				if let Some(color) = source {
					grown.push((x, y, color));
				}
			}
		}

		if grown.is_empty() {
			break;
		}
		for (x, y, color) in grown {
			pixels.put_pixel(x, y, color);
			filled[index(x, y)] = true;
		}
	}
}

impl BakeRenderer for UvSplatRenderer {
	fn bake(
		&mut self,
		scene: &Scene,
		object: ObjectId,
		target: ImageId,
		settings: &BakeSettings,
	) -> Result<RgbaImage, RenderError> {
		let obj = scene.object(object)?;
		let material_id = obj
			.primary_material()
			.ok_or_else(|| RenderError::NoMaterial(obj.name.clone()))?;
		let material = scene.material(material_id)?;
		let tree = &material.node_tree;
		let active_image = tree.active().and_then(|id| tree.get(id)).and_then(|node| node.image());
		if active_image != Some(target) {
			return Err(RenderError::NoActiveImageNode(material.name.clone()));
		}

		let image = scene.images.get(target).ok_or(SceneError::MissingImage(target))?;
		let mesh_id = obj
			.mesh()
			.ok_or_else(|| RenderError::Failed(format!("{:?} is not a mesh", obj.name)))?;
		let mesh = scene.mesh(mesh_id)?;
		let layer = mesh
			.active_uv_layer()
			.ok_or_else(|| RenderError::NoActiveUv(mesh.name.clone()))?;

		let (width, height) = (image.width(), image.height());
		let mut pixels = if settings.use_clear {
			RgbaImage::new(width, height)
		} else {
			image.pixels.clone()
		};
		let mut filled = vec![false; (width * height) as usize];

		let color = to_rgba8(surface_color(tree));
		for i in 0..mesh.triangle_count() {
			for (x, y) in covered_pixels(&mesh.uv_triangle(layer, i), width, height) {
				pixels.put_pixel(x, y, color);
				filled[(y * width + x) as usize] = true;
			}
		}
		dilate(&mut pixels, &mut filled, settings.margin);

		debug!(
			"Baked {} triangles of {:?} into {:?}",
			mesh.triangle_count(),
			obj.name,
			image.name
		);
		Ok(pixels)
	}
}

#[cfg(test)]
mod tests {
	use glam::{vec2, vec4};

	use super::*;
	use crate::scene::{Image, Material, Object, ObjectData};
	use crate::testing::quad_mesh;

	/// A quad covering the left half of the unit square, with an active bake target.
	fn bake_setup(scene: &mut Scene, size: u32) -> (ObjectId, ImageId) {
		let mut mesh = quad_mesh("Body", vec2(0.0, 0.0));
		let layer = mesh.uv_layers[0].name.clone();
		mesh.uv_layer_mut(&layer).unwrap().uvs.iter_mut().for_each(|uv| uv.x *= 0.5);
		let mesh = scene.meshes.insert(mesh);

		let image = scene.images.insert(Image::new_generated("Bake", size, size, true));
		let mut material = Material::new("Skin");
		let tree = &mut material.node_tree;
		let diffuse = tree.add(ShaderNodeKind::BsdfDiffuse);
		tree.get_mut(diffuse)
			.unwrap()
			.inputs
			.insert("Color".to_owned(), SocketValue::Color(vec4(1.0, 0.0, 0.0, 1.0)));
		let output = tree.add(ShaderNodeKind::OutputMaterial);
		tree.link(diffuse, "BSDF", output, "Surface").unwrap();
		let target = tree.add(ShaderNodeKind::tex_image(Some(image)));
		tree.set_active(target).unwrap();
		let material = scene.materials.insert(material);

		let mut object = Object::new("Body", ObjectData::Mesh(mesh));
		object.material_slots.push(Some(material));
		(scene.objects.insert(object), image)
	}

	#[test]
	fn splats_surface_colour_with_margin() {
		let mut scene = Scene::new();
		let (object, image) = bake_setup(&mut scene, 8);

		let no_margin = BakeSettings {
			margin: 0,
			..Default::default()
		};
		let pixels = UvSplatRenderer.bake(&scene, object, image, &no_margin).unwrap();
		let red = Rgba([255, 0, 0, 255]);
		assert_eq!(*pixels.get_pixel(0, 0), red);
		assert_eq!(*pixels.get_pixel(3, 7), red);
		assert_eq!(pixels.get_pixel(4, 0).0[3], 0);

		let pixels = UvSplatRenderer.bake(&scene, object, image, &BakeSettings::default()).unwrap();
		assert_eq!(*pixels.get_pixel(5, 4), red);
		assert_eq!(pixels.get_pixel(6, 4).0[3], 0);
	}

	#[test]
	fn bake_requires_active_target() {
		let mut scene = Scene::new();
		let (object, image) = bake_setup(&mut scene, 4);
		let other = scene.images.insert(Image::new_generated("Other", 4, 4, true));

		assert_eq!(
			UvSplatRenderer.bake(&scene, object, other, &BakeSettings::default()),
			Err(RenderError::NoActiveImageNode("Skin".to_owned()))
		);
		assert!(UvSplatRenderer.bake(&scene, object, image, &BakeSettings::default()).is_ok());
	}

	#[test]
	fn passthrough_only_handles_node_modifiers() {
		let mut scene = Scene::new();
		let (object, _) = bake_setup(&mut scene, 4);
		let mut evaluator = PassthroughEvaluator::new();

		evaluator.update(&scene);
		assert_eq!(evaluator.updates(), 1);

		let mesh = evaluator
			.apply(&scene, object, &Modifier::nodes("GeometryNodes", "HyChar"))
			.unwrap();
		assert_eq!(mesh.triangle_count(), 2);
		assert!(matches!(
			evaluator.apply(&scene, object, &Modifier::armature("Armature", None)),
			Err(ModifierError::Unsupported { .. })
		));
	}
}
