//! Services only the host application can provide, reached through traits.

mod reference;

use image::RgbaImage;
use tracing::debug;

use crate::scene::{ImageId, Mesh, Modifier, ObjectId, Scene, SceneError};

pub use reference::{PassthroughEvaluator, UvSplatRenderer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModifierError {
	#[error("Modifier {modifier:?} of type {type_name} cannot be applied")]
	Unsupported { modifier: String, type_name: String },
	#[error("Modifier {modifier:?} failed to evaluate: {msg}")]
	Evaluation { modifier: String, msg: String },
}

/// Evaluates procedural modifiers.
pub trait ModifierEvaluator {
	/// Re-evaluates every object's procedural geometry against the current scene state.
	///
	/// Ref impl: a dependency graph update.
	fn update(&mut self, scene: &Scene);

	/// Geometry the object's mesh would have with `modifier` applied on top of it.
	fn apply(&mut self, scene: &Scene, object: ObjectId, modifier: &Modifier) -> Result<Mesh, ModifierError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyModifierError {
	#[error(transparent)]
	Scene(#[from] SceneError),
	#[error("Object {object:?} has no modifier {modifier:?}")]
	NoSuchModifier { object: String, modifier: String },
	#[error("Object {0:?} is not a mesh")]
	NotMesh(String),
	#[error("Mesh data of {object:?} is used by {users} objects")]
	MultiUserData { object: String, users: usize },
	#[error(transparent)]
	Evaluation(#[from] ModifierError),
}

/// Destructively applies the named modifier: the evaluated geometry replaces the object's mesh data,
/// which keeps its name, and the modifier leaves the stack.
pub fn apply_modifier(
	scene: &mut Scene,
	evaluator: &mut dyn ModifierEvaluator,
	object: ObjectId,
	name: &str,
) -> Result<(), ApplyModifierError> {
	let obj = scene.object(object)?;
	let mesh_id = obj.mesh().ok_or_else(|| ApplyModifierError::NotMesh(obj.name.clone()))?;
	let modifier = obj.modifier(name).ok_or_else(|| ApplyModifierError::NoSuchModifier {
		object: obj.name.clone(),
		modifier: name.to_owned(),
	})?;

	let users = scene.mesh_users(mesh_id);
	if users > 1 {
		return Err(ApplyModifierError::MultiUserData {
			object: obj.name.clone(),
			users,
		});
	}

	let mut evaluated = evaluator.apply(scene, object, modifier)?;

	let mesh = scene.mesh_mut(mesh_id)?;
	evaluated.name = std::mem::take(&mut mesh.name);
	*mesh = evaluated;

	let obj = scene.object_mut(object)?;
	obj.modifiers.retain(|m| m.name != name);
	debug!("Applied modifier {name:?} on {:?}", obj.name);
	Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BakePass {
	#[default]
	Diffuse,
}

/// Light contributions a bake pass records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassFilter {
	/// Surface colour only, without lighting.
	#[default]
	Color,
	Direct,
	Indirect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakeSettings {
	pub pass: BakePass,
	pub filter: PassFilter,
	/// Pixels the result is extended past UV island borders.
	pub margin: u32,
	/// Clear the target before baking.
	pub use_clear: bool,
	pub samples: u32,
}

impl Default for BakeSettings {
	fn default() -> Self {
		Self {
			pass: BakePass::Diffuse,
			filter: PassFilter::Color,
			margin: 2,
			use_clear: true,
			samples: 1,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
	#[error(transparent)]
	Scene(#[from] SceneError),
	#[error("Object {0:?} has no material to bake")]
	NoMaterial(String),
	#[error("Material {0:?} has no active image node to bake into")]
	NoActiveImageNode(String),
	#[error("Mesh {0:?} has no active UV layer")]
	NoActiveUv(String),
	#[error("Bake failed: {0}")]
	Failed(String),
}

/// Renders bake passes.
pub trait BakeRenderer {
	/// Bakes the object's surface into the pixels of `target`, which must be the image of the
	/// active image node of the object's material. The active UV layer maps the surface to the image.
	///
	/// Ref impl: a Cycles bake.
	fn bake(
		&mut self,
		scene: &Scene,
		object: ObjectId,
		target: ImageId,
		settings: &BakeSettings,
	) -> Result<RgbaImage, RenderError>;
}
