//! Freezing a live parametric character into a standalone rig/mesh/material hierarchy.

mod identity;
mod teardown;

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::host::{self, ApplyModifierError, ModifierEvaluator};
use crate::naming;
use crate::scene::{
	ArmatureId, CollectionId, MaterialId, Modifier, ModifierKind, Object, ObjectId, ObjectKind, ObjectMode,
	PosePosition, PurgeStats, Scene, SceneError,
};

pub use identity::IdentityMap;
pub use teardown::Teardown;

#[derive(Debug, thiserror::Error)]
pub enum HierarchyBakeError {
	#[error("Name prefix must not be empty")]
	EmptyPrefix,
	#[error("Rig {0:?} not found")]
	RigNotFound(String),
	#[error("Object {0:?} is not an armature")]
	NotAnArmature(String),
	#[error("No visible meshes found to bake under {0:?}")]
	NoVisibleMeshes(String),
	#[error("Failed to clone the rig: duplication produced {0} armatures")]
	RigNotDuplicated(usize),
	#[error(transparent)]
	Scene(#[from] SceneError),
}

/// A modifier that could not be applied and was left on the baked mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedModifier {
	pub object: String,
	pub modifier: String,
	pub reason: ApplyModifierError,
}

/// Result of a hierarchy bake.
#[derive(Debug, Clone, PartialEq)]
pub struct BakedCharacter {
	pub rig: ObjectId,
	/// `{prefix}_Collection`, holding the rig and the meshes.
	pub collection: CollectionId,
	/// `{prefix}_Rig_Widgets`, excluded from the view layer.
	pub widget_collection: CollectionId,
	pub meshes: Vec<ObjectId>,
	/// Original material to its per-character duplicate.
	pub materials: BTreeMap<MaterialId, MaterialId>,
	/// Original bone widget to its per-character duplicate.
	pub widgets: BTreeMap<ObjectId, ObjectId>,
	pub skipped_modifiers: Vec<SkippedModifier>,
	pub teardown: Teardown,
	pub purged: PurgeStats,
}

/// The rig and every visible object below it, rig first if it is visible itself.
fn visible_members(scene: &Scene, rig: ObjectId) -> Vec<ObjectId> {
	let mut members = Vec::new();
	if scene.is_visible(rig) {
		members.push(rig);
	}
	members.extend((scene.children_recursive(rig).into_iter()).filter(|&child| scene.is_visible(child)));
	members
}

fn is_kind(scene: &Scene, id: ObjectId, kind: ObjectKind) -> bool {
	scene.object(id).is_ok_and(|object| object.kind() == kind)
}

fn set_pose_position(scene: &mut Scene, armature: ArmatureId, position: PosePosition) {
	if let Some(armature) = scene.armatures.get_mut(armature) {
		armature.pose_position = position;
	}
}

/// Applies every non-armature modifier in stack order. Failures leave the modifier in place.
fn freeze_modifiers(
	scene: &mut Scene,
	evaluator: &mut dyn ModifierEvaluator,
	object: ObjectId,
	skipped: &mut Vec<SkippedModifier>,
) -> Result<(), SceneError> {
	let obj = scene.object(object)?;
	let object_name = obj.name.clone();
	let names: Vec<String> = (obj.modifiers.iter())
		.filter(|modifier| !modifier.is_armature())
		.map(|modifier| modifier.name.clone())
		.collect();

	for name in names {
		if let Err(reason) = host::apply_modifier(scene, evaluator, object, &name) {
			warn!("Could not apply modifier {name:?} on {object_name:?}: {reason}");
			skipped.push(SkippedModifier {
				object: object_name.clone(),
				modifier: name,
				reason,
			});
		}
	}
	Ok(())
}

/// Points the first armature modifier at `rig`, adding one if the stack has none.
fn ensure_armature_modifier(object: &mut Object, rig: ObjectId) {
	let existing = (object.modifiers.iter_mut()).find_map(|modifier| match &mut modifier.kind {
		ModifierKind::Armature { object } => Some(object),
		_ => None,
	});
	match existing {
		Some(target) => *target = Some(rig),
		None => object.modifiers.push(Modifier::armature("Armature", Some(rig))),
	}
}

/// Duplicates the rig named in `config` with its visible hierarchy and freezes the copy.
///
/// The copy is posed at rest while its procedural modifiers are applied, gets `{prefix}_`
/// names, its own materials and bone widgets, and lands in `{prefix}_Collection`. The source
/// collection is then deleted with everything in it and orphaned data is purged.
///
/// Precondition failures return before the scene is changed. A modifier that fails to apply
/// is logged, left on its mesh and listed in [`BakedCharacter::skipped_modifiers`].
pub fn bake_hierarchy(
	scene: &mut Scene,
	evaluator: &mut dyn ModifierEvaluator,
	config: &Config,
	prefix: &str,
) -> Result<BakedCharacter, HierarchyBakeError> {
	let prefix = prefix.trim();
	if prefix.is_empty() {
		return Err(HierarchyBakeError::EmptyPrefix);
	}

	let source_rig = (scene.objects.find(&config.rig_name))
		.ok_or_else(|| HierarchyBakeError::RigNotFound(config.rig_name.clone()))?;
	let source_armature = (scene.object(source_rig)?.armature())
		.ok_or_else(|| HierarchyBakeError::NotAnArmature(config.rig_name.clone()))?;

	let members = visible_members(scene, source_rig);
	if !members.iter().any(|&id| is_kind(scene, id, ObjectKind::Mesh)) {
		return Err(HierarchyBakeError::NoVisibleMeshes(config.rig_name.clone()));
	}

	// procedural geometry depends on the pose, freeze it at rest
	let previous_pose = (scene.armatures.get(source_armature))
		.map(|armature| armature.pose_position)
		.unwrap_or_default();
	set_pose_position(scene, source_armature, PosePosition::Rest);
	evaluator.update(scene);

	let copies = match duplicate_members(scene, &members) {
		Ok(copies) => copies,
		Err(e) => {
			set_pose_position(scene, source_armature, previous_pose);
			return Err(e);
		}
	};
	let rig = copies.rig;
	let rig_name = naming::prefixed(prefix, &config.rig_name);
	scene.objects.rename(rig, &rig_name);

	let root = scene.collections.root();
	let collection = scene.collections.create(&format!("{prefix}_Collection"), Some(root))?;
	let widget_collection = scene.collections.create(&format!("{prefix}_Rig_Widgets"), Some(collection))?;
	if let Some(widgets) = scene.collections.get(widget_collection).map(|c| c.name.clone()) {
		scene.collections.exclude_from_view_layer(&widgets);
	}

	let widgets = identity::rebind_widgets(scene, rig, prefix, widget_collection)?;

	for &copy in &copies.objects {
		for linked in scene.collections.users_collection(copy) {
			scene.collections.unlink_object(linked, copy);
		}
		scene.collections.link_object(collection, copy)?;
	}

	let mut materials = IdentityMap::new();
	let mut skipped_modifiers = Vec::new();
	let mut meshes = Vec::new();
	for &copy in &copies.objects {
		if copy == rig {
			continue;
		}
		let name = naming::prefixed(prefix, &scene.object(copy)?.name);
		scene.objects.rename(copy, &name);
		if !is_kind(scene, copy, ObjectKind::Mesh) {
			continue;
		}
		scene.set_active(Some(copy));
		scene.object_mut(copy)?.parent = Some(rig);

		freeze_modifiers(scene, evaluator, copy, &mut skipped_modifiers)?;

		let slots = scene.object(copy)?.material_slots.clone();
		let mut unique_slots = Vec::with_capacity(slots.len());
		for slot in slots {
			unique_slots.push(match slot {
				Some(material) => Some(identity::unique_material(scene, &mut materials, material, prefix)?),
				None => None,
			});
		}

		let object = scene.object_mut(copy)?;
		object.material_slots = unique_slots;
		ensure_armature_modifier(object, rig);
		debug!("Baked mesh {name:?}");
		meshes.push(copy);
	}

	let teardown = match scene.collections.find(&config.source_collection) {
		Some(source) => teardown::tear_down(scene, source),
		None => {
			warn!("Source collection {:?} not found, nothing to remove", config.source_collection);
			Teardown::default()
		}
	};
	let purged = scene.purge_orphans();

	// the source rig only survives if it lived outside the source collection
	set_pose_position(scene, source_armature, previous_pose);
	let rig_object = scene.object_mut(rig)?;
	rig_object.mode = ObjectMode::Pose;
	if let Some(armature) = rig_object.armature() {
		set_pose_position(scene, armature, previous_pose);
	}
	scene.deselect_all();
	scene.select(rig, true)?;
	scene.set_active(Some(rig));

	info!(
		"Baked {prefix:?}: {} meshes, {} materials, {} widgets, {} modifiers skipped",
		meshes.len(),
		materials.len(),
		widgets.len(),
		skipped_modifiers.len()
	);

	Ok(BakedCharacter {
		rig,
		collection,
		widget_collection,
		meshes,
		materials: materials.into_inner(),
		widgets: widgets.into_inner(),
		skipped_modifiers,
		teardown,
		purged,
	})
}

struct Copies {
	rig: ObjectId,
	objects: Vec<ObjectId>,
}

/// Duplicates the members as a selection and finds the copied rig.
///
/// Anything but exactly one armature among the copies removes them all again.
fn duplicate_members(scene: &mut Scene, members: &[ObjectId]) -> Result<Copies, HierarchyBakeError> {
	scene.deselect_all();
	for &member in members {
		scene.select(member, true)?;
	}
	let objects = scene.duplicate_objects(members)?;

	let rigs: Vec<ObjectId> = (objects.iter().copied())
		.filter(|&id| is_kind(scene, id, ObjectKind::Armature))
		.collect();
	match rigs[..] {
		[rig] => Ok(Copies { rig, objects }),
		_ => {
			for copy in objects {
				if let Some(object) = scene.remove_object(copy) {
					scene.remove_data_if_orphan(object.data);
				}
			}
			Err(HierarchyBakeError::RigNotDuplicated(rigs.len()))
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::host::{ModifierError, PassthroughEvaluator};
	use crate::scene::{Mesh, ObjectData};
	use crate::testing::{character_scene, CharacterFixture};

	fn bake(fx: &mut CharacterFixture, prefix: &str) -> Result<BakedCharacter, HierarchyBakeError> {
		bake_hierarchy(&mut fx.scene, &mut PassthroughEvaluator::new(), &Config::default(), prefix)
	}

	fn name(scene: &Scene, id: ObjectId) -> &str {
		&scene.object(id).unwrap().name
	}

	#[test]
	fn bakes_visible_hierarchy_into_new_collection() {
		let mut fx = character_scene();
		let baked = bake(&mut fx, "Hero").unwrap();
		let scene = &fx.scene;

		let collection = scene.collections.get(baked.collection).unwrap();
		assert_eq!(collection.name, "Hero_Collection");
		// four visible meshes plus the rig
		assert_eq!(collection.objects.len(), 5);
		assert!(collection.objects.contains(&baked.rig));
		assert_eq!(name(scene, baked.rig), "Hero_CharRig");

		let mut names: Vec<&str> = baked.meshes.iter().map(|&m| name(scene, m)).collect();
		names.sort();
		assert_eq!(
			names,
			vec!["Hero_CharCust_1", "Hero_CharCust_2", "Hero_CharCust_Eyes", "Hero_CharCust_Mouth"]
		);

		// the source is gone, hidden cape included
		assert!(scene.collections.find("Master_Character_Collection").is_none());
		assert!(scene.objects.find("CharRig").is_none());
		assert!(scene.objects.find("CharCust_Cape").is_none());
		assert!(scene.objects.find_by_prefix("Hero_CharCust_Cape").is_none());
		assert_eq!(scene.objects.len(), 7);
		assert_eq!(scene.meshes.len(), 6);
		assert_eq!(scene.armatures.len(), 1);
		assert_eq!(baked.teardown.collections, 3);
	}

	#[test]
	fn meshes_follow_the_new_rig() {
		let mut fx = character_scene();
		let baked = bake(&mut fx, "Hero").unwrap();
		let scene = &fx.scene;

		for &mesh in &baked.meshes {
			let object = scene.object(mesh).unwrap();
			assert_eq!(object.parent, Some(baked.rig));
			let armature_targets: Vec<_> = (object.modifiers.iter())
				.filter_map(|m| match m.kind {
					ModifierKind::Armature { object } => Some(object),
					_ => None,
				})
				.collect();
			assert_eq!(armature_targets, vec![Some(baked.rig)]);
			// the geometry nodes modifier was applied away
			assert!(object.modifier("GeometryNodes").is_none());
		}
		assert!(baked.skipped_modifiers.is_empty());
	}

	#[test]
	fn shared_material_gets_one_duplicate() {
		let mut fx = character_scene();
		let baked = bake(&mut fx, "Hero").unwrap();
		let scene = &fx.scene;

		let hero_skin = baked.materials[&fx.skin];
		assert_eq!(scene.material(hero_skin).unwrap().name, "Hero_Skin");
		for name in ["Hero_CharCust_1", "Hero_CharCust_Eyes", "Hero_CharCust_Mouth"] {
			let object = scene.object(scene.objects.find(name).unwrap()).unwrap();
			assert_eq!(object.material_slots[0], Some(hero_skin), "{name}");
		}

		assert_eq!(baked.materials.len(), 3);
		let mut names: Vec<&str> = scene.materials.iter().map(|(_, m)| m.name.as_str()).collect();
		names.sort();
		// the originals were purged once nothing used them
		assert_eq!(names, vec!["Hero_Earrings", "Hero_Skin", "Hero_Skin 2"]);
		assert_eq!(baked.purged.materials, 3);
	}

	#[test]
	fn shared_widgets_get_one_duplicate() {
		let mut fx = character_scene();
		let baked = bake(&mut fx, "Hero").unwrap();
		let scene = &fx.scene;

		let pose = &scene.object(baked.rig).unwrap().pose;
		assert_eq!(pose[1].custom_shape, pose[2].custom_shape);
		let circle = pose[1].custom_shape.unwrap();
		assert_eq!(name(scene, circle), "Hero_WGT_WGT_Circle");
		assert_eq!(name(scene, pose[0].custom_shape.unwrap()), "Hero_WGT_WGT_Root");

		let widgets = scene.collections.get(baked.widget_collection).unwrap();
		assert_eq!(widgets.name, "Hero_Rig_Widgets");
		assert_eq!(widgets.objects.len(), 2);
		assert!(scene.collections.is_excluded(baked.widget_collection));
		assert!(!scene.is_visible(circle));
		assert_eq!(baked.widgets.len(), 2);
	}

	#[test]
	fn names_never_carry_duplicate_suffixes() {
		let mut fx = character_scene();
		fx.scene.objects.rename(fx.mouth, "CharCust_Mouth.004");
		fx.scene.materials.rename(fx.skin2, "Skin 2.002");

		let baked = bake(&mut fx, "  Hero ").unwrap();
		let scene = &fx.scene;
		assert!(scene.objects.find("Hero_CharCust_Mouth").is_some());
		assert_eq!(scene.material(baked.materials[&fx.skin2]).unwrap().name, "Hero_Skin 2");
		for (_, object) in scene.objects.iter() {
			assert!(object.name.starts_with("Hero_"), "{}", object.name);
			assert_eq!(naming::base_name(&object.name), object.name);
		}
	}

	#[test]
	fn empty_children_are_prefixed_too() {
		let mut fx = character_scene();
		let mut socket = Object::new("HandSocket", ObjectData::Empty);
		socket.parent = Some(fx.rig);
		let socket = fx.scene.objects.insert(socket);
		let meshes = fx.scene.collections.find("Character_Meshes").unwrap();
		fx.scene.collections.link_object(meshes, socket).unwrap();

		let baked = bake(&mut fx, "Hero").unwrap();
		let scene = &fx.scene;

		let copy = scene.objects.find("Hero_HandSocket").unwrap();
		assert_eq!(scene.object(copy).unwrap().parent, Some(baked.rig));
		assert!(!baked.meshes.contains(&copy));

		let collection = scene.collections.get(baked.collection).unwrap();
		assert_eq!(collection.objects.len(), 6);
		for &id in &collection.objects {
			assert!(name(scene, id).starts_with("Hero_"), "{}", name(scene, id));
		}
	}

	#[test]
	fn rig_ends_up_posed_selected_and_active() {
		let mut fx = character_scene();
		let baked = bake(&mut fx, "Hero").unwrap();
		let scene = &fx.scene;

		let rig = scene.object(baked.rig).unwrap();
		assert_eq!(rig.mode, ObjectMode::Pose);
		let armature = scene.armatures.get(rig.armature().unwrap()).unwrap();
		assert_eq!(armature.pose_position, PosePosition::Pose);
		assert_eq!(scene.active(), Some(baked.rig));
		assert_eq!(scene.selected_objects(), vec![baked.rig]);
	}

	/// Records the rig's pose position on update and fails on one modifier type.
	struct Recording {
		inner: PassthroughEvaluator,
		seen: Vec<PosePosition>,
	}

	impl ModifierEvaluator for Recording {
		fn update(&mut self, scene: &Scene) {
			let rig = scene.objects.find("CharRig").and_then(|id| scene.object(id).ok()?.armature());
			if let Some(armature) = rig.and_then(|id| scene.armatures.get(id)) {
				self.seen.push(armature.pose_position);
			}
			self.inner.update(scene);
		}

		fn apply(&mut self, scene: &Scene, object: ObjectId, modifier: &Modifier) -> Result<Mesh, ModifierError> {
			self.inner.apply(scene, object, modifier)
		}
	}

	#[test]
	fn modifiers_evaluate_at_rest_and_failures_are_skipped() {
		let mut fx = character_scene();
		fx.scene.object_mut(fx.body).unwrap().modifiers.push(Modifier {
			name: "Smooth".to_owned(),
			kind: ModifierKind::Other {
				type_name: "SMOOTH".to_owned(),
			},
		});
		let mut evaluator = Recording {
			inner: PassthroughEvaluator::new(),
			seen: Vec::new(),
		};

		let baked = bake_hierarchy(&mut fx.scene, &mut evaluator, &Config::default(), "Hero").unwrap();
		assert_eq!(evaluator.seen, vec![PosePosition::Rest]);

		assert_eq!(baked.skipped_modifiers.len(), 1);
		let skipped = &baked.skipped_modifiers[0];
		assert_eq!(skipped.modifier, "Smooth");
		assert!(matches!(skipped.reason, ApplyModifierError::Evaluation(_)));

		let body = fx.scene.objects.find("Hero_CharCust_1").unwrap();
		let body = fx.scene.object(body).unwrap();
		assert!(body.modifier("Smooth").is_some());
		assert!(body.modifier("GeometryNodes").is_none());
		assert_eq!(baked.meshes.len(), 4);
	}

	#[test]
	fn no_visible_meshes_leaves_scene_unchanged() {
		let mut fx = character_scene();
		for id in [fx.body, fx.accessories, fx.eyes, fx.mouth] {
			fx.scene.object_mut(id).unwrap().hide_viewport = true;
		}
		let objects = fx.scene.objects.len();
		let collections = fx.scene.collections.ids();

		let err = bake(&mut fx, "Hero").unwrap_err();
		assert!(matches!(err, HierarchyBakeError::NoVisibleMeshes(_)));
		assert_eq!(fx.scene.objects.len(), objects);
		assert_eq!(fx.scene.collections.ids(), collections);
		let armature = fx.scene.object(fx.rig).unwrap().armature().unwrap();
		assert_eq!(fx.scene.armatures.get(armature).unwrap().pose_position, PosePosition::Pose);
	}

	#[test]
	fn precondition_failures() {
		let mut fx = character_scene();
		assert!(matches!(bake(&mut fx, " "), Err(HierarchyBakeError::EmptyPrefix)));

		let config = Config::default().rig_name("CharCust_1");
		assert!(matches!(
			bake_hierarchy(&mut fx.scene, &mut PassthroughEvaluator::new(), &config, "Hero"),
			Err(HierarchyBakeError::NotAnArmature(_))
		));

		fx.scene.objects.rename(fx.rig, "OtherRig");
		assert!(matches!(bake(&mut fx, "Hero"), Err(HierarchyBakeError::RigNotFound(_))));
	}

	#[test]
	fn hidden_rig_rolls_back_the_duplicates() {
		let mut fx = character_scene();
		fx.scene.object_mut(fx.rig).unwrap().hide_viewport = true;
		let objects = fx.scene.objects.len();
		let meshes = fx.scene.meshes.len();

		let err = bake(&mut fx, "Hero").unwrap_err();
		assert!(matches!(err, HierarchyBakeError::RigNotDuplicated(0)));
		assert_eq!(fx.scene.objects.len(), objects);
		assert_eq!(fx.scene.meshes.len(), meshes);
		assert!(fx.scene.collections.find("Hero_Collection").is_none());
		let armature = fx.scene.object(fx.rig).unwrap().armature().unwrap();
		assert_eq!(fx.scene.armatures.get(armature).unwrap().pose_position, PosePosition::Pose);
	}
}
