use std::collections::BTreeMap;

use tracing::debug;

use crate::naming;
use crate::scene::{CollectionId, MaterialId, ObjectId, Scene, SceneError};

/// Maps each original data-block to the one duplicate made for it during a single bake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMap<I> {
	map: BTreeMap<I, I>,
}

impl<I: Copy + Ord> Default for IdentityMap<I> {
	fn default() -> Self {
		Self { map: BTreeMap::new() }
	}
}

impl<I: Copy + Ord> IdentityMap<I> {
	pub fn new() -> Self {
		Self::default()
	}

	/// The duplicate of `original`, calling `duplicate` only the first time it is asked for.
	pub fn resolve<E>(&mut self, original: I, duplicate: impl FnOnce() -> Result<I, E>) -> Result<I, E> {
		if let Some(&copy) = self.map.get(&original) {
			return Ok(copy);
		}
		let copy = duplicate()?;
		self.map.insert(original, copy);
		Ok(copy)
	}

	pub fn get(&self, original: I) -> Option<I> {
		self.map.get(&original).copied()
	}

	pub fn len(&self) -> usize {
		self.map.len()
	}

	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}

	pub fn into_inner(self) -> BTreeMap<I, I> {
		self.map
	}
}

/// Gives every custom bone shape of `rig` its own copy, shared by all bones that used the same original.
///
/// Copies are named `{prefix}_WGT_{original}` and linked only into `collection`.
pub(super) fn rebind_widgets(
	scene: &mut Scene,
	rig: ObjectId,
	prefix: &str,
	collection: CollectionId,
) -> Result<IdentityMap<ObjectId>, SceneError> {
	let shapes: Vec<(usize, ObjectId)> = (scene.object(rig)?.pose.iter().enumerate())
		.filter_map(|(i, bone)| bone.custom_shape.map(|shape| (i, shape)))
		.collect();

	let mut widgets = IdentityMap::new();
	for (bone, shape) in shapes {
		let copy = widgets.resolve(shape, || -> Result<ObjectId, SceneError> {
			let name = format!("{prefix}_WGT_{}", naming::base_name(&scene.object(shape)?.name));
			let copy = scene.copy_object_with_data(shape)?;
			scene.objects.rename(copy, &name);
			scene.collections.link_object(collection, copy)?;
			debug!("Duplicated widget {name:?}");
			Ok(copy)
		})?;

		if let Some(pose_bone) = scene.object_mut(rig)?.pose.get_mut(bone) {
			pose_bone.custom_shape = Some(copy);
		}
	}
	Ok(widgets)
}

/// The per-character duplicate of `original`, named `{prefix}_{base}`.
pub(super) fn unique_material(
	scene: &mut Scene,
	materials: &mut IdentityMap<MaterialId>,
	original: MaterialId,
	prefix: &str,
) -> Result<MaterialId, SceneError> {
	materials.resolve(original, || {
		let name = naming::prefixed(prefix, &scene.material(original)?.name);
		let copy = scene.copy_material(original)?;
		scene.materials.rename(copy, &name);
		debug!("Duplicated material {name:?}");
		Ok(copy)
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::character_scene;

	#[test]
	fn resolve_duplicates_once() {
		let mut map = IdentityMap::new();
		let mut calls = 0;
		for _ in 0..3 {
			let copy = map
				.resolve(1u32, || {
					calls += 1;
					Ok::<_, ()>(10)
				})
				.unwrap();
			assert_eq!(copy, 10);
		}
		assert_eq!(calls, 1);
		assert_eq!(map.get(1), Some(10));
		assert_eq!(map.len(), 1);
	}

	#[test]
	fn failed_duplicate_is_not_recorded() {
		let mut map = IdentityMap::<u32>::new();
		assert_eq!(map.resolve(1, || Err("boom")), Err("boom"));
		assert!(map.is_empty());
	}

	#[test]
	fn shared_widgets_get_one_copy() {
		let mut fx = character_scene();
		let root = fx.scene.collections.root();
		let widgets_col = fx.scene.collections.create("Hero_Rig_Widgets", Some(root)).unwrap();

		let map = rebind_widgets(&mut fx.scene, fx.rig, "Hero", widgets_col).unwrap();
		assert_eq!(map.len(), 2);

		let pose = &fx.scene.object(fx.rig).unwrap().pose;
		// spine and head shared WGT_Circle
		assert_eq!(pose[1].custom_shape, pose[2].custom_shape);
		assert_eq!(pose[3].custom_shape, None);

		let circle = map.get(fx.widgets[1]).unwrap();
		let circle_obj = fx.scene.object(circle).unwrap();
		assert_eq!(circle_obj.name, "Hero_WGT_WGT_Circle");
		assert_ne!(circle_obj.mesh(), fx.scene.object(fx.widgets[1]).unwrap().mesh());
		assert_eq!(fx.scene.collections.users_collection(circle), vec![widgets_col]);
	}

	#[test]
	fn materials_dedup_per_reference() {
		let mut fx = character_scene();
		let mut map = IdentityMap::new();

		let a = unique_material(&mut fx.scene, &mut map, fx.skin, "Hero").unwrap();
		let b = unique_material(&mut fx.scene, &mut map, fx.skin, "Hero").unwrap();
		let c = unique_material(&mut fx.scene, &mut map, fx.skin2, "Hero").unwrap();

		assert_eq!(a, b);
		assert_ne!(a, c);
		assert_eq!(fx.scene.material(a).unwrap().name, "Hero_Skin");
		assert_eq!(fx.scene.material(c).unwrap().name, "Hero_Skin 2");
	}
}
