use tracing::{debug, warn};

use crate::scene::{CollectionId, ObjectData, ObjectId, Scene};

/// What tearing down a collection tree removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Teardown {
	pub objects: usize,
	/// Mesh and armature data-blocks freed along with their objects.
	pub data: usize,
	pub collections: usize,
}

/// Deletes a collection with everything in it.
///
/// Objects go first, then the mesh/armature data they leave unused, then the collections
/// bottom-up, and the root last. Data still used elsewhere and collections that cannot be
/// emptied are left in place.
pub(super) fn tear_down(scene: &mut Scene, root: CollectionId) -> Teardown {
	let mut stats = Teardown::default();
	let subtree = scene.collections.subtree(root);

	let mut objects: Vec<ObjectId> = Vec::new();
	for &collection in &subtree {
		let Some(collection) = scene.collections.get(collection) else {
			continue;
		};
		for &id in &collection.objects {
			if !objects.contains(&id) {
				objects.push(id);
			}
		}
	}

	let mut freed = Vec::with_capacity(objects.len());
	for id in objects {
		if let Some(object) = scene.remove_object(id) {
			debug!("Deleted {:?}", object.name);
			freed.push(object.data);
			stats.objects += 1;
		}
	}

	for data in freed {
		if scene.remove_data_if_orphan(data) {
			stats.data += 1;
		} else if data != ObjectData::Empty {
			debug!("Keeping {data:?}, still in use");
		}
	}

	// pre-order reversed: children before their parents, root last
	for &collection in subtree.iter().rev() {
		match scene.collections.remove(collection) {
			Ok(removed) => {
				debug!("Removed collection {:?}", removed.name);
				stats.collections += 1;
			}
			Err(e) => warn!("Could not remove collection: {e}"),
		}
	}
	stats
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::scene::Object;
	use crate::testing::character_scene;

	#[test]
	fn removes_everything_under_the_source() {
		let mut fx = character_scene();
		let stats = tear_down(&mut fx.scene, fx.source);

		assert_eq!(
			stats,
			Teardown {
				objects: 8,
				data: 8,
				collections: 3,
			}
		);
		assert!(fx.scene.objects.is_empty());
		assert!(fx.scene.meshes.is_empty());
		assert!(fx.scene.armatures.is_empty());
		assert!(fx.scene.collections.find("Master_Character_Collection").is_none());
		assert!(fx.scene.collections.find("WGTS").is_none());
		// materials are left to the orphan purge
		assert_eq!(fx.scene.materials.len(), 3);
	}

	#[test]
	fn shared_data_survives() {
		let mut fx = character_scene();
		let mesh = fx.scene.object(fx.body).unwrap().data;
		let outside = fx.scene.objects.insert(Object::new("Outside", mesh));
		let root = fx.scene.collections.root();
		fx.scene.collections.link_object(root, outside).unwrap();

		let stats = tear_down(&mut fx.scene, fx.source);
		assert_eq!(stats.data, 7);
		assert!(fx.scene.object(outside).is_ok());
		assert_eq!(fx.scene.mesh_users(fx.scene.object(outside).unwrap().mesh().unwrap()), 1);
	}
}
