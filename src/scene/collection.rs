use std::collections::BTreeMap;

use indextree::Arena;

use super::{ObjectId, SceneError};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionId(pub(crate) indextree::NodeId);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collection {
	pub name: String,
	pub objects: Vec<ObjectId>,
	/// Excluded from the active view layer. Applies to the whole subtree.
	pub exclude: bool,
}

/// Collection hierarchy of a scene, rooted at the scene master collection.
///
/// Collections created without a parent stay detached from the scene until linked.
pub struct CollectionTree {
	root: indextree::NodeId,
	arena: Arena<Collection>,
	ids: BTreeMap<String, indextree::NodeId>,
}

impl CollectionTree {
	pub fn new(root_name: &str) -> Self {
		let mut arena = Arena::new();
		let root = arena.new_node(Collection {
			name: root_name.to_owned(),
			..Default::default()
		});
		let mut ids = BTreeMap::new();
		ids.insert(root_name.to_owned(), root);

		Self { root, arena, ids }
	}

	pub fn root(&self) -> CollectionId {
		CollectionId(self.root)
	}

	fn unique_name(&self, desired: &str) -> String {
		let mut name = desired.to_owned();
		let mut n = 1;
		while self.ids.contains_key(&name) {
			name = crate::naming::numbered(desired, n);
			n += 1;
		}
		name
	}

	/// Creates a collection, linked under `parent` if given.
	pub fn create(&mut self, name: &str, parent: Option<CollectionId>) -> Result<CollectionId, SceneError> {
		if let Some(parent) = parent {
			self.get(parent).ok_or(SceneError::MissingCollection(parent))?;
		}

		let name = self.unique_name(name);
		let id = self.arena.new_node(Collection {
			name: name.clone(),
			..Default::default()
		});
		self.ids.insert(name, id);

		if let Some(parent) = parent {
			parent.0.append(id, &mut self.arena);
		}
		Ok(CollectionId(id))
	}

	/// Moves `child` (with its subtree) under `parent`.
	pub fn link_child(&mut self, parent: CollectionId, child: CollectionId) -> Result<(), SceneError> {
		self.get(parent).ok_or(SceneError::MissingCollection(parent))?;
		self.get(child).ok_or(SceneError::MissingCollection(child))?;
		if child.0 == self.root || parent.0.ancestors(&self.arena).any(|a| a == child.0) {
			return Err(SceneError::CollectionCycle {
				parent: self.name(parent).to_owned(),
				child: self.name(child).to_owned(),
			});
		}

		child.0.detach(&mut self.arena);
		parent.0.append(child.0, &mut self.arena);
		Ok(())
	}

	pub fn get(&self, id: CollectionId) -> Option<&Collection> {
		let node = self.arena.get(id.0)?;
		(!node.is_removed()).then(|| node.get())
	}

	pub fn get_mut(&mut self, id: CollectionId) -> Option<&mut Collection> {
		let node = self.arena.get_mut(id.0)?;
		if node.is_removed() {
			return None;
		}
		Some(node.get_mut())
	}

	fn name(&self, id: CollectionId) -> &str {
		self.get(id).map(|c| c.name.as_str()).unwrap_or("<removed>")
	}

	pub fn find(&self, name: &str) -> Option<CollectionId> {
		self.ids.get(name).copied().map(CollectionId)
	}

	/// Every live collection, by name.
	pub fn ids(&self) -> Vec<CollectionId> {
		self.ids.values().copied().map(CollectionId).collect()
	}

	pub fn parent(&self, id: CollectionId) -> Option<CollectionId> {
		self.arena.get(id.0)?.parent().map(CollectionId)
	}

	pub fn children(&self, id: CollectionId) -> Vec<CollectionId> {
		id.0.children(&self.arena).map(CollectionId).collect()
	}

	/// `id` and all collections below it, parents before children.
	pub fn subtree(&self, id: CollectionId) -> Vec<CollectionId> {
		if self.get(id).is_none() {
			return Vec::new();
		}
		id.0.descendants(&self.arena).map(CollectionId).collect()
	}

	/// Whether the collection is reachable from the scene master collection.
	pub fn in_scene(&self, id: CollectionId) -> bool {
		self.get(id).is_some() && id.0.ancestors(&self.arena).any(|a| a == self.root)
	}

	/// Whether the collection or any of its parents is excluded from the view layer.
	pub fn is_excluded(&self, id: CollectionId) -> bool {
		id.0.ancestors(&self.arena).any(|a| self.arena[a].get().exclude)
	}

	/// Searches the scene's collections for `name` and excludes it from the view layer.
	///
	/// Returns `false` if no collection of that name is part of the scene.
	pub fn exclude_from_view_layer(&mut self, name: &str) -> bool {
		let target = (self.root.descendants(&self.arena))
			.skip(1)
			.find(|&id| self.arena[id].get().name == name);

		match target {
			Some(id) => {
				self.arena[id].get_mut().exclude = true;
				true
			}
			None => false,
		}
	}

	/// Links an object into a collection. Returns `false` if it was already linked there.
	pub fn link_object(&mut self, id: CollectionId, object: ObjectId) -> Result<bool, SceneError> {
		let collection = self.get_mut(id).ok_or(SceneError::MissingCollection(id))?;
		if collection.objects.contains(&object) {
			return Ok(false);
		}
		collection.objects.push(object);
		Ok(true)
	}

	/// Returns `false` if the object was not linked there.
	pub fn unlink_object(&mut self, id: CollectionId, object: ObjectId) -> bool {
		match self.get_mut(id) {
			Some(collection) => {
				let before = collection.objects.len();
				collection.objects.retain(|&o| o != object);
				collection.objects.len() != before
			}
			None => false,
		}
	}

	pub(crate) fn unlink_object_everywhere(&mut self, object: ObjectId) {
		for id in self.ids() {
			self.unlink_object(id, object);
		}
	}

	/// Collections the object is linked into.
	pub fn users_collection(&self, object: ObjectId) -> Vec<CollectionId> {
		(self.ids.values())
			.filter(|&&id| self.arena[id].get().objects.contains(&object))
			.copied()
			.map(CollectionId)
			.collect()
	}

	/// Removes an empty collection. Objects and child collections must be removed first.
	pub fn remove(&mut self, id: CollectionId) -> Result<Collection, SceneError> {
		if id.0 == self.root {
			return Err(SceneError::RemoveMasterCollection);
		}
		let collection = self.get(id).ok_or(SceneError::MissingCollection(id))?;
		if !collection.objects.is_empty() || id.0.children(&self.arena).next().is_some() {
			return Err(SceneError::CollectionNotEmpty(collection.name.clone()));
		}

		let collection = collection.clone();
		self.ids.remove(&collection.name);
		id.0.remove(&mut self.arena);
		Ok(collection)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn create_and_nest() {
		let mut tree = CollectionTree::new("Scene Collection");
		let root = tree.root();
		let a = tree.create("Character", Some(root)).unwrap();
		let b = tree.create("Widgets", Some(a)).unwrap();
		let detached = tree.create("Character", None).unwrap();

		assert_eq!(tree.get(detached).unwrap().name, "Character.001");
		assert_eq!(tree.subtree(a), vec![a, b]);
		assert!(tree.in_scene(b));
		assert!(!tree.in_scene(detached));

		tree.link_child(root, detached).unwrap();
		assert!(tree.in_scene(detached));
		assert_eq!(tree.parent(detached), Some(root));
	}

	#[test]
	fn link_child_rejects_cycles() {
		let mut tree = CollectionTree::new("Scene Collection");
		let a = tree.create("A", Some(tree.root())).unwrap();
		let b = tree.create("B", Some(a)).unwrap();

		assert!(matches!(tree.link_child(b, a), Err(SceneError::CollectionCycle { .. })));
		assert!(tree.link_child(b, tree.root()).is_err());
	}

	#[test]
	fn exclusion_applies_to_subtree() {
		let mut tree = CollectionTree::new("Scene Collection");
		let a = tree.create("Hero_Collection", Some(tree.root())).unwrap();
		let w = tree.create("Hero_Rig_Widgets", Some(a)).unwrap();
		let inner = tree.create("Inner", Some(w)).unwrap();

		assert!(tree.exclude_from_view_layer("Hero_Rig_Widgets"));
		assert!(!tree.exclude_from_view_layer("Scene Collection"));
		assert!(!tree.exclude_from_view_layer("Nope"));

		assert!(!tree.is_excluded(a));
		assert!(tree.is_excluded(w));
		assert!(tree.is_excluded(inner));
	}

	#[test]
	fn remove_requires_empty() {
		let mut tree = CollectionTree::new("Scene Collection");
		let a = tree.create("A", Some(tree.root())).unwrap();
		let b = tree.create("B", Some(a)).unwrap();
		tree.link_object(b, ObjectId(0)).unwrap();

		assert!(matches!(tree.remove(a), Err(SceneError::CollectionNotEmpty(_))));
		assert!(matches!(tree.remove(b), Err(SceneError::CollectionNotEmpty(_))));
		assert!(matches!(tree.remove(tree.root()), Err(SceneError::RemoveMasterCollection)));

		assert!(tree.unlink_object(b, ObjectId(0)));
		assert_eq!(tree.remove(b).unwrap().name, "B");
		assert_eq!(tree.remove(a).unwrap().name, "A");
		assert!(tree.find("A").is_none());
		assert!(tree.get(a).is_none());
	}

	#[test]
	fn users_collection_lists_every_link() {
		let mut tree = CollectionTree::new("Scene Collection");
		let a = tree.create("A", Some(tree.root())).unwrap();
		let b = tree.create("B", Some(tree.root())).unwrap();
		let obj = ObjectId(3);

		assert!(tree.link_object(a, obj).unwrap());
		assert!(!tree.link_object(a, obj).unwrap());
		assert!(tree.link_object(b, obj).unwrap());
		assert_eq!(tree.users_collection(obj), vec![a, b]);

		tree.unlink_object_everywhere(obj);
		assert!(tree.users_collection(obj).is_empty());
	}
}
