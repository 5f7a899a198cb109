//! Owned world model standing in for the host application's data stores.
//!
//! Every pipeline receives the [`Scene`] explicitly; nothing here is global.

mod armature;
mod collection;
mod display;
mod image;
mod material;
mod mesh;
mod object;
mod socket;
pub(crate) mod store;

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

pub use armature::{Armature, PosePosition};
pub use collection::{Collection, CollectionId, CollectionTree};
pub use image::{Image, ImageSource};
pub use material::{
	Extension, Interpolation, Material, NodeId, NodeLink, NodeTree, NodeTreeError, ShaderNode, ShaderNodeKind,
};
pub use mesh::{Mesh, UvLayer};
pub use object::{Modifier, ModifierKind, Object, ObjectData, ObjectKind, ObjectMode, PoseBone};
pub use socket::{SocketValue, ValueKind};
pub use store::{DataBlock, DataId, DataStore};

use store::data_id;

data_id!(
	/// Handle to an [`Object`].
	ObjectId
);
data_id!(
	/// Handle to [`Mesh`] data.
	MeshId
);
data_id!(
	/// Handle to [`Armature`] data.
	ArmatureId
);
data_id!(
	/// Handle to a [`Material`].
	MaterialId
);
data_id!(
	/// Handle to an [`Image`].
	ImageId
);

pub const MASTER_COLLECTION: &str = "Scene Collection";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
	#[error("No object {0:?}")]
	MissingObject(ObjectId),
	#[error("No mesh {0:?}")]
	MissingMesh(MeshId),
	#[error("No armature {0:?}")]
	MissingArmature(ArmatureId),
	#[error("No material {0:?}")]
	MissingMaterial(MaterialId),
	#[error("No image {0:?}")]
	MissingImage(ImageId),
	#[error("No collection {0:?}")]
	MissingCollection(CollectionId),
	#[error("Collection {0:?} still holds objects or child collections")]
	CollectionNotEmpty(String),
	#[error("Linking {child:?} under {parent:?} would create a cycle")]
	CollectionCycle { parent: String, child: String },
	#[error("The scene master collection cannot be removed")]
	RemoveMasterCollection,
}

/// Number of data-blocks removed by an orphan purge, per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PurgeStats {
	pub meshes: usize,
	pub armatures: usize,
	pub materials: usize,
	pub images: usize,
}

impl PurgeStats {
	pub fn total(&self) -> usize {
		self.meshes + self.armatures + self.materials + self.images
	}
}

impl std::ops::AddAssign for PurgeStats {
	fn add_assign(&mut self, rhs: Self) {
		self.meshes += rhs.meshes;
		self.armatures += rhs.armatures;
		self.materials += rhs.materials;
		self.images += rhs.images;
	}
}

/// The scene and every data-block it can reference.
pub struct Scene {
	pub objects: DataStore<ObjectId, Object>,
	pub meshes: DataStore<MeshId, Mesh>,
	pub armatures: DataStore<ArmatureId, Armature>,
	pub materials: DataStore<MaterialId, Material>,
	pub images: DataStore<ImageId, Image>,
	pub collections: CollectionTree,
	active: Option<ObjectId>,
}

impl Default for Scene {
	fn default() -> Self {
		Self::new()
	}
}

impl Scene {
	pub fn new() -> Self {
		Self {
			objects: DataStore::new(),
			meshes: DataStore::new(),
			armatures: DataStore::new(),
			materials: DataStore::new(),
			images: DataStore::new(),
			collections: CollectionTree::new(MASTER_COLLECTION),
			active: None,
		}
	}

	pub fn object(&self, id: ObjectId) -> Result<&Object, SceneError> {
		self.objects.get(id).ok_or(SceneError::MissingObject(id))
	}

	pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object, SceneError> {
		self.objects.get_mut(id).ok_or(SceneError::MissingObject(id))
	}

	pub fn mesh(&self, id: MeshId) -> Result<&Mesh, SceneError> {
		self.meshes.get(id).ok_or(SceneError::MissingMesh(id))
	}

	pub fn mesh_mut(&mut self, id: MeshId) -> Result<&mut Mesh, SceneError> {
		self.meshes.get_mut(id).ok_or(SceneError::MissingMesh(id))
	}

	pub fn armature_mut(&mut self, id: ArmatureId) -> Result<&mut Armature, SceneError> {
		self.armatures.get_mut(id).ok_or(SceneError::MissingArmature(id))
	}

	pub fn material(&self, id: MaterialId) -> Result<&Material, SceneError> {
		self.materials.get(id).ok_or(SceneError::MissingMaterial(id))
	}

	pub fn material_mut(&mut self, id: MaterialId) -> Result<&mut Material, SceneError> {
		self.materials.get_mut(id).ok_or(SceneError::MissingMaterial(id))
	}

	pub fn image_mut(&mut self, id: ImageId) -> Result<&mut Image, SceneError> {
		self.images.get_mut(id).ok_or(SceneError::MissingImage(id))
	}

	// selection

	pub fn active(&self) -> Option<ObjectId> {
		self.active.filter(|&id| self.objects.contains(id))
	}

	pub fn set_active(&mut self, id: Option<ObjectId>) {
		self.active = id;
	}

	pub fn select(&mut self, id: ObjectId, selected: bool) -> Result<(), SceneError> {
		self.object_mut(id)?.selected = selected;
		Ok(())
	}

	pub fn deselect_all(&mut self) {
		for id in self.objects.ids() {
			if let Some(object) = self.objects.get_mut(id) {
				object.selected = false;
			}
		}
	}

	pub fn selected_objects(&self) -> Vec<ObjectId> {
		(self.objects.iter())
			.filter(|(_, object)| object.selected)
			.map(|(id, _)| id)
			.collect()
	}

	// hierarchy

	/// An object is visible if it is not hidden and is linked into at least one collection
	/// that is part of the scene and not excluded from the view layer.
	pub fn is_visible(&self, id: ObjectId) -> bool {
		match self.objects.get(id) {
			Some(object) if !object.hide_viewport => (self.collections.users_collection(id).into_iter())
				.any(|c| self.collections.in_scene(c) && !self.collections.is_excluded(c)),
			_ => false,
		}
	}

	pub fn children(&self, id: ObjectId) -> Vec<ObjectId> {
		(self.objects.iter())
			.filter(|(_, object)| object.parent == Some(id))
			.map(|(child, _)| child)
			.collect()
	}

	/// All descendants of an object through parent links, parents before children.
	pub fn children_recursive(&self, id: ObjectId) -> Vec<ObjectId> {
		let mut by_parent: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();
		for (child, object) in self.objects.iter() {
			if let Some(parent) = object.parent {
				by_parent.entry(parent).or_default().push(child);
			}
		}

		let mut result = Vec::new();
		let mut seen = BTreeSet::from([id]);
		let mut stack: Vec<ObjectId> = by_parent.get(&id).cloned().unwrap_or_default();
		stack.reverse();
		while let Some(next) = stack.pop() {
			if !seen.insert(next) {
				continue;
			}
			result.push(next);
			if let Some(children) = by_parent.get(&next) {
				stack.extend(children.iter().rev());
			}
		}
		result
	}

	// duplication

	/// Copies an object without linking it anywhere. Data is shared with the original.
	pub fn copy_object(&mut self, id: ObjectId) -> Result<ObjectId, SceneError> {
		let mut copy = self.object(id)?.clone();
		copy.selected = false;
		Ok(self.objects.insert(copy))
	}

	pub fn copy_mesh(&mut self, id: MeshId) -> Result<MeshId, SceneError> {
		let copy = self.mesh(id)?.clone();
		Ok(self.meshes.insert(copy))
	}

	pub fn copy_armature(&mut self, id: ArmatureId) -> Result<ArmatureId, SceneError> {
		let copy = (self.armatures.get(id).cloned()).ok_or(SceneError::MissingArmature(id))?;
		Ok(self.armatures.insert(copy))
	}

	pub fn copy_material(&mut self, id: MaterialId) -> Result<MaterialId, SceneError> {
		let mut copy = self.material(id)?.clone();
		copy.use_fake_user = false;
		Ok(self.materials.insert(copy))
	}

	/// Copies an object together with its mesh or armature data.
	pub fn copy_object_with_data(&mut self, id: ObjectId) -> Result<ObjectId, SceneError> {
		let data = match self.object(id)?.data {
			ObjectData::Empty => ObjectData::Empty,
			ObjectData::Mesh(mesh) => ObjectData::Mesh(self.copy_mesh(mesh)?),
			ObjectData::Armature(armature) => ObjectData::Armature(self.copy_armature(armature)?),
		};
		let copy = self.copy_object(id)?;
		self.object_mut(copy)?.data = data;
		Ok(copy)
	}

	/// Duplicates a set of objects the way the host's duplicate operator does.
	///
	/// Mesh and armature data are copied, materials stay shared. Each copy is linked into the
	/// collections of its original, and parent/armature references pointing inside the set are
	/// redirected to the copies. The copies become the selection, in the order of `ids`.
	pub fn duplicate_objects(&mut self, ids: &[ObjectId]) -> Result<Vec<ObjectId>, SceneError> {
		let mut remap = HashMap::with_capacity(ids.len());
		let mut copies = Vec::with_capacity(ids.len());
		for &id in ids {
			if remap.contains_key(&id) {
				continue;
			}
			let copy = self.copy_object_with_data(id)?;
			for collection in self.collections.users_collection(id) {
				self.collections.link_object(collection, copy)?;
			}
			remap.insert(id, copy);
			copies.push(copy);
		}

		for &copy in &copies {
			let object = self.object_mut(copy)?;
			if let Some(parent) = object.parent.and_then(|p| remap.get(&p)) {
				object.parent = Some(*parent);
			}
			for modifier in &mut object.modifiers {
				if let ModifierKind::Armature { object: Some(target) } = &mut modifier.kind {
					if let Some(new_target) = remap.get(target) {
						*target = *new_target;
					}
				}
			}
		}

		self.deselect_all();
		for &copy in &copies {
			self.select(copy, true)?;
		}
		if let Some(active) = self.active.and_then(|a| remap.get(&a)) {
			self.active = Some(*active);
		}
		debug!("Duplicated {} objects", copies.len());
		Ok(copies)
	}

	// removal

	/// Deletes an object, unlinking it everywhere and clearing references to it.
	///
	/// Its data-block is left in place; see [`Scene::purge_orphans`].
	pub fn remove_object(&mut self, id: ObjectId) -> Option<Object> {
		let removed = self.objects.remove(id)?;
		self.collections.unlink_object_everywhere(id);

		for other in self.objects.ids() {
			let Some(object) = self.objects.get_mut(other) else {
				continue;
			};
			if object.parent == Some(id) {
				object.parent = None;
			}
			for modifier in &mut object.modifiers {
				if let ModifierKind::Armature { object: target } = &mut modifier.kind {
					if *target == Some(id) {
						*target = None;
					}
				}
			}
			for bone in &mut object.pose {
				if bone.custom_shape == Some(id) {
					bone.custom_shape = None;
				}
			}
		}
		if self.active == Some(id) {
			self.active = None;
		}
		Some(removed)
	}

	// users

	pub fn mesh_users(&self, id: MeshId) -> usize {
		self.objects.iter().filter(|(_, o)| o.data == ObjectData::Mesh(id)).count()
	}

	pub fn armature_users(&self, id: ArmatureId) -> usize {
		self.objects.iter().filter(|(_, o)| o.data == ObjectData::Armature(id)).count()
	}

	pub fn material_users(&self, id: MaterialId) -> usize {
		(self.objects.iter())
			.flat_map(|(_, o)| o.material_slots.iter())
			.filter(|slot| **slot == Some(id))
			.count()
	}

	/// Image texture nodes sampling the image, across all materials.
	pub fn image_users(&self, id: ImageId) -> usize {
		(self.materials.iter())
			.map(|(_, material)| material.node_tree.image_users(id))
			.sum()
	}

	pub fn remove_mesh_if_orphan(&mut self, id: MeshId) -> bool {
		self.mesh_users(id) == 0 && self.meshes.remove(id).is_some()
	}

	pub fn remove_armature_if_orphan(&mut self, id: ArmatureId) -> bool {
		self.armature_users(id) == 0 && self.armatures.remove(id).is_some()
	}

	pub fn remove_material_if_orphan(&mut self, id: MaterialId) -> bool {
		match self.materials.get(id) {
			Some(material) if !material.use_fake_user && self.material_users(id) == 0 => {
				self.materials.remove(id).is_some()
			}
			_ => false,
		}
	}

	pub fn remove_image_if_orphan(&mut self, id: ImageId) -> bool {
		match self.images.get(id) {
			Some(image) if !image.use_fake_user && self.image_users(id) == 0 => self.images.remove(id).is_some(),
			_ => false,
		}
	}

	/// Removes the data-block an object instanced, if nothing else uses it anymore.
	pub fn remove_data_if_orphan(&mut self, data: ObjectData) -> bool {
		match data {
			ObjectData::Empty => false,
			ObjectData::Mesh(mesh) => self.remove_mesh_if_orphan(mesh),
			ObjectData::Armature(armature) => self.remove_armature_if_orphan(armature),
		}
	}

	/// Removes every unreferenced data-block, repeating until nothing more is freed
	/// (removing a material can orphan the images it sampled).
	pub fn purge_orphans(&mut self) -> PurgeStats {
		let mut total = PurgeStats::default();
		loop {
			let mut pass = PurgeStats::default();
			for id in self.meshes.ids() {
				pass.meshes += usize::from(self.remove_mesh_if_orphan(id));
			}
			for id in self.armatures.ids() {
				pass.armatures += usize::from(self.remove_armature_if_orphan(id));
			}
			for id in self.materials.ids() {
				pass.materials += usize::from(self.remove_material_if_orphan(id));
			}
			for id in self.images.ids() {
				pass.images += usize::from(self.remove_image_if_orphan(id));
			}

			if pass.total() == 0 {
				break;
			}
			total += pass;
		}
		debug!("Purged orphan data: {total:?}");
		total
	}
}
