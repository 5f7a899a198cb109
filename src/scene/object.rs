use std::collections::BTreeMap;

use super::store::impl_data_block;
use super::{ArmatureId, MaterialId, MeshId, ObjectId, SocketValue};

/// What an object instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectData {
	Empty,
	Mesh(MeshId),
	Armature(ArmatureId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
	Empty,
	Mesh,
	Armature,
}

impl ObjectData {
	pub fn kind(&self) -> ObjectKind {
		match self {
			ObjectData::Empty => ObjectKind::Empty,
			ObjectData::Mesh(_) => ObjectKind::Mesh,
			ObjectData::Armature(_) => ObjectKind::Armature,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectMode {
	#[default]
	Object,
	Pose,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModifierKind {
	/// Deforms the mesh by a rig.
	Armature { object: Option<ObjectId> },
	/// Procedural geometry generated by a node group from socket inputs.
	Nodes {
		group: String,
		inputs: BTreeMap<String, SocketValue>,
	},
	/// Any other host modifier, carried by type name only.
	Other { type_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Modifier {
	pub name: String,
	pub kind: ModifierKind,
}

impl Modifier {
	pub fn armature(name: impl Into<String>, object: Option<ObjectId>) -> Self {
		Self {
			name: name.into(),
			kind: ModifierKind::Armature { object },
		}
	}

	pub fn nodes(name: impl Into<String>, group: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind: ModifierKind::Nodes {
				group: group.into(),
				inputs: BTreeMap::new(),
			},
		}
	}

	pub fn is_armature(&self) -> bool {
		matches!(self.kind, ModifierKind::Armature { .. })
	}

	/// Host type identifier, as shown in error messages.
	pub fn type_name(&self) -> &str {
		match &self.kind {
			ModifierKind::Armature { .. } => "ARMATURE",
			ModifierKind::Nodes { .. } => "NODES",
			ModifierKind::Other { type_name } => type_name,
		}
	}
}

/// Pose-mode state of one bone of an armature object.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseBone {
	pub name: String,
	/// Proxy object drawn in place of the default bone shape.
	pub custom_shape: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
	pub name: String,
	pub data: ObjectData,
	pub parent: Option<ObjectId>,
	pub hide_viewport: bool,
	pub modifiers: Vec<Modifier>,
	pub material_slots: Vec<Option<MaterialId>>,
	pub pose: Vec<PoseBone>,
	pub mode: ObjectMode,
	pub selected: bool,
}

impl_data_block!(Object);

impl Object {
	pub fn new(name: impl Into<String>, data: ObjectData) -> Self {
		Self {
			name: name.into(),
			data,
			parent: None,
			hide_viewport: false,
			modifiers: Vec::new(),
			material_slots: Vec::new(),
			pose: Vec::new(),
			mode: ObjectMode::Object,
			selected: false,
		}
	}

	pub fn kind(&self) -> ObjectKind {
		self.data.kind()
	}

	pub fn mesh(&self) -> Option<MeshId> {
		match self.data {
			ObjectData::Mesh(mesh) => Some(mesh),
			_ => None,
		}
	}

	pub fn armature(&self) -> Option<ArmatureId> {
		match self.data {
			ObjectData::Armature(armature) => Some(armature),
			_ => None,
		}
	}

	pub fn modifier(&self, name: &str) -> Option<&Modifier> {
		self.modifiers.iter().find(|m| m.name == name)
	}

	pub fn modifier_mut(&mut self, name: &str) -> Option<&mut Modifier> {
		self.modifiers.iter_mut().find(|m| m.name == name)
	}

	/// The material of the first slot, if that slot holds one.
	pub fn primary_material(&self) -> Option<MaterialId> {
		self.material_slots.first().copied().flatten()
	}
}
