//! Name-based resolution of scene entities and socket values.
//!
//! Every lookup says why it came back empty instead of falling back to a zero value.

use std::fmt;

use crate::scene::{MaterialId, ModifierKind, ObjectId, Scene, SocketValue, ValueKind};

/// What a lookup could not find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
	Object(String),
	Modifier { object: String, modifier: String },
	Material { object: String, name: String },
	Node { material: String, node: String },
	Socket { owner: String, socket: String },
}

impl fmt::Display for Missing {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Missing::Object(name) => write!(f, "no object {name:?}"),
			Missing::Modifier { object, modifier } => write!(f, "object {object:?} has no modifier {modifier:?}"),
			Missing::Material { object, name } => write!(f, "object {object:?} has no material {name:?}"),
			Missing::Node { material, node } => write!(f, "material {material:?} has no node {node:?}"),
			Missing::Socket { owner, socket } => write!(f, "{owner:?} has no input {socket:?}"),
		}
	}
}

/// Outcome of a typed lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
	Found(T),
	NotFound(Missing),
	WrongType { expected: ValueKind, found: ValueKind },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
	#[error("Lookup failed: {0}")]
	NotFound(Missing),
	#[error("Expected a {expected} value, found a {found} value")]
	WrongType { expected: ValueKind, found: ValueKind },
}

impl<T> Lookup<T> {
	pub fn found(self) -> Option<T> {
		match self {
			Lookup::Found(value) => Some(value),
			_ => None,
		}
	}

	pub fn is_found(&self) -> bool {
		matches!(self, Lookup::Found(_))
	}

	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
		self.and_then(|value| Lookup::Found(f(value)))
	}

	pub fn and_then<U>(self, f: impl FnOnce(T) -> Lookup<U>) -> Lookup<U> {
		match self {
			Lookup::Found(value) => f(value),
			Lookup::NotFound(missing) => Lookup::NotFound(missing),
			Lookup::WrongType { expected, found } => Lookup::WrongType { expected, found },
		}
	}

	pub fn into_result(self) -> Result<T, LookupError> {
		match self {
			Lookup::Found(value) => Ok(value),
			Lookup::NotFound(missing) => Err(LookupError::NotFound(missing)),
			Lookup::WrongType { expected, found } => Err(LookupError::WrongType { expected, found }),
		}
	}
}

impl<'a> Lookup<&'a SocketValue> {
	/// Keeps the value only if it is of the `expected` kind.
	pub fn of_kind(self, expected: ValueKind) -> Self {
		self.and_then(|value| match value.kind() {
			found if found == expected => Lookup::Found(value),
			found => Lookup::WrongType { expected, found },
		})
	}

	pub fn int(self) -> Lookup<i32> {
		self.and_then(|value| match value {
			SocketValue::Int(v) => Lookup::Found(*v),
			other => Lookup::WrongType {
				expected: ValueKind::Int,
				found: other.kind(),
			},
		})
	}

	/// The selected item of a menu socket.
	pub fn menu(self) -> Lookup<&'a str> {
		self.and_then(|value| match value {
			SocketValue::Menu(item) => Lookup::Found(item.as_str()),
			other => Lookup::WrongType {
				expected: ValueKind::Menu,
				found: other.kind(),
			},
		})
	}
}

fn found_or<T>(value: Option<T>, missing: impl FnOnce() -> Missing) -> Lookup<T> {
	match value {
		Some(value) => Lookup::Found(value),
		None => Lookup::NotFound(missing()),
	}
}

/// Object with exactly this name.
pub fn object_by_name(scene: &Scene, name: &str) -> Lookup<ObjectId> {
	found_or(scene.objects.find(name), || Missing::Object(name.to_owned()))
}

/// The alphabetically first object whose name starts with `prefix`.
pub fn object_by_prefix(scene: &Scene, prefix: &str) -> Lookup<ObjectId> {
	found_or(scene.objects.find_by_prefix(prefix), || Missing::Object(format!("{prefix}*")))
}

/// An input socket of a procedural node modifier.
pub fn modifier_socket<'s>(scene: &'s Scene, object: ObjectId, modifier: &str, socket: &str) -> Lookup<&'s SocketValue> {
	let Ok(obj) = scene.object(object) else {
		return Lookup::NotFound(Missing::Object(format!("{object:?}")));
	};
	let inputs = match obj.modifier(modifier).map(|m| &m.kind) {
		Some(ModifierKind::Nodes { inputs, .. }) => inputs,
		_ => {
			return Lookup::NotFound(Missing::Modifier {
				object: obj.name.clone(),
				modifier: modifier.to_owned(),
			})
		}
	};
	found_or(inputs.get(socket), || Missing::Socket {
		owner: modifier.to_owned(),
		socket: socket.to_owned(),
	})
}

/// Material of the object's first slot whose material name starts with `prefix`.
pub fn material_by_prefix(scene: &Scene, object: ObjectId, prefix: &str) -> Lookup<MaterialId> {
	material_where(scene, object, prefix, |name| name.starts_with(prefix))
}

/// Material of the object's slot holding the material named `name`.
pub fn material_by_name(scene: &Scene, object: ObjectId, name: &str) -> Lookup<MaterialId> {
	material_where(scene, object, name, |material| material == name)
}

fn material_where(scene: &Scene, object: ObjectId, wanted: &str, matches: impl Fn(&str) -> bool) -> Lookup<MaterialId> {
	let Ok(obj) = scene.object(object) else {
		return Lookup::NotFound(Missing::Object(format!("{object:?}")));
	};
	let slot = (obj.material_slots.iter().flatten()).find(|&&id| scene.materials.get(id).is_some_and(|m| matches(&m.name)));
	found_or(slot.copied(), || Missing::Material {
		object: obj.name.clone(),
		name: wanted.to_owned(),
	})
}

/// An unlinked input value of a named node in a material's node tree.
pub fn node_socket<'s>(scene: &'s Scene, material: MaterialId, node: &str, socket: &str) -> Lookup<&'s SocketValue> {
	let Ok(mat) = scene.material(material) else {
		return Lookup::NotFound(Missing::Material {
			object: String::new(),
			name: format!("{material:?}"),
		});
	};
	let Some(shader_node) = mat.node_tree.by_name(node) else {
		return Lookup::NotFound(Missing::Node {
			material: mat.name.clone(),
			node: node.to_owned(),
		});
	};
	found_or(shader_node.inputs.get(socket), || Missing::Socket {
		owner: node.to_owned(),
		socket: socket.to_owned(),
	})
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::testing::character_scene;

	#[test]
	fn prefix_lookup_finds_meshes() {
		let fx = character_scene();
		assert_eq!(object_by_prefix(&fx.scene, "CharCust_1"), Lookup::Found(fx.body));
		assert_eq!(object_by_name(&fx.scene, "CharRig"), Lookup::Found(fx.rig));
		assert_eq!(
			object_by_name(&fx.scene, "Nope"),
			Lookup::NotFound(Missing::Object("Nope".to_owned()))
		);
	}

	#[test]
	fn modifier_sockets_are_typed() {
		let fx = character_scene();
		let scene = &fx.scene;

		assert_eq!(modifier_socket(scene, fx.body, "GeometryNodes", "Socket_2").int(), Lookup::Found(1));
		assert_eq!(
			modifier_socket(scene, fx.body, "GeometryNodes", "Socket_2").menu(),
			Lookup::WrongType {
				expected: ValueKind::Menu,
				found: ValueKind::Int
			}
		);
		assert_eq!(
			modifier_socket(scene, fx.body, "Armature", "Socket_2"),
			Lookup::NotFound(Missing::Modifier {
				object: "CharCust_1".to_owned(),
				modifier: "Armature".to_owned()
			})
		);
		assert!(!modifier_socket(scene, fx.body, "GeometryNodes", "Socket_999").is_found());
	}

	#[test]
	fn material_prefix_takes_first_matching_slot() {
		let fx = character_scene();
		let scene = &fx.scene;

		// "Skin" also prefixes "Skin 2", the first slot wins
		let skin = material_by_prefix(scene, fx.body, "Skin").found().unwrap();
		assert_eq!(scene.material(skin).unwrap().name, "Skin");
		let skin2 = material_by_prefix(scene, fx.body, "Skin 2").found().unwrap();
		assert_eq!(scene.material(skin2).unwrap().name, "Skin 2");

		assert_eq!(
			node_socket(scene, skin2, "HySkin02", "Socket_50").menu(),
			Lookup::Found("Jean Generic")
		);
		assert!(matches!(
			node_socket(scene, skin, "HySkin99", "Skintone"),
			Lookup::NotFound(Missing::Node { .. })
		));
		assert!(material_by_name(scene, fx.accessories, "Earrings").is_found());
		assert!(!material_by_name(scene, fx.body, "Earrings").is_found());
	}

	#[test]
	fn into_result_keeps_reason() {
		let err = Lookup::<i32>::NotFound(Missing::Socket {
			owner: "HySkin01".to_owned(),
			socket: "Ears".to_owned(),
		})
		.into_result()
		.unwrap_err();
		assert_eq!(err.to_string(), "Lookup failed: \"HySkin01\" has no input \"Ears\"");
	}
}
