//! The bundled asset library and appending the character from it.

mod json;
mod payload;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::{fs, io};

use tracing::{debug, info};

use crate::config::Config;
use crate::scene::{
	Armature, ArmatureId, CollectionId, ImageId, Material, MaterialId, MeshId, Modifier, ModifierKind, Object,
	ObjectData, ObjectId, PoseBone, Scene, SceneError, ShaderNodeKind,
};

pub use self::json::JsonError;
pub use payload::{
	ArmatureDef, CollectionDef, DataRef, LibraryDocument, LibraryParseError, LinkDef, MaterialDef, ModifierDef,
	NodeDef, ObjectDef,
};

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
	#[error("Library file not found at {0}")]
	LibraryMissing(PathBuf),
	#[error("Could not read library file")]
	Io(#[from] io::Error),
	#[error("Library file is not valid JSON")]
	JsonParse(#[from] ::json::Error),
	#[error("Could not parse library file\n  - {0}")]
	Parse(#[from] LibraryParseError),
	#[error("Collection {0:?} is not in the library")]
	CollectionNotInLibrary(String),
	#[error(transparent)]
	Scene(#[from] SceneError),
}

/// Reads and parses a library file.
pub fn load_library(path: &std::path::Path) -> Result<LibraryDocument, SpawnError> {
	if !path.is_file() {
		return Err(SpawnError::LibraryMissing(path.to_owned()));
	}
	let text = fs::read_to_string(path)?;
	let payload = ::json::parse(&text)?;
	Ok(LibraryDocument::from_json(&payload)?)
}

/// Everything one collection of the library pulls in, by library name.
struct AppendSet<'doc> {
	objects: Vec<&'doc ObjectDef>,
	meshes: HashSet<&'doc str>,
	armatures: HashSet<&'doc str>,
	materials: HashSet<&'doc str>,
	images: HashSet<&'doc str>,
}

fn missing(kind: &'static str, name: &str) -> LibraryParseError {
	LibraryParseError::UnknownReference {
		kind,
		name: name.to_owned(),
	}
}

/// Collects the objects linked in `collection` together with everything they reference,
/// failing on dangling references before anything is appended.
fn resolve<'doc>(doc: &'doc LibraryDocument, collection: &'doc CollectionDef) -> Result<AppendSet<'doc>, LibraryParseError> {
	let mut set = AppendSet {
		objects: Vec::new(),
		meshes: HashSet::new(),
		armatures: HashSet::new(),
		materials: HashSet::new(),
		images: HashSet::new(),
	};

	let mut seen = HashSet::new();
	let mut queue: Vec<&str> = collection.all_objects();
	queue.reverse();
	while let Some(name) = queue.pop() {
		if !seen.insert(name) {
			continue;
		}
		let def = doc.object(name).ok_or_else(|| missing("object", name))?;
		set.objects.push(def);

		match &def.data {
			DataRef::Empty => {}
			DataRef::Mesh(mesh) => {
				doc.meshes.iter().find(|m| &m.name == mesh).ok_or_else(|| missing("mesh", mesh))?;
				set.meshes.insert(mesh);
			}
			DataRef::Armature(armature) => {
				doc.armatures.iter().find(|a| &a.name == armature).ok_or_else(|| missing("armature", armature))?;
				set.armatures.insert(armature);
			}
		}
		set.materials.extend(def.materials.iter().flatten().map(String::as_str));

		// referenced objects come along even when no collection links them
		let armature_targets = def.modifiers.iter().filter_map(|m| match m {
			ModifierDef::Armature { object, .. } => object.as_deref(),
			_ => None,
		});
		let custom_shapes = def.pose.iter().filter_map(|(_, shape)| shape.as_deref());
		queue.extend(def.parent.as_deref().into_iter().chain(armature_targets).chain(custom_shapes));
	}

	for name in &set.materials {
		let material = doc.materials.iter().find(|m| m.name == *name).ok_or_else(|| missing("material", name))?;
		for node in &material.nodes {
			if let Some(image) = &node.image {
				doc.images.iter().find(|i| &i.name == image).ok_or_else(|| missing("image", image))?;
				set.images.insert(image);
			}
		}
		for link in &material.links {
			for end in [&link.from, &link.to] {
				if !material.nodes.iter().any(|n| &n.name == end) {
					return Err(missing("node", end));
				}
			}
		}
	}
	Ok(set)
}

fn append_material(scene: &mut Scene, def: &MaterialDef, images: &HashMap<&str, ImageId>) -> Result<MaterialId, SceneError> {
	let mut material = Material::new(def.name.clone());
	material.use_nodes = true;
	material.use_fake_user = def.fake_user;

	let mut nodes = HashMap::new();
	for node_def in &def.nodes {
		let mut kind = node_def.kind.clone();
		if let ShaderNodeKind::TexImage { image, .. } = &mut kind {
			*image = node_def.image.as_deref().and_then(|name| images.get(name)).copied();
		}
		let id = material.node_tree.add_named(&node_def.name, kind);
		if let Some(node) = material.node_tree.get_mut(id) {
			node.inputs.extend(node_def.inputs.clone());
		}
		nodes.insert(node_def.name.as_str(), id);
	}
	for link in &def.links {
		if let (Some(&from), Some(&to)) = (nodes.get(link.from.as_str()), nodes.get(link.to.as_str())) {
			if let Err(e) = material.node_tree.link(from, &link.output, to, &link.input) {
				tracing::warn!("Skipping link in material {:?}: {e}", def.name);
			}
		}
	}
	Ok(scene.materials.insert(material))
}

/// Appends every data-block the set needs. Library names map to the (possibly renamed) scene ids.
fn append_data(scene: &mut Scene, doc: &LibraryDocument, set: &AppendSet) -> Result<HashMap<String, ObjectId>, SceneError> {
	let mut images = HashMap::new();
	for image in doc.images.iter().filter(|i| set.images.contains(i.name.as_str())) {
		images.insert(image.name.as_str(), scene.images.insert(image.clone()));
	}

	let mut materials: HashMap<&str, MaterialId> = HashMap::new();
	for def in doc.materials.iter().filter(|m| set.materials.contains(m.name.as_str())) {
		materials.insert(def.name.as_str(), append_material(scene, def, &images)?);
	}

	let mut meshes: HashMap<&str, MeshId> = HashMap::new();
	for mesh in doc.meshes.iter().filter(|m| set.meshes.contains(m.name.as_str())) {
		meshes.insert(mesh.name.as_str(), scene.meshes.insert(mesh.clone()));
	}

	let mut armatures: HashMap<&str, ArmatureId> = HashMap::new();
	for def in doc.armatures.iter().filter(|a| set.armatures.contains(a.name.as_str())) {
		let armature = Armature::new(def.name.clone(), def.bones.clone());
		armatures.insert(def.name.as_str(), scene.armatures.insert(armature));
	}

	// objects first, then the references between them
	let mut objects: HashMap<String, ObjectId> = HashMap::new();
	for def in &set.objects {
		let data = match &def.data {
			DataRef::Mesh(name) => meshes.get(name.as_str()).copied().map(ObjectData::Mesh),
			DataRef::Armature(name) => armatures.get(name.as_str()).copied().map(ObjectData::Armature),
			DataRef::Empty => None,
		};
		let mut object = Object::new(def.name.clone(), data.unwrap_or(ObjectData::Empty));
		object.hide_viewport = def.hidden;
		object.material_slots = (def.materials.iter())
			.map(|slot| slot.as_deref().and_then(|name| materials.get(name)).copied())
			.collect();
		objects.insert(def.name.clone(), scene.objects.insert(object));
	}

	for def in &set.objects {
		let lookup = |name: &Option<String>| name.as_deref().and_then(|n| objects.get(n)).copied();
		let Some(&id) = objects.get(&def.name) else {
			continue;
		};
		let object = scene.object_mut(id)?;
		object.parent = lookup(&def.parent);
		object.modifiers = (def.modifiers.iter())
			.map(|modifier| match modifier {
				ModifierDef::Armature { name, object } => Modifier::armature(name.clone(), lookup(object)),
				ModifierDef::Nodes { name, group, inputs } => Modifier {
					name: name.clone(),
					kind: ModifierKind::Nodes {
						group: group.clone(),
						inputs: inputs.clone(),
					},
				},
				ModifierDef::Other { name, type_name } => Modifier {
					name: name.clone(),
					kind: ModifierKind::Other {
						type_name: type_name.clone(),
					},
				},
			})
			.collect();
		object.pose = (def.pose.iter())
			.map(|(bone, shape)| PoseBone {
				name: bone.clone(),
				custom_shape: lookup(shape),
			})
			.collect();
	}
	Ok(objects)
}

/// Appends the configured character collection from the asset library and links it into the scene.
///
/// Nothing is appended if the library is missing, unreadable or does not hold a complete collection.
pub fn spawn_character(scene: &mut Scene, config: &Config) -> Result<CollectionId, SpawnError> {
	let path = config.resolved_library_path();
	let doc = load_library(&path)?;
	spawn_from(scene, &doc, &config.source_collection)
}

/// Appends the named collection of an already loaded library.
pub fn spawn_from(scene: &mut Scene, doc: &LibraryDocument, collection: &str) -> Result<CollectionId, SpawnError> {
	let root_def = doc
		.find_collection(collection)
		.ok_or_else(|| SpawnError::CollectionNotInLibrary(collection.to_owned()))?;
	let set = resolve(doc, root_def)?;

	let objects = append_data(scene, doc, &set)?;

	let root = scene.collections.create(&root_def.name, Some(scene.collections.root()))?;
	let mut stack = vec![(root_def, root)];
	while let Some((def, id)) = stack.pop() {
		if let Some(created) = scene.collections.get_mut(id) {
			created.exclude = def.exclude;
		}
		for name in &def.objects {
			if let Some(&object) = objects.get(name) {
				scene.collections.link_object(id, object)?;
			}
		}
		for child in &def.children {
			let child_id = scene.collections.create(&child.name, Some(id))?;
			stack.push((child, child_id));
		}
	}

	info!(
		"Spawned {collection:?}: {} objects, {} materials",
		set.objects.len(),
		set.materials.len()
	);
	debug!("Scene after spawn:\n{scene}");
	Ok(root)
}
