use std::collections::BTreeMap;

use glam::{vec4, Vec2, Vec3, Vec4};
use json::JsonValue;

use crate::scene::{Extension, Image, ImageSource, Interpolation, Mesh, ShaderNodeKind, SocketValue};

use super::json::{JsonError, JsonObject, SerialExtend};

pub type LibraryParseResult<T> = Result<T, LibraryParseError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LibraryParseError {
	#[error(transparent)]
	JsonError(#[from] JsonError),
	#[error("Unknown object type {0:?}")]
	UnknownObjectType(String),
	#[error("Unknown node type {0:?}")]
	UnknownNodeType(String),
	#[error("Unknown modifier type {0:?}")]
	UnknownModifierType(String),
	#[error("Unknown image source {0:?}")]
	UnknownImageSource(String),
	#[error("Unknown interpolation {0:?}")]
	UnknownInterpolation(String),
	#[error("Unknown extension {0:?}")]
	UnknownExtension(String),
	#[error("Socket value must hold exactly one of int, float, bool, menu, color or vector")]
	UnknownSocketValue,
	#[error("Expected a multiple of {stride} floats in list, got {len}")]
	BadFloatCount { stride: usize, len: usize },
	#[error("Expected a multiple of 3 loops, got {0}")]
	LoopsNotTriangles(usize),
	#[error("Loop refers to vertex {index}, but there are only {count} vertices")]
	LoopOutOfRange { index: u32, count: usize },
	#[error("UV layer {layer:?} has {got} coordinates for {expected} loops")]
	UvCountMismatch { layer: String, expected: usize, got: usize },
	#[error("Reference to unknown {kind} {name:?}")]
	UnknownReference { kind: &'static str, name: String },
}

impl LibraryParseError {
	pub fn nested(self, key: &str) -> Self {
		match self {
			LibraryParseError::JsonError(err) => LibraryParseError::JsonError(err.nested(key)),
			_ => self,
		}
	}
}

fn vals<T>(key: &str, res: LibraryParseResult<T>) -> LibraryParseResult<T> {
	res.map_err(|e| e.nested(key))
}

fn as_object<'file>(msg: &str, val: &'file JsonValue) -> LibraryParseResult<JsonObject<'file>> {
	if let Some(obj) = val.as_object() {
		Ok(JsonObject(obj))
	} else {
		Err(LibraryParseError::JsonError(JsonError::ValueIsNotObject(msg.to_owned())))
	}
}

/// Parses every element of a list of objects, nesting errors under `key[index]`.
fn deserialize_list<'file, T>(
	obj: JsonObject<'file>,
	key: &str,
	f: impl Fn(JsonObject<'file>) -> LibraryParseResult<T>,
) -> LibraryParseResult<Vec<T>> {
	let mut items = Vec::new();
	for (i, val) in obj.get_optional_list(key)?.iter().enumerate() {
		let item = as_object(&i.to_string(), val).and_then(&f);
		items.push(vals(&format!("{key}[{i}]"), item)?);
	}
	Ok(items)
}

// definitions

/// A library material, with images referenced by name.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDef {
	pub name: String,
	pub fake_user: bool,
	pub nodes: Vec<NodeDef>,
	pub links: Vec<LinkDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeDef {
	pub name: String,
	/// Image texture nodes are parsed with no image; see `image`.
	pub kind: ShaderNodeKind,
	pub image: Option<String>,
	pub inputs: BTreeMap<String, SocketValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDef {
	pub from: String,
	pub output: String,
	pub to: String,
	pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmatureDef {
	pub name: String,
	pub bones: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataRef {
	Empty,
	Mesh(String),
	Armature(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModifierDef {
	Armature {
		name: String,
		object: Option<String>,
	},
	Nodes {
		name: String,
		group: String,
		inputs: BTreeMap<String, SocketValue>,
	},
	Other {
		name: String,
		type_name: String,
	},
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDef {
	pub name: String,
	pub data: DataRef,
	pub parent: Option<String>,
	pub hidden: bool,
	pub materials: Vec<Option<String>>,
	pub modifiers: Vec<ModifierDef>,
	/// Bone name and custom shape object name.
	pub pose: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDef {
	pub name: String,
	pub exclude: bool,
	pub objects: Vec<String>,
	pub children: Vec<CollectionDef>,
}

impl CollectionDef {
	/// Finds a collection by name anywhere below (and including) `self`.
	pub fn find(&self, name: &str) -> Option<&CollectionDef> {
		let mut stack = vec![self];
		while let Some(def) = stack.pop() {
			if def.name == name {
				return Some(def);
			}
			stack.extend(def.children.iter().rev());
		}
		None
	}

	/// Names of the objects linked anywhere in the subtree.
	pub fn all_objects(&self) -> Vec<&str> {
		let mut names = Vec::new();
		let mut stack = vec![self];
		while let Some(def) = stack.pop() {
			names.extend(def.objects.iter().map(String::as_str));
			stack.extend(def.children.iter().rev());
		}
		names
	}
}

/// Contents of an asset library file.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryDocument {
	pub images: Vec<Image>,
	pub materials: Vec<MaterialDef>,
	pub meshes: Vec<Mesh>,
	pub armatures: Vec<ArmatureDef>,
	pub objects: Vec<ObjectDef>,
	pub collections: Vec<CollectionDef>,
}

impl LibraryDocument {
	pub fn from_json(payload: &JsonValue) -> LibraryParseResult<Self> {
		let obj = as_object("(library)", payload)?;

		Ok(Self {
			images: deserialize_list(obj, "images", deserialize_image)?,
			materials: deserialize_list(obj, "materials", deserialize_material)?,
			meshes: deserialize_list(obj, "meshes", deserialize_mesh)?,
			armatures: deserialize_list(obj, "armatures", deserialize_armature)?,
			objects: deserialize_list(obj, "objects", deserialize_object)?,
			collections: deserialize_list(obj, "collections", deserialize_collection)?,
		})
	}

	pub fn find_collection(&self, name: &str) -> Option<&CollectionDef> {
		self.collections.iter().find_map(|def| def.find(name))
	}

	pub fn object(&self, name: &str) -> Option<&ObjectDef> {
		self.objects.iter().find(|def| def.name == name)
	}
}

// socket values

fn deserialize_floats<const N: usize>(vals: &[JsonValue]) -> LibraryParseResult<[f32; N]> {
	if vals.len() != N {
		return Err(LibraryParseError::BadFloatCount {
			stride: N,
			len: vals.len(),
		});
	}
	let mut out = [0.0; N];
	for (i, val) in vals.iter().enumerate() {
		out[i] = val
			.as_f32()
			.ok_or_else(|| JsonError::ValueIsNotNumber(i.to_string()))?;
	}
	Ok(out)
}

fn deserialize_socket_value(obj: JsonObject) -> LibraryParseResult<SocketValue> {
	let mut entries = obj.iter();
	let (Some((kind, _)), None) = (entries.next(), entries.next()) else {
		return Err(LibraryParseError::UnknownSocketValue);
	};

	Ok(match kind {
		"int" => SocketValue::Int(obj.get_i32("int")?),
		"float" => SocketValue::Float(obj.get_f32("float")?),
		"bool" => SocketValue::Bool(obj.get_bool("bool")?),
		"menu" => SocketValue::Menu(obj.get_str("menu")?.to_owned()),
		"color" => {
			let [r, g, b, a] = vals("color", deserialize_floats(obj.get_list("color")?))?;
			SocketValue::Color(vec4(r, g, b, a))
		}
		"vector" => SocketValue::Vector(Vec3::from(vals(
			"vector",
			deserialize_floats::<3>(obj.get_list("vector")?),
		)?)),
		_ => return Err(LibraryParseError::UnknownSocketValue),
	})
}

fn deserialize_inputs(obj: JsonObject) -> LibraryParseResult<BTreeMap<String, SocketValue>> {
	let mut inputs = BTreeMap::new();
	if !obj.has("inputs") {
		return Ok(inputs);
	}
	for (socket, val) in obj.get_object("inputs")?.iter() {
		let value = as_object(socket, val).and_then(deserialize_socket_value);
		inputs.insert(socket.to_owned(), vals(socket, value).map_err(|e| e.nested("inputs"))?);
	}
	Ok(inputs)
}

// data-blocks

fn deserialize_image(obj: JsonObject) -> LibraryParseResult<Image> {
	let source = match obj.get_nullable_str("source")?.unwrap_or("generated") {
		"generated" => ImageSource::Generated,
		"file" => ImageSource::File,
		"tiled" => ImageSource::Tiled,
		other => return Err(LibraryParseError::UnknownImageSource(other.to_owned())),
	};

	let mut image = Image::new_generated(
		obj.get_str("name")?,
		obj.get_u32("width")?,
		obj.get_u32("height")?,
		obj.get_flag("alpha")?,
	);
	image.source = source;
	image.filepath = obj.get_nullable_str("filepath")?.map(Into::into);
	image.use_fake_user = obj.get_flag("fake_user")?;
	if obj.has("color") {
		let color = Vec4::from(vals("color", deserialize_floats::<4>(obj.get_list("color")?))?);
		let c = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
		let fill = image::Rgba([c.x as u8, c.y as u8, c.z as u8, c.w as u8]);
		image.pixels.pixels_mut().for_each(|p| *p = fill);
	}
	Ok(image)
}

fn deserialize_node(obj: JsonObject) -> LibraryParseResult<NodeDef> {
	let ty = obj.get_str("type")?;
	let kind = match ty {
		"UVMAP" => ShaderNodeKind::UvMap {
			uv_map: obj.get_nullable_str("uv_map")?.unwrap_or_default().to_owned(),
		},
		"TEX_IMAGE" => {
			let interpolation = match obj.get_nullable_str("interpolation")?.unwrap_or("Linear") {
				"Linear" => Interpolation::Linear,
				"Closest" => Interpolation::Closest,
				"Cubic" => Interpolation::Cubic,
				other => return Err(LibraryParseError::UnknownInterpolation(other.to_owned())),
			};
			let extension = match obj.get_nullable_str("extension")?.unwrap_or("REPEAT") {
				"REPEAT" => Extension::Repeat,
				"EXTEND" => Extension::Extend,
				"CLIP" => Extension::Clip,
				other => return Err(LibraryParseError::UnknownExtension(other.to_owned())),
			};
			ShaderNodeKind::TexImage {
				image: None,
				interpolation,
				extension,
			}
		}
		"BSDF_DIFFUSE" => ShaderNodeKind::BsdfDiffuse,
		"BSDF_TRANSPARENT" => ShaderNodeKind::BsdfTransparent,
		"BSDF_PRINCIPLED" => ShaderNodeKind::BsdfPrincipled,
		"MIX_SHADER" => ShaderNodeKind::MixShader,
		"OUTPUT_MATERIAL" => ShaderNodeKind::OutputMaterial,
		"GROUP" => ShaderNodeKind::Group {
			tree: obj.get_str("tree")?.to_owned(),
		},
		other => return Err(LibraryParseError::UnknownNodeType(other.to_owned())),
	};

	Ok(NodeDef {
		name: obj.get_str("name")?.to_owned(),
		kind,
		image: obj.get_nullable_str("image")?.map(str::to_owned),
		inputs: deserialize_inputs(obj)?,
	})
}

fn deserialize_link(obj: JsonObject) -> LibraryParseResult<LinkDef> {
	Ok(LinkDef {
		from: obj.get_str("from")?.to_owned(),
		output: obj.get_str("output")?.to_owned(),
		to: obj.get_str("to")?.to_owned(),
		input: obj.get_str("input")?.to_owned(),
	})
}

fn deserialize_material(obj: JsonObject) -> LibraryParseResult<MaterialDef> {
	Ok(MaterialDef {
		name: obj.get_str("name")?.to_owned(),
		fake_user: obj.get_flag("fake_user")?,
		nodes: deserialize_list(obj, "nodes", deserialize_node)?,
		links: deserialize_list(obj, "links", deserialize_link)?,
	})
}

fn deserialize_vecs<const N: usize, T: From<[f32; N]>>(floats: Vec<f32>) -> LibraryParseResult<Vec<T>> {
	if floats.len() % N != 0 {
		return Err(LibraryParseError::BadFloatCount {
			stride: N,
			len: floats.len(),
		});
	}
	Ok(floats
		.chunks_exact(N)
		.map(|chunk| {
			let mut array = [0.0; N];
			array.copy_from_slice(chunk);
			T::from(array)
		})
		.collect())
}

fn deserialize_mesh(obj: JsonObject) -> LibraryParseResult<Mesh> {
	let vertices: Vec<Vec3> = vals("vertices", deserialize_vecs::<3, _>(obj.get_f32s("vertices")?))?;
	let loops = obj.get_u32s("loops")?;
	if loops.len() % 3 != 0 {
		return Err(LibraryParseError::LoopsNotTriangles(loops.len()));
	}
	if let Some(&index) = loops.iter().find(|&&i| i as usize >= vertices.len()) {
		return Err(LibraryParseError::LoopOutOfRange {
			index,
			count: vertices.len(),
		});
	}
	let loop_count = loops.len();
	let mut mesh = Mesh::new(obj.get_str("name")?, vertices, loops);

	for (i, val) in obj.get_optional_list("uv_layers")?.iter().enumerate() {
		let layer = as_object(&i.to_string(), val)?;
		let name = layer.get_str("name")?;
		let uvs: Vec<Vec2> = vals("uv_layers", deserialize_vecs::<2, _>(layer.get_f32s("uvs")?))?;
		if uvs.len() != loop_count {
			return Err(LibraryParseError::UvCountMismatch {
				layer: name.to_owned(),
				expected: loop_count,
				got: uvs.len(),
			});
		}
		mesh.add_uv_layer(name, uvs);
	}
	if let Some(active) = obj.get_nullable_str("active_uv")? {
		if !mesh.set_active_uv_layer(active) {
			return Err(LibraryParseError::UnknownReference {
				kind: "UV layer",
				name: active.to_owned(),
			});
		}
	}
	Ok(mesh)
}

fn deserialize_armature(obj: JsonObject) -> LibraryParseResult<ArmatureDef> {
	let bones = obj.get_nullable_strs("bones")?;
	Ok(ArmatureDef {
		name: obj.get_str("name")?.to_owned(),
		bones: bones.into_iter().flatten().map(str::to_owned).collect(),
	})
}

fn deserialize_modifier(obj: JsonObject) -> LibraryParseResult<ModifierDef> {
	let name = obj.get_str("name")?.to_owned();
	Ok(match obj.get_str("type")? {
		"ARMATURE" => ModifierDef::Armature {
			name,
			object: obj.get_nullable_str("object")?.map(str::to_owned),
		},
		"NODES" => ModifierDef::Nodes {
			name,
			group: obj.get_str("group")?.to_owned(),
			inputs: deserialize_inputs(obj)?,
		},
		other if other.chars().all(|c| c.is_ascii_uppercase() || c == '_') => ModifierDef::Other {
			name,
			type_name: other.to_owned(),
		},
		other => return Err(LibraryParseError::UnknownModifierType(other.to_owned())),
	})
}

fn deserialize_object(obj: JsonObject) -> LibraryParseResult<ObjectDef> {
	let data = match obj.get_str("type")? {
		"EMPTY" => DataRef::Empty,
		"MESH" => DataRef::Mesh(obj.get_str("data")?.to_owned()),
		"ARMATURE" => DataRef::Armature(obj.get_str("data")?.to_owned()),
		other => return Err(LibraryParseError::UnknownObjectType(other.to_owned())),
	};

	let mut pose = Vec::new();
	for (i, val) in obj.get_optional_list("pose")?.iter().enumerate() {
		let bone = vals("pose", as_object(&i.to_string(), val))?;
		pose.push((
			bone.get_str("bone")?.to_owned(),
			bone.get_nullable_str("custom_shape")?.map(str::to_owned),
		));
	}

	let materials = if obj.has("materials") {
		obj.get_nullable_strs("materials")?
	} else {
		Vec::new()
	};

	Ok(ObjectDef {
		name: obj.get_str("name")?.to_owned(),
		data,
		parent: obj.get_nullable_str("parent")?.map(str::to_owned),
		hidden: obj.get_flag("hidden")?,
		materials: materials.into_iter().map(|m| m.map(str::to_owned)).collect(),
		modifiers: deserialize_list(obj, "modifiers", deserialize_modifier)?,
		pose,
	})
}

fn deserialize_collection(obj: JsonObject) -> LibraryParseResult<CollectionDef> {
	let objects = if obj.has("objects") {
		obj.get_nullable_strs("objects")?
	} else {
		Vec::new()
	};

	Ok(CollectionDef {
		name: obj.get_str("name")?.to_owned(),
		exclude: obj.get_flag("exclude")?,
		objects: objects.into_iter().flatten().map(str::to_owned).collect(),
		children: deserialize_list(obj, "children", deserialize_collection)?,
	})
}

#[cfg(test)]
mod tests {
	use glam::vec2;

	use super::*;

	fn parse(src: &str) -> LibraryParseResult<LibraryDocument> {
		LibraryDocument::from_json(&json::parse(src).unwrap())
	}

	#[test]
	fn parses_objects_and_nested_collections() {
		let doc = parse(
			r#"{
				"meshes": [{
					"name": "Body", "vertices": [0, 0, 0, 1, 0, 0, 0, 1, 0], "loops": [0, 1, 2],
					"uv_layers": [{"name": "UVMap", "uvs": [1, 0, 2, 0, 1, 1]}]
				}],
				"objects": [{
					"name": "CharCust_1", "type": "MESH", "data": "Body", "parent": "CharRig",
					"materials": ["Skin", null],
					"modifiers": [{"name": "GeometryNodes", "type": "NODES", "group": "HyChar",
						"inputs": {"Socket_2": {"int": 1}, "Socket_3": {"color": [1, 0, 0, 1]}}}]
				}],
				"collections": [{"name": "Root", "children": [{"name": "WGTS", "exclude": true}]}]
			}"#,
		)
		.unwrap();

		let mesh = &doc.meshes[0];
		assert_eq!(mesh.triangle_count(), 1);
		assert_eq!(mesh.active_uv_layer().unwrap().uvs[1], vec2(2.0, 0.0));

		let object = doc.object("CharCust_1").unwrap();
		assert_eq!(object.data, DataRef::Mesh("Body".to_owned()));
		assert_eq!(object.materials, vec![Some("Skin".to_owned()), None]);
		let ModifierDef::Nodes { inputs, .. } = &object.modifiers[0] else {
			panic!("expected a nodes modifier");
		};
		assert_eq!(inputs["Socket_2"], SocketValue::Int(1));
		assert_eq!(inputs["Socket_3"], SocketValue::Color(vec4(1.0, 0.0, 0.0, 1.0)));

		let wgts = doc.find_collection("WGTS").unwrap();
		assert!(wgts.exclude);
		assert!(doc.find_collection("Missing").is_none());
	}

	#[test]
	fn errors_point_at_the_offending_item() {
		let err = parse(r#"{"objects": [{"name": "A", "type": "EMPTY"}, {"name": "B", "type": "LIGHT"}]}"#).unwrap_err();
		assert_eq!(err, LibraryParseError::UnknownObjectType("LIGHT".to_owned()));

		let err = parse(r#"{"objects": [{"type": "EMPTY"}]}"#).unwrap_err();
		assert_eq!(
			err,
			LibraryParseError::JsonError(JsonError::KeyDoesNotExist("name".to_owned()).nested("objects[0]"))
		);
	}

	#[test]
	fn mesh_validation() {
		let err = parse(r#"{"meshes": [{"name": "M", "vertices": [0, 0, 0], "loops": [0, 0, 1]}]}"#).unwrap_err();
		assert_eq!(err, LibraryParseError::LoopOutOfRange { index: 1, count: 1 });

		let err = parse(
			r#"{"meshes": [{"name": "M", "vertices": [0, 0, 0], "loops": [0, 0, 0],
				"uv_layers": [{"name": "UVMap", "uvs": [0, 0]}]}]}"#,
		)
		.unwrap_err();
		assert_eq!(
			err,
			LibraryParseError::UvCountMismatch {
				layer: "UVMap".to_owned(),
				expected: 3,
				got: 1
			}
		);
	}

	#[test]
	fn socket_values_need_exactly_one_kind() {
		let err = parse(
			r#"{"materials": [{"name": "Skin", "nodes": [{"name": "G", "type": "GROUP", "tree": "HySkin01",
				"inputs": {"Skintone": {"int": 1, "float": 2}}}]}]}"#,
		)
		.unwrap_err();
		assert_eq!(err, LibraryParseError::UnknownSocketValue);
	}
}
