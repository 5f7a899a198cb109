use std::collections::BTreeMap;

use glam::vec4;

use super::store::impl_data_block;
use super::{ImageId, SocketValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

/// Texture filtering of an image texture node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
	#[default]
	Linear,
	Closest,
	Cubic,
}

/// Behaviour of an image texture node outside the unit square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extension {
	#[default]
	Repeat,
	Extend,
	Clip,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShaderNodeKind {
	UvMap {
		uv_map: String,
	},
	TexImage {
		image: Option<ImageId>,
		interpolation: Interpolation,
		extension: Extension,
	},
	BsdfDiffuse,
	BsdfTransparent,
	BsdfPrincipled,
	MixShader,
	OutputMaterial,
	/// Instance of a node group. Its sockets are whatever inputs the node declares.
	Group {
		tree: String,
	},
}

impl ShaderNodeKind {
	pub fn tex_image(image: Option<ImageId>) -> Self {
		ShaderNodeKind::TexImage {
			image,
			interpolation: Interpolation::default(),
			extension: Extension::default(),
		}
	}

	/// Host type identifier.
	pub fn type_name(&self) -> &'static str {
		match self {
			ShaderNodeKind::UvMap { .. } => "UVMAP",
			ShaderNodeKind::TexImage { .. } => "TEX_IMAGE",
			ShaderNodeKind::BsdfDiffuse => "BSDF_DIFFUSE",
			ShaderNodeKind::BsdfTransparent => "BSDF_TRANSPARENT",
			ShaderNodeKind::BsdfPrincipled => "BSDF_PRINCIPLED",
			ShaderNodeKind::MixShader => "MIX_SHADER",
			ShaderNodeKind::OutputMaterial => "OUTPUT_MATERIAL",
			ShaderNodeKind::Group { .. } => "GROUP",
		}
	}

	fn default_name(&self) -> &'static str {
		match self {
			ShaderNodeKind::UvMap { .. } => "UV Map",
			ShaderNodeKind::TexImage { .. } => "Image Texture",
			ShaderNodeKind::BsdfDiffuse => "Diffuse BSDF",
			ShaderNodeKind::BsdfTransparent => "Transparent BSDF",
			ShaderNodeKind::BsdfPrincipled => "Principled BSDF",
			ShaderNodeKind::MixShader => "Mix Shader",
			ShaderNodeKind::OutputMaterial => "Material Output",
			ShaderNodeKind::Group { .. } => "Group",
		}
	}

	/// Fixed input sockets of built-in nodes. `None` for groups.
	fn builtin_inputs(&self) -> Option<&'static [&'static str]> {
		Some(match self {
			ShaderNodeKind::UvMap { .. } => &[],
			ShaderNodeKind::TexImage { .. } => &["Vector"],
			ShaderNodeKind::BsdfDiffuse => &["Color", "Roughness", "Normal"],
			ShaderNodeKind::BsdfTransparent => &["Color"],
			ShaderNodeKind::BsdfPrincipled => &["Base Color", "Roughness", "Alpha", "Normal"],
			ShaderNodeKind::MixShader => &["Fac", "Shader", "Shader_001"],
			ShaderNodeKind::OutputMaterial => &["Surface", "Volume", "Displacement"],
			ShaderNodeKind::Group { .. } => return None,
		})
	}

	/// Fixed output sockets of built-in nodes. `None` for groups.
	fn builtin_outputs(&self) -> Option<&'static [&'static str]> {
		Some(match self {
			ShaderNodeKind::UvMap { .. } => &["UV"],
			ShaderNodeKind::TexImage { .. } => &["Color", "Alpha"],
			ShaderNodeKind::BsdfDiffuse | ShaderNodeKind::BsdfTransparent | ShaderNodeKind::BsdfPrincipled => &["BSDF"],
			ShaderNodeKind::MixShader => &["Shader"],
			ShaderNodeKind::OutputMaterial => &[],
			ShaderNodeKind::Group { .. } => return None,
		})
	}

	fn default_inputs(&self) -> BTreeMap<String, SocketValue> {
		let grey = SocketValue::Color(vec4(0.8, 0.8, 0.8, 1.0));
		let values: Vec<(&str, SocketValue)> = match self {
			ShaderNodeKind::BsdfDiffuse => vec![("Color", grey), ("Roughness", SocketValue::Float(0.0))],
			ShaderNodeKind::BsdfTransparent => vec![("Color", SocketValue::Color(glam::Vec4::ONE))],
			ShaderNodeKind::BsdfPrincipled => vec![
				("Base Color", grey),
				("Roughness", SocketValue::Float(0.5)),
				("Alpha", SocketValue::Float(1.0)),
			],
			ShaderNodeKind::MixShader => vec![("Fac", SocketValue::Float(0.5))],
			_ => Vec::new(),
		};
		values.into_iter().map(|(k, v)| (k.to_owned(), v)).collect()
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderNode {
	pub id: NodeId,
	pub name: String,
	pub kind: ShaderNodeKind,
	/// Unlinked input values.
	pub inputs: BTreeMap<String, SocketValue>,
}

impl ShaderNode {
	pub fn has_input(&self, socket: &str) -> bool {
		match self.kind.builtin_inputs() {
			Some(sockets) => sockets.contains(&socket),
			None => self.inputs.contains_key(socket),
		}
	}

	/// Group nodes expose whatever outputs their tree has, which is not tracked here.
	pub fn has_output(&self, socket: &str) -> bool {
		match self.kind.builtin_outputs() {
			Some(sockets) => sockets.contains(&socket),
			None => true,
		}
	}

	pub fn image(&self) -> Option<ImageId> {
		match self.kind {
			ShaderNodeKind::TexImage { image, .. } => image,
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLink {
	pub from_node: NodeId,
	pub from_socket: String,
	pub to_node: NodeId,
	pub to_socket: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeTreeError {
	#[error("No node {0:?} in tree")]
	NoSuchNode(NodeId),
	#[error("Node {node:?} has no output socket {socket:?}")]
	NoSuchOutput { node: String, socket: String },
	#[error("Node {node:?} has no input socket {socket:?}")]
	NoSuchInput { node: String, socket: String },
}

/// Shading graph of a material.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeTree {
	nodes: Vec<ShaderNode>,
	links: Vec<NodeLink>,
	active: Option<NodeId>,
	next_id: u32,
}

impl NodeTree {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a node under its kind's default name.
	pub fn add(&mut self, kind: ShaderNodeKind) -> NodeId {
		let name = kind.default_name();
		self.add_named(name, kind)
	}

	/// Adds a node, renaming it to `name.NNN` if the name is taken.
	pub fn add_named(&mut self, name: &str, kind: ShaderNodeKind) -> NodeId {
		let mut unique = name.to_owned();
		let mut n = 1;
		while self.by_name(&unique).is_some() {
			unique = crate::naming::numbered(name, n);
			n += 1;
		}

		let id = NodeId(self.next_id);
		self.next_id += 1;
		self.nodes.push(ShaderNode {
			id,
			name: unique,
			inputs: kind.default_inputs(),
			kind,
		});
		id
	}

	pub fn get(&self, id: NodeId) -> Option<&ShaderNode> {
		self.nodes.iter().find(|node| node.id == id)
	}

	pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ShaderNode> {
		self.nodes.iter_mut().find(|node| node.id == id)
	}

	pub fn by_name(&self, name: &str) -> Option<&ShaderNode> {
		self.nodes.iter().find(|node| node.name == name)
	}

	pub fn by_name_mut(&mut self, name: &str) -> Option<&mut ShaderNode> {
		self.nodes.iter_mut().find(|node| node.name == name)
	}

	pub fn nodes(&self) -> impl Iterator<Item = &ShaderNode> {
		self.nodes.iter()
	}

	pub fn links(&self) -> &[NodeLink] {
		&self.links
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Removes a node together with every link touching it.
	pub fn remove(&mut self, id: NodeId) -> Option<ShaderNode> {
		let index = self.nodes.iter().position(|node| node.id == id)?;
		self.links.retain(|link| link.from_node != id && link.to_node != id);
		if self.active == Some(id) {
			self.active = None;
		}
		Some(self.nodes.remove(index))
	}

	/// Connects an output to an input, replacing whatever was linked into that input.
	pub fn link(&mut self, from: NodeId, from_socket: &str, to: NodeId, to_socket: &str) -> Result<(), NodeTreeError> {
		let from_node = self.get(from).ok_or(NodeTreeError::NoSuchNode(from))?;
		if !from_node.has_output(from_socket) {
			return Err(NodeTreeError::NoSuchOutput {
				node: from_node.name.clone(),
				socket: from_socket.to_owned(),
			});
		}
		let to_node = self.get(to).ok_or(NodeTreeError::NoSuchNode(to))?;
		if !to_node.has_input(to_socket) {
			return Err(NodeTreeError::NoSuchInput {
				node: to_node.name.clone(),
				socket: to_socket.to_owned(),
			});
		}

		self.links.retain(|link| !(link.to_node == to && link.to_socket == to_socket));
		self.links.push(NodeLink {
			from_node: from,
			from_socket: from_socket.to_owned(),
			to_node: to,
			to_socket: to_socket.to_owned(),
		});
		Ok(())
	}

	/// The link feeding an input, if any.
	pub fn link_into(&self, to: NodeId, to_socket: &str) -> Option<&NodeLink> {
		self.links.iter().find(|link| link.to_node == to && link.to_socket == to_socket)
	}

	pub fn active(&self) -> Option<NodeId> {
		self.active
	}

	pub fn set_active(&mut self, id: NodeId) -> Result<(), NodeTreeError> {
		self.get(id).ok_or(NodeTreeError::NoSuchNode(id))?;
		self.active = Some(id);
		Ok(())
	}

	/// First material output node, if the tree has one.
	pub fn output_node(&self) -> Option<NodeId> {
		(self.nodes.iter())
			.find(|node| node.kind == ShaderNodeKind::OutputMaterial)
			.map(|node| node.id)
	}

	/// Number of image texture nodes sampling `image`.
	pub fn image_users(&self, image: ImageId) -> usize {
		self.nodes.iter().filter(|node| node.image() == Some(image)).count()
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
	pub name: String,
	pub use_nodes: bool,
	/// Keeps the material alive through orphan purges.
	pub use_fake_user: bool,
	pub node_tree: NodeTree,
}

impl_data_block!(Material);

impl Material {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			use_nodes: false,
			use_fake_user: false,
			node_tree: NodeTree::new(),
		}
	}
}
