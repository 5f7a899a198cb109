//! Parameters of the customizer panel and where their values live.
//!
//! Drawing is up to the host UI. This module says which parameters exist, which ones a
//! selector reveals, and reads and writes their values through [`crate::lookup`].

use std::fmt;

use tracing::debug;

use crate::config::Config;
use crate::lookup::{self, Lookup, LookupError, Missing};
use crate::scene::{MaterialId, ModifierKind, ObjectId, Scene, SceneError, SocketValue, ValueKind};

/// Name of the procedural modifier on both character meshes.
pub const GEOMETRY_NODES: &str = "GeometryNodes";

/// Items of every fabric selector menu, in socket order.
pub const FABRICS: [&str; 10] = [
	"Faded Leather",
	"Jean Generic",
	"Colored Cotton",
	"Ornamented Metal",
	"Fantasy Cotton",
	"Dark Fantasy Cotton",
	"Pastel Cotton",
	"Rotten Fabric",
	"Flashy Synthetic",
	"Shiny Fabric",
];

const EARRINGS_MATERIAL: &str = "Earrings";
const EARRINGS_NODE: &str = "HySkin03";

/// Tint input of the earrings material for an earrings style. Style 0 has none.
pub fn earring_tint(style: i32) -> Option<&'static str> {
	match style {
		1 | 2 | 4 => Some("Ornamented Metal"),
		3 => Some("Color"),
		5 => Some("Color2"),
		_ => None,
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
	/// No rig in the scene, the panel only offers spawning.
	NeedsSpawn,
	MeshesMissing,
	Ready,
}

pub fn panel_state(scene: &Scene, config: &Config) -> PanelState {
	if scene.objects.find(&config.rig_name).is_none() {
		return PanelState::NeedsSpawn;
	}
	let has = |prefix: &str| scene.objects.find_by_prefix(prefix).is_some();
	if has(&config.primary_mesh_prefix) && has(&config.secondary_mesh_prefix) {
		PanelState::Ready
	} else {
		PanelState::MeshesMissing
	}
}

/// One of the two meshes carrying the character's procedural parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterMesh {
	/// `CharCust_1*`. Material parameters are read through its slots.
	Primary,
	/// `CharCust_2*`.
	Secondary,
}

impl CharacterMesh {
	pub fn prefix(self, config: &Config) -> &str {
		match self {
			CharacterMesh::Primary => &config.primary_mesh_prefix,
			CharacterMesh::Secondary => &config.secondary_mesh_prefix,
		}
	}

	pub fn find(self, scene: &Scene, config: &Config) -> Lookup<ObjectId> {
		lookup::object_by_prefix(scene, self.prefix(config))
	}
}

/// Material group node a parameter lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skin {
	/// `HySkin01` in the `Skin` material.
	Base,
	/// `HySkin02` in the `Skin 2` material.
	Clothing,
}

impl Skin {
	pub fn material_prefix(self) -> &'static str {
		match self {
			Skin::Base => "Skin",
			Skin::Clothing => "Skin 2",
		}
	}

	pub fn node(self) -> &'static str {
		match self {
			Skin::Base => "HySkin01",
			Skin::Clothing => "HySkin02",
		}
	}
}

/// A socket whose value the panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
	/// Input of the `GeometryNodes` modifier of a character mesh.
	Modifier { mesh: CharacterMesh, socket: String },
	/// Input of a node in the primary mesh's first material whose name starts with `material_prefix`.
	MaterialNode {
		material_prefix: String,
		node: String,
		socket: String,
	},
	/// Input of a node in the material of the mesh's slot holding the material named `material`.
	SlotNode {
		mesh: CharacterMesh,
		material: String,
		node: String,
		socket: String,
	},
}

impl Target {
	pub fn socket(&self) -> &str {
		match self {
			Target::Modifier { socket, .. } | Target::MaterialNode { socket, .. } | Target::SlotNode { socket, .. } => {
				socket
			}
		}
	}

	fn skin(skin: Skin, socket: String) -> Self {
		Target::MaterialNode {
			material_prefix: skin.material_prefix().to_owned(),
			node: skin.node().to_owned(),
			socket,
		}
	}
}

impl fmt::Display for Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Target::Modifier { mesh, socket } => write!(f, "{mesh:?}.{GEOMETRY_NODES}[{socket:?}]"),
			Target::MaterialNode {
				material_prefix,
				node,
				socket,
			} => write!(f, "{material_prefix}*.{node}[{socket:?}]"),
			Target::SlotNode {
				mesh,
				material,
				node,
				socket,
			} => write!(f, "{mesh:?}.{material}.{node}[{socket:?}]"),
		}
	}
}

/// Static location of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
	Modifier(CharacterMesh, &'static str),
	Material(Skin, &'static str),
}

impl Source {
	pub fn target(self) -> Target {
		match self {
			Source::Modifier(mesh, socket) => Target::Modifier {
				mesh,
				socket: socket.to_owned(),
			},
			Source::Material(skin, socket) => Target::skin(skin, socket.to_owned()),
		}
	}
}

/// Dependent parameter a selector shows depending on its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reveal {
	/// The selector is a fabric menu. Its colour lives at `Socket_{first_socket + index of the fabric}`
	/// of the same node.
	FabricColor { first_socket: u32 },
	/// The selector is the earrings style. See [`earring_tint`].
	EarringTint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
	pub label: &'static str,
	pub source: Source,
	pub reveals: Option<Reveal>,
}

impl Param {
	const fn new(label: &'static str, source: Source) -> Self {
		Self {
			label,
			source,
			reveals: None,
		}
	}

	const fn revealing(mut self, reveal: Reveal) -> Self {
		self.reveals = Some(reveal);
		self
	}

	/// Label of the revealed parameter.
	pub fn revealed_label(&self) -> Option<&'static str> {
		match self.reveals? {
			Reveal::FabricColor { .. } => Some("Color"),
			Reveal::EarringTint => Some("Color Tint"),
		}
	}
}

/// Labelled run of parameters inside a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Group {
	pub title: Option<&'static str>,
	pub params: &'static [Param],
}

/// Collapsible panel box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
	pub title: &'static str,
	pub expanded: bool,
	pub groups: &'static [Group],
}

impl Section {
	pub fn params(&self) -> impl Iterator<Item = &'static Param> {
		let groups: &'static [Group] = self.groups;
		groups.iter().flat_map(|group| group.params)
	}
}

const fn body(label: &'static str, socket: &'static str) -> Param {
	Param::new(label, Source::Modifier(CharacterMesh::Primary, socket))
}

const fn accessories(label: &'static str, socket: &'static str) -> Param {
	Param::new(label, Source::Modifier(CharacterMesh::Secondary, socket))
}

const fn skin(label: &'static str, socket: &'static str) -> Param {
	Param::new(label, Source::Material(Skin::Base, socket))
}

const fn fabric(skin: Skin, selector: &'static str, first_socket: u32) -> Param {
	Param::new("Material", Source::Material(skin, selector)).revealing(Reveal::FabricColor { first_socket })
}

pub static SECTIONS: [Section; 5] = [
	Section {
		title: "GENERAL",
		expanded: true,
		groups: &[
			Group {
				title: None,
				params: &[
					skin("Body Type", "Body Type"),
					skin("Face Type", "Face Type"),
					skin("Skintone", "Skintone"),
					skin("Ears", "Ears"),
					skin("Mouth", "Mouth Type"),
				],
			},
			Group {
				title: Some("EYES"),
				params: &[
					skin("Skin", "Socket_17"),
					skin("Style", "Socket_18"),
					skin("Color", "Socket_19"),
				],
			},
			Group {
				title: Some("EYE WHITES"),
				params: &[
					skin("Skin", "Socket_25"),
					skin("Style", "Socket_26"),
					skin("Color", "Socket_27"),
				],
			},
			Group {
				title: Some("UNDERWEAR"),
				params: &[skin("Underwear", "Socket_98"), skin("Color", "Socket_99")],
			},
		],
	},
	Section {
		title: "HEAD",
		expanded: false,
		groups: &[Group {
			title: None,
			params: &[
				body("Hair Style", "Socket_2"),
				skin("Hair Color", "Hair Color"),
				skin("Eyebrows", "Socket_14"),
				skin("Brow Color", "Socket_15"),
				body("Beard Style", "Socket_4"),
				skin("Beard Color", "Beard Color"),
			],
		}],
	},
	Section {
		title: "ACCESSORIES",
		expanded: false,
		groups: &[Group {
			title: None,
			params: &[
				accessories("Head Accessory", "Socket_22"),
				fabric(Skin::Clothing, "Socket_50", 51),
				accessories("Face Accessory", "Socket_21"),
				fabric(Skin::Clothing, "Socket_38", 39),
				accessories("Earrings", "Socket_19").revealing(Reveal::EarringTint),
				accessories("Side", "Socket_20"),
			],
		}],
	},
	Section {
		title: "BODY & CLOTHING",
		expanded: false,
		groups: &[
			Group {
				title: Some("UNDERTOP"),
				params: &[body("Style", "Socket_13"), fabric(Skin::Base, "Socket_87", 88)],
			},
			Group {
				title: Some("OVERSHIRT"),
				params: &[body("Style", "Socket_14"), fabric(Skin::Clothing, "Socket_2", 3)],
			},
			Group {
				title: Some("GLOVES"),
				params: &[body("Style", "Socket_12"), fabric(Skin::Base, "Socket_75", 76)],
			},
			Group {
				title: Some("PANTS"),
				params: &[body("Style", "Socket_5"), fabric(Skin::Base, "Socket_46", 47)],
			},
			Group {
				title: Some("OVERPANTS"),
				params: &[body("Style", "Socket_11"), fabric(Skin::Base, "Socket_57", 58)],
			},
			Group {
				title: Some("SHOES"),
				params: &[accessories("Style", "Socket_15"), fabric(Skin::Clothing, "Socket_14", 15)],
			},
		],
	},
	Section {
		title: "CAPE",
		expanded: false,
		groups: &[Group {
			title: None,
			params: &[
				accessories("Style", "Socket_17"),
				accessories("Neck", "Socket_18"),
				fabric(Skin::Clothing, "Socket_25", 26),
			],
		}],
	},
];

/// Where a target's socket lives once names are resolved.
#[derive(Debug, Clone, Copy)]
enum Owner {
	Modifier(ObjectId),
	Node(MaterialId),
}

fn locate(scene: &Scene, config: &Config, target: &Target) -> Lookup<Owner> {
	match target {
		Target::Modifier { mesh, .. } => mesh.find(scene, config).map(Owner::Modifier),
		Target::MaterialNode { material_prefix, .. } => (CharacterMesh::Primary.find(scene, config))
			.and_then(|object| lookup::material_by_prefix(scene, object, material_prefix))
			.map(Owner::Node),
		Target::SlotNode { mesh, material, .. } => (mesh.find(scene, config))
			.and_then(|object| lookup::material_by_name(scene, object, material))
			.map(Owner::Node),
	}
}

fn input<'s>(scene: &'s Scene, config: &Config, target: &Target) -> Lookup<&'s SocketValue> {
	locate(scene, config, target).and_then(|owner| match (owner, target) {
		(Owner::Modifier(object), _) => lookup::modifier_socket(scene, object, GEOMETRY_NODES, target.socket()),
		(Owner::Node(material), Target::MaterialNode { node, socket, .. } | Target::SlotNode { node, socket, .. }) => {
			lookup::node_socket(scene, material, node, socket)
		}
		(Owner::Node(_), Target::Modifier { .. }) => Lookup::NotFound(Missing::Modifier {
			object: String::new(),
			modifier: GEOMETRY_NODES.to_owned(),
		}),
	})
}

/// Current value of a target's socket.
pub fn read(scene: &Scene, config: &Config, target: &Target) -> Lookup<SocketValue> {
	input(scene, config, target).map(SocketValue::clone)
}

/// The parameter a selector currently reveals. `Found(None)` when its value reveals nothing,
/// like a fabric name outside [`FABRICS`] or earrings style 0.
pub fn revealed_target(scene: &Scene, config: &Config, param: &Param) -> Lookup<Option<Target>> {
	let Some(reveal) = param.reveals else {
		return Lookup::Found(None);
	};
	let selector = param.source.target();
	match (reveal, param.source) {
		(Reveal::FabricColor { first_socket }, Source::Material(skin, _)) => {
			input(scene, config, &selector).menu().map(|fabric| {
				let index = FABRICS.iter().position(|&name| name == fabric)?;
				Some(Target::skin(skin, format!("Socket_{}", first_socket + index as u32)))
			})
		}
		(Reveal::EarringTint, _) => input(scene, config, &selector).int().map(|style| {
			earring_tint(style).map(|socket| Target::SlotNode {
				mesh: CharacterMesh::Secondary,
				material: EARRINGS_MATERIAL.to_owned(),
				node: EARRINGS_NODE.to_owned(),
				socket: socket.to_owned(),
			})
		}),
		(Reveal::FabricColor { .. }, Source::Modifier(..)) => Lookup::Found(None),
	}
}

/// One line of the panel: a parameter or the parameter it reveals, with its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
	pub group: Option<&'static str>,
	pub label: &'static str,
	pub target: Target,
	pub value: Lookup<SocketValue>,
}

/// Lines of a section as the panel draws them. Revealed parameters follow their selector.
pub fn rows(scene: &Scene, config: &Config, section: &Section) -> Vec<Row> {
	let mut rows = Vec::new();
	for group in section.groups {
		for param in group.params {
			let target = param.source.target();
			rows.push(Row {
				group: group.title,
				label: param.label,
				value: read(scene, config, &target),
				target,
			});

			if let (Lookup::Found(Some(target)), Some(label)) =
				(revealed_target(scene, config, param), param.revealed_label())
			{
				rows.push(Row {
					group: group.title,
					label,
					value: read(scene, config, &target),
					target,
				});
			}
		}
	}
	rows
}

#[derive(Debug, thiserror::Error)]
pub enum CustomizeError {
	#[error("Cannot set {target}: {source}")]
	Lookup {
		target: String,
		#[source]
		source: LookupError,
	},
	#[error("Cannot set {target}: expected a {expected} value, got a {found} value")]
	WrongType {
		target: String,
		expected: ValueKind,
		found: ValueKind,
	},
	#[error(transparent)]
	Scene(#[from] SceneError),
}

/// Sets a target's socket. The socket must exist and keep its value kind.
pub fn write(scene: &mut Scene, config: &Config, target: &Target, value: SocketValue) -> Result<(), CustomizeError> {
	let lookup_error = |source| CustomizeError::Lookup {
		target: target.to_string(),
		source,
	};
	let current = input(scene, config, target).into_result().map_err(lookup_error)?;
	if current.kind() != value.kind() {
		return Err(CustomizeError::WrongType {
			target: target.to_string(),
			expected: current.kind(),
			found: value.kind(),
		});
	}
	let owner = locate(scene, config, target).into_result().map_err(lookup_error)?;

	let slot = match (owner, target) {
		(Owner::Modifier(object), _) => {
			let modifier = scene.object_mut(object)?.modifier_mut(GEOMETRY_NODES);
			match modifier.map(|modifier| &mut modifier.kind) {
				Some(ModifierKind::Nodes { inputs, .. }) => inputs.get_mut(target.socket()),
				_ => None,
			}
		}
		(Owner::Node(material), Target::MaterialNode { node, socket, .. } | Target::SlotNode { node, socket, .. }) => {
			let tree = &mut scene.material_mut(material)?.node_tree;
			tree.by_name_mut(node).and_then(|node| node.inputs.get_mut(socket.as_str()))
		}
		(Owner::Node(_), Target::Modifier { .. }) => None,
	};
	let Some(slot) = slot else {
		return Err(lookup_error(LookupError::NotFound(Missing::Socket {
			owner: target.to_string(),
			socket: target.socket().to_owned(),
		})));
	};

	debug!("{target} = {value}");
	*slot = value;
	Ok(())
}
