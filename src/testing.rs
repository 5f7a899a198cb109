//! Shared fixtures for unit tests.

use glam::{vec2, vec3, vec4, Vec2, Vec3};

use crate::scene::{
	Armature, CollectionId, Image, ImageSource, Material, MaterialId, Mesh, Modifier, ModifierKind, Object,
	ObjectData, ObjectId, PoseBone, Scene, ShaderNodeKind, SocketValue,
};

pub(crate) use crate::customizer::FABRICS;

/// Unit quad made of two triangles, with one UV layer `UVMap` equal to the vertex XY moved by `uv_offset`.
pub(crate) fn quad_mesh(name: &str, uv_offset: Vec2) -> Mesh {
	let vertices: Vec<Vec3> = vec![vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0), vec3(1.0, 1.0, 0.0)];
	let loops = vec![0, 1, 2, 1, 3, 2];
	let uvs = loops
		.iter()
		.map(|&i| vertices[i as usize].truncate() + uv_offset)
		.collect();

	let mut mesh = Mesh::new(name, vertices, loops);
	mesh.add_uv_layer("UVMap", uvs);
	mesh
}

pub(crate) struct CharacterFixture {
	pub scene: Scene,
	pub source: CollectionId,
	pub rig: ObjectId,
	/// `CharCust_1`, UVs in tile 1002.
	pub body: ObjectId,
	/// `CharCust_2`, UVs in tile 1001.
	pub accessories: ObjectId,
	/// Parented to the body instead of the rig.
	pub eyes: ObjectId,
	pub mouth: ObjectId,
	pub hidden_cape: ObjectId,
	/// `WGT_Root` then `WGT_Circle`.
	pub widgets: Vec<ObjectId>,
	pub skin: MaterialId,
	pub skin2: MaterialId,
	pub earrings: MaterialId,
}

fn fabric_inputs(tree_inputs: &mut Vec<(String, SocketValue)>, selector: u32, choice: &str) {
	tree_inputs.push((format!("Socket_{selector}"), SocketValue::Menu(choice.to_owned())));
	for i in 0..FABRICS.len() as u32 {
		let shade = i as f32 / 10.0;
		tree_inputs.push((
			format!("Socket_{}", selector + 1 + i),
			SocketValue::Color(vec4(shade, 0.2, 0.3, 1.0)),
		));
	}
}

fn group_material(scene: &mut Scene, name: &str, group: &str, inputs: Vec<(String, SocketValue)>) -> MaterialId {
	let mut material = Material::new(name);
	material.use_nodes = true;
	let tree = &mut material.node_tree;

	let node = tree.add_named(group, ShaderNodeKind::Group { tree: group.to_owned() });
	if let Some(node) = tree.get_mut(node) {
		node.inputs.extend(inputs);
	}
	let bsdf = tree.add(ShaderNodeKind::BsdfPrincipled);
	let output = tree.add(ShaderNodeKind::OutputMaterial);
	tree.link(bsdf, "BSDF", output, "Surface").unwrap();

	scene.materials.insert(material)
}

fn nodes_modifier(inputs: &[(&str, SocketValue)]) -> Modifier {
	let mut modifier = Modifier::nodes("GeometryNodes", "HyChar");
	if let ModifierKind::Nodes { inputs: sockets, .. } = &mut modifier.kind {
		sockets.extend(inputs.iter().map(|(k, v)| (k.to_string(), v.clone())));
	}
	modifier
}

fn mesh_object(scene: &mut Scene, name: &str, uv_offset: Vec2, parent: ObjectId, slots: &[MaterialId]) -> ObjectId {
	let mesh = scene.meshes.insert(quad_mesh(name, uv_offset));
	let mut object = Object::new(name, ObjectData::Mesh(mesh));
	object.parent = Some(parent);
	object.material_slots = slots.iter().copied().map(Some).collect();
	scene.objects.insert(object)
}

/// A spawned character as it sits in the scene before baking.
///
/// ```text
/// Scene Collection
///   Master_Character_Collection      CharRig
///     Character_Meshes               CharCust_1, CharCust_2, CharCust_Eyes, CharCust_Mouth, CharCust_Cape (hidden)
///     WGTS (excluded)                WGT_Root, WGT_Circle
/// ```
pub(crate) fn character_scene() -> CharacterFixture {
	let mut scene = Scene::new();
	let root = scene.collections.root();
	let source = scene.collections.create("Master_Character_Collection", Some(root)).unwrap();
	let meshes = scene.collections.create("Character_Meshes", Some(source)).unwrap();
	let wgts = scene.collections.create("WGTS", Some(source)).unwrap();
	scene.collections.exclude_from_view_layer("WGTS");

	// materials
	let atlas = scene.images.insert(Image {
		source: ImageSource::Tiled,
		..Image::new_generated("HyChar_Atlas", 4, 4, true)
	});

	let mut skin_inputs = vec![
		("Body Type".to_owned(), SocketValue::Int(0)),
		("Skintone".to_owned(), SocketValue::Int(2)),
		("Hair Color".to_owned(), SocketValue::Color(vec4(0.3, 0.2, 0.1, 1.0))),
	];
	fabric_inputs(&mut skin_inputs, 46, "Colored Cotton");
	let skin = group_material(&mut scene, "Skin", "HySkin01", skin_inputs);
	{
		let tree = &mut scene.material_mut(skin).unwrap().node_tree;
		let tex = tree.add(ShaderNodeKind::tex_image(Some(atlas)));
		let bsdf = tree.by_name("Principled BSDF").unwrap().id;
		tree.link(tex, "Color", bsdf, "Base Color").unwrap();
	}

	let mut skin2_inputs = Vec::new();
	fabric_inputs(&mut skin2_inputs, 50, "Jean Generic");
	let skin2 = group_material(&mut scene, "Skin 2", "HySkin02", skin2_inputs);

	let earrings = group_material(
		&mut scene,
		"Earrings",
		"HySkin03",
		vec![
			("Ornamented Metal".to_owned(), SocketValue::Color(vec4(0.8, 0.7, 0.2, 1.0))),
			("Color".to_owned(), SocketValue::Color(vec4(0.1, 0.1, 0.9, 1.0))),
			("Color2".to_owned(), SocketValue::Color(vec4(0.9, 0.1, 0.1, 1.0))),
		],
	);

	// widgets
	let widget = |scene: &mut Scene, name: &str| {
		let mesh = scene.meshes.insert(quad_mesh(name, Vec2::ZERO));
		let id = scene.objects.insert(Object::new(name, ObjectData::Mesh(mesh)));
		scene.collections.link_object(wgts, id).unwrap();
		id
	};
	let wgt_root = widget(&mut scene, "WGT_Root");
	let wgt_circle = widget(&mut scene, "WGT_Circle");

	// rig
	let bones = ["root", "spine", "head", "hand.L"];
	let armature = scene
		.armatures
		.insert(Armature::new("CharRig", bones.iter().map(|b| b.to_string()).collect()));
	let mut rig_object = Object::new("CharRig", ObjectData::Armature(armature));
	rig_object.pose = bones
		.iter()
		.zip([Some(wgt_root), Some(wgt_circle), Some(wgt_circle), None])
		.map(|(name, custom_shape)| PoseBone {
			name: name.to_string(),
			custom_shape,
		})
		.collect();
	let rig = scene.objects.insert(rig_object);
	scene.collections.link_object(source, rig).unwrap();

	// meshes
	let body = mesh_object(&mut scene, "CharCust_1", vec2(1.0, 0.0), rig, &[skin, skin2]);
	let accessories = mesh_object(&mut scene, "CharCust_2", Vec2::ZERO, rig, &[skin2, earrings]);
	let eyes = mesh_object(&mut scene, "CharCust_Eyes", vec2(0.0, 1.0), body, &[skin]);
	let mouth = mesh_object(&mut scene, "CharCust_Mouth", Vec2::ZERO, rig, &[skin]);
	let hidden_cape = mesh_object(&mut scene, "CharCust_Cape", Vec2::ZERO, rig, &[skin2]);
	scene.object_mut(hidden_cape).unwrap().hide_viewport = true;

	{
		let obj = scene.object_mut(body).unwrap();
		obj.modifiers.push(Modifier::armature("Armature", Some(rig)));
		obj.modifiers.push(nodes_modifier(&[
			("Socket_2", SocketValue::Int(1)),
			("Socket_4", SocketValue::Int(0)),
			("Socket_5", SocketValue::Int(2)),
		]));
	}
	{
		let obj = scene.object_mut(accessories).unwrap();
		obj.modifiers.push(nodes_modifier(&[
			("Socket_19", SocketValue::Int(3)),
			("Socket_22", SocketValue::Int(0)),
		]));
		obj.modifiers.push(Modifier::armature("Armature", Some(rig)));
	}
	scene
		.object_mut(mouth)
		.unwrap()
		.modifiers
		.push(Modifier::armature("Armature", Some(rig)));

	for id in [body, accessories, eyes, mouth, hidden_cape] {
		scene.collections.link_object(meshes, id).unwrap();
	}

	CharacterFixture {
		scene,
		source,
		rig,
		body,
		accessories,
		eyes,
		mouth,
		hidden_cape,
		widgets: vec![wgt_root, wgt_circle],
		skin,
		skin2,
		earrings,
	}
}
