use crate::scene::{
	DataStore, Extension, Image, ImageId, ImageSource, Interpolation, NodeId, NodeTree, NodeTreeError, ShaderNodeKind,
};

/// Name of the image node sampling the baked texture.
pub const BAKED_RESULT: &str = "BAKED_RESULT";

/// Adds a UV source bound to `uv_map` and feeds it to every node sampling a tiled image,
/// so those keep addressing absolute tile space while another UV layer is active.
pub(super) fn lock_tiled_textures(
	tree: &mut NodeTree,
	images: &DataStore<ImageId, Image>,
	uv_map: &str,
) -> Result<NodeId, NodeTreeError> {
	let uv_source = tree.add(ShaderNodeKind::UvMap {
		uv_map: uv_map.to_owned(),
	});

	let tiled: Vec<NodeId> = (tree.nodes())
		.filter(|node| {
			(node.image().and_then(|image| images.get(image))).is_some_and(|image| image.source == ImageSource::Tiled)
		})
		.map(|node| node.id)
		.collect();
	for node in tiled {
		tree.link(uv_source, "UV", node, "Vector")?;
	}
	Ok(uv_source)
}

/// Makes the surface output come from the baked image: its colour drives a diffuse shader
/// and its alpha mixes that with a transparent one.
///
/// ```text
/// BAKED_RESULT.Color -> Diffuse.Color
/// BAKED_RESULT.Alpha -> Mix.Fac
/// Transparent.BSDF   -> Mix.Shader
/// Diffuse.BSDF       -> Mix.Shader_001
/// Mix.Shader         -> Output.Surface
/// ```
pub(super) fn rewire_to_baked(tree: &mut NodeTree, image: ImageId) -> Result<NodeId, NodeTreeError> {
	let result = tree.add_named(
		BAKED_RESULT,
		ShaderNodeKind::TexImage {
			image: Some(image),
			interpolation: Interpolation::Closest,
			extension: Extension::Clip,
		},
	);
	let diffuse = tree.add(ShaderNodeKind::BsdfDiffuse);
	let transparent = tree.add(ShaderNodeKind::BsdfTransparent);
	let mix = tree.add(ShaderNodeKind::MixShader);
	let mut added = vec![result, diffuse, transparent, mix];
	let output = match tree.output_node() {
		Some(output) => output,
		None => {
			let output = tree.add(ShaderNodeKind::OutputMaterial);
			added.push(output);
			output
		}
	};

	// the surface link goes last, it replaces whatever fed the output before
	link_or_remove(
		tree,
		&added,
		&[
			(result, "Color", diffuse, "Color"),
			(result, "Alpha", mix, "Fac"),
			(transparent, "BSDF", mix, "Shader"),
			(diffuse, "BSDF", mix, "Shader_001"),
			(mix, "Shader", output, "Surface"),
		],
	)?;
	Ok(result)
}

/// Makes every link in order, removing the `added` nodes again if one of them fails.
fn link_or_remove(
	tree: &mut NodeTree,
	added: &[NodeId],
	links: &[(NodeId, &str, NodeId, &str)],
) -> Result<(), NodeTreeError> {
	let linked = (links.iter()).try_for_each(|&(from, output, to, input)| tree.link(from, output, to, input));
	if linked.is_err() {
		for &node in added {
			tree.remove(node);
		}
	}
	linked
}
