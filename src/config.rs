//! Configuration and asset location.

use std::path::{Path, PathBuf};

/// Environment variable overriding the asset library file.
pub const LIBRARY_ENV: &str = "HYCHAR_LIBRARY";
/// Environment variable overriding the baked texture output directory.
pub const OUTPUT_DIR_ENV: &str = "HYCHAR_OUTPUT_DIR";

/// Resolves the bundled asset library and the bake output directory relative to an install root.
#[derive(Debug, Clone)]
pub struct AssetLocator {
	root: PathBuf,
}

impl AssetLocator {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// `root/resources/CharLibrary.json`, unless `HYCHAR_LIBRARY` is set.
	pub fn library_file(&self) -> PathBuf {
		match std::env::var_os(LIBRARY_ENV) {
			Some(path) => PathBuf::from(path),
			None => self.root.join("resources").join("CharLibrary.json"),
		}
	}

	/// `root/library/baked_textures`, unless `HYCHAR_OUTPUT_DIR` is set.
	pub fn baked_textures_dir(&self) -> PathBuf {
		match std::env::var_os(OUTPUT_DIR_ENV) {
			Some(path) => PathBuf::from(path),
			None => self.root.join("library").join("baked_textures"),
		}
	}
}

impl Default for AssetLocator {
	fn default() -> Self {
		Self::new(env!("CARGO_MANIFEST_DIR"))
	}
}

/// Settings for the per-mesh texture bake.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureBakeConfig {
	/// Width and height of the square bake target.
	pub image_size: u32,
	/// Pixels of margin the renderer extends past UV island borders.
	pub margin: u32,
	pub samples: u32,
	/// Meshes whose base name ends with one of these use alternate shading and are never flattened.
	pub excluded_suffixes: Vec<String>,
}

impl Default for TextureBakeConfig {
	fn default() -> Self {
		Self {
			image_size: 512,
			margin: 2,
			samples: 1,
			excluded_suffixes: vec!["Mouth".to_owned(), "Ears".to_owned()],
		}
	}
}

/// Names and paths the pipelines work against.
#[derive(Debug, Clone)]
pub struct Config {
	pub locator: AssetLocator,
	/// Explicit library path, taking precedence over the locator.
	pub library_path: Option<PathBuf>,
	/// Explicit bake output directory, taking precedence over the locator.
	pub output_dir: Option<PathBuf>,
	/// Collection appended from the library and torn down by the hierarchy bake.
	pub source_collection: String,
	/// Name of the parametric rig object.
	pub rig_name: String,
	pub default_prefix: String,
	/// Name prefix of the mesh carrying the primary procedural modifier and `Skin` materials.
	pub primary_mesh_prefix: String,
	/// Name prefix of the mesh carrying accessories and the `Skin 2` / `Earrings` materials.
	pub secondary_mesh_prefix: String,
	pub texture_bake: TextureBakeConfig,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			locator: AssetLocator::default(),
			library_path: None,
			output_dir: None,
			source_collection: "Master_Character_Collection".to_owned(),
			rig_name: "CharRig".to_owned(),
			default_prefix: "NewChar".to_owned(),
			primary_mesh_prefix: "CharCust_1".to_owned(),
			secondary_mesh_prefix: "CharCust_2".to_owned(),
			texture_bake: TextureBakeConfig::default(),
		}
	}
}

impl Config {
	/// Creates a config locating assets under `root`.
	pub fn with_root(root: impl Into<PathBuf>) -> Self {
		Self {
			locator: AssetLocator::new(root),
			..Default::default()
		}
	}

	/// Sets the library file path.
	pub fn library_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.library_path = Some(path.into());
		self
	}

	/// Sets the bake output directory.
	pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
		self.output_dir = Some(path.into());
		self
	}

	pub fn rig_name(mut self, name: impl Into<String>) -> Self {
		self.rig_name = name.into();
		self
	}

	pub fn source_collection(mut self, name: impl Into<String>) -> Self {
		self.source_collection = name.into();
		self
	}

	pub fn image_size(mut self, size: u32) -> Self {
		self.texture_bake.image_size = size;
		self
	}

	pub fn resolved_library_path(&self) -> PathBuf {
		self.library_path.clone().unwrap_or_else(|| self.locator.library_file())
	}

	pub fn resolved_output_dir(&self) -> PathBuf {
		self.output_dir.clone().unwrap_or_else(|| self.locator.baked_textures_dir())
	}
}
