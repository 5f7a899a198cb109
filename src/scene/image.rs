use std::path::{Path, PathBuf};

use image::{ImageError, ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use super::store::impl_data_block;

/// Where an image's pixels come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSource {
	/// Created in memory.
	#[default]
	Generated,
	/// A single file on disk.
	File,
	/// A UDIM tile set addressed in absolute tile space.
	Tiled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
	pub name: String,
	pub source: ImageSource,
	pub filepath: Option<PathBuf>,
	pub alpha: bool,
	/// Keeps the image alive through orphan purges.
	pub use_fake_user: bool,
	pub pixels: RgbaImage,
}

impl_data_block!(Image);

impl Image {
	/// A blank in-memory image, transparent if `alpha` and opaque black otherwise.
	pub fn new_generated(name: impl Into<String>, width: u32, height: u32, alpha: bool) -> Self {
		let fill = if alpha { Rgba([0, 0, 0, 0]) } else { Rgba([0, 0, 0, 255]) };
		Self {
			name: name.into(),
			source: ImageSource::Generated,
			filepath: None,
			alpha,
			use_fake_user: false,
			pixels: RgbaImage::from_pixel(width, height, fill),
		}
	}

	/// Loads an image file. The data-block is named after the file name.
	pub fn load(path: &Path) -> Result<Self, ImageError> {
		let pixels = image::open(path)?.into_rgba8();
		let name = (path.file_name())
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_else(|| path.display().to_string());
		debug!("Loaded image {name:?} ({}x{})", pixels.width(), pixels.height());

		Ok(Self {
			name,
			source: ImageSource::File,
			filepath: Some(path.to_owned()),
			alpha: true,
			use_fake_user: false,
			pixels,
		})
	}

	/// Writes the pixels as PNG and points the image at the written file.
	pub fn save_png(&mut self, path: &Path) -> Result<(), ImageError> {
		self.pixels.save_with_format(path, ImageFormat::Png)?;
		self.filepath = Some(path.to_owned());
		debug!("Saved image {:?} to {}", self.name, path.display());
		Ok(())
	}

	pub fn width(&self) -> u32 {
		self.pixels.width()
	}

	pub fn height(&self) -> u32 {
		self.pixels.height()
	}
}
