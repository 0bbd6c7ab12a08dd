//! A rectangular grid of colors

use crate::{Color, QuantizeError};
use image::{Rgb, RgbImage};
use palette::Srgb;

/// A `width` x `height` grid of colors stored in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGrid {
	/// The number of columns
	width: u32,
	/// The number of rows
	height: u32,
	/// The colors of each pixel, row by row
	pixels: Vec<Color>,
}

impl ColorGrid {
	/// Create a grid from row-major pixels.
	///
	/// # Errors
	/// Returns [`QuantizeError::ZeroDimension`] if `width` or `height` is zero
	/// and [`QuantizeError::DimensionMismatch`] if `pixels` does not have exactly `width * height` colors.
	pub fn new(width: u32, height: u32, pixels: Vec<Color>) -> Result<Self, QuantizeError> {
		if width == 0 || height == 0 {
			return Err(QuantizeError::ZeroDimension);
		}

		// u32 * u32 always fits in a u64
		if u64::try_from(pixels.len()).map_or(true, |len| len != u64::from(width) * u64::from(height)) {
			return Err(QuantizeError::DimensionMismatch { len: pixels.len(), width, height });
		}

		Ok(Self { width, height, pixels })
	}

	/// Flatten the pixels of an 8-bit RGB image, normalizing each component to `0.0..=1.0`.
	///
	/// # Errors
	/// Returns [`QuantizeError::ZeroDimension`] if the image is empty.
	pub fn from_rgb_image(image: &RgbImage) -> Result<Self, QuantizeError> {
		let srgb: &[Srgb<u8>] = palette::cast::from_component_slice(image.as_raw());
		let pixels = srgb.iter().map(|color| color.into_format()).collect();
		Self::new(image.width(), image.height(), pixels)
	}

	/// Convert back to an 8-bit RGB image, rounding each component to the nearest value.
	#[must_use]
	pub fn to_rgb_image(&self) -> RgbImage {
		let width = self.width as usize;
		RgbImage::from_fn(self.width, self.height, |x, y| {
			let color: Srgb<u8> = self.pixels[y as usize * width + x as usize].into_format();
			Rgb([color.red, color.green, color.blue])
		})
	}

	/// The number of columns
	#[must_use]
	pub const fn width(&self) -> u32 {
		self.width
	}

	/// The number of rows
	#[must_use]
	pub const fn height(&self) -> u32 {
		self.height
	}

	/// The flattened, row-major pixels
	#[must_use]
	pub fn pixels(&self) -> &[Color] {
		&self.pixels
	}

	/// The total number of pixels, which is never zero
	#[must_use]
	#[allow(clippy::len_without_is_empty)]
	pub fn len(&self) -> usize {
		self.pixels.len()
	}

	/// Take ownership of the flattened pixels
	#[must_use]
	pub fn into_pixels(self) -> Vec<Color> {
		self.pixels
	}
}
