//! The set of representative colors used to replace the original pixel colors

use crate::{Color, ColorGrid, QuantizeError, MAX_CODEWORDS};

/// A fixed, non-empty list of at most [`MAX_CODEWORDS`] representative colors
///
/// A label `i` refers to the `i`-th codeword.
#[derive(Debug, Clone, PartialEq)]
pub struct Codebook {
	/// The codewords
	colors: Vec<Color>,
}

impl Codebook {
	/// Create a codebook from the given colors.
	///
	/// # Errors
	/// Returns [`QuantizeError::EmptyCodebook`] if `colors` is empty
	/// and [`QuantizeError::TooManyCodewords`] if there are more than [`MAX_CODEWORDS`] colors.
	pub fn new(colors: Vec<Color>) -> Result<Self, QuantizeError> {
		if colors.is_empty() {
			Err(QuantizeError::EmptyCodebook)
		} else if colors.len() > MAX_CODEWORDS {
			Err(QuantizeError::TooManyCodewords(colors.len()))
		} else {
			Ok(Self { colors })
		}
	}

	/// The codewords
	#[must_use]
	pub fn colors(&self) -> &[Color] {
		&self.colors
	}

	/// The number of codewords, which is never zero
	#[must_use]
	#[allow(clippy::len_without_is_empty)]
	pub fn len(&self) -> usize {
		self.colors.len()
	}

	/// The codeword for a label, if it is in range
	#[must_use]
	pub fn get(&self, label: u8) -> Option<Color> {
		self.colors.get(usize::from(label)).copied()
	}

	/// Take ownership of the codewords
	#[must_use]
	pub fn into_colors(self) -> Vec<Color> {
		self.colors
	}

	/// Build a `width` x `height` grid where each pixel is the codeword of its label.
	///
	/// # Errors
	/// Returns [`QuantizeError::InvalidLabel`] if a label is out of range
	/// and the errors of [`ColorGrid::new`] if the labels do not fit the dimensions.
	pub fn reconstruct(&self, labels: &[u8], width: u32, height: u32) -> Result<ColorGrid, QuantizeError> {
		let pixels = labels
			.iter()
			.map(|&label| self.get(label).ok_or_else(|| QuantizeError::InvalidLabel { label, len: self.len() }))
			.collect::<Result<Vec<_>, _>>()?;

		ColorGrid::new(width, height, pixels)
	}
}
