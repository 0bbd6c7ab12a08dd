//! Seeded random sampling of pixels without replacement

use crate::{Color, QuantizeError};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Draw `count` distinct indices from `0..len` using a generator seeded with `seed`.
///
/// The same `len`, `count`, and `seed` always give the same indices in the same order.
///
/// # Errors
/// Returns [`QuantizeError::EmptySample`] if `count` is zero
/// and [`QuantizeError::InsufficientData`] if `count` is greater than `len`.
pub fn sample_indices(len: usize, count: usize, seed: u64) -> Result<Vec<usize>, QuantizeError> {
	if count == 0 {
		Err(QuantizeError::EmptySample)
	} else if count > len {
		Err(QuantizeError::InsufficientData { requested: count, available: len })
	} else {
		let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
		Ok(rand::seq::index::sample(&mut rng, len, count).into_vec())
	}
}

/// Draw `count` pixels without replacement using a generator seeded with `seed`.
///
/// "Without replacement" refers to pixel positions:
/// if the image has duplicate colors, the same color may be drawn more than once.
///
/// # Errors
/// See [`sample_indices`].
pub fn sample(pixels: &[Color], count: usize, seed: u64) -> Result<Vec<Color>, QuantizeError> {
	let indices = sample_indices(pixels.len(), count, seed)?;
	Ok(indices.into_iter().map(|i| pixels[i]).collect())
}
