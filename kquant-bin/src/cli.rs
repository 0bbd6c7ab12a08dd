//! Specifies the CLI and handles arg parsing

use clap::{Parser, ValueEnum};
use kquant::Strategy;
use std::{
	fmt::{Debug, Display},
	ops::RangeBounds,
	path::PathBuf,
	str::FromStr,
};

/// Supported output formats for the printed palettes
#[derive(Copy, Clone, ValueEnum)]
pub enum FormatOutput {
	/// sRGB hexcode
	Hex,
	/// sRGB (r,g,b) triple
	Rgb,
	/// Whitespace with true color background
	Swatch,
}

/// Ways to colorize the output text
#[derive(Copy, Clone, ValueEnum)]
pub enum ColorizeOutput {
	/// Foreground
	Fg,
	/// Background
	Bg,
}

/// Which codebook strategies to run
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum StrategyChoice {
	/// Both k-means and random
	Both,
	/// Only k-means
	Kmeans,
	/// Only random
	Random,
}

impl StrategyChoice {
	/// The strategies to run, in display order
	pub fn strategies(self) -> Vec<Strategy> {
		match self {
			Self::Both => Strategy::ALL.to_vec(),
			Self::Kmeans => vec![Strategy::Kmeans],
			Self::Random => vec![Strategy::Random],
		}
	}
}

/// Reduce the number of colors in an image using a k-means and a random codebook.
///
/// Both quantized images are saved next to each other as <stem>_kmeans.png and <stem>_random.png.
/// If the image cannot be loaded, a generated sample image is used instead.
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser)]
#[command(version)]
pub struct Options {
	/// The path to the input image
	#[arg(default_value = "image.jpg")]
	pub image: PathBuf,

	/// The number of colors to reduce the image to
	#[arg(short, default_value_t = 10, value_parser = parse_valid_k)]
	pub k: u8,

	/// The number of pixels to run k-means on
	///
	/// Must not be larger than the number of pixels in the (possibly pixelized) image.
	#[arg(long, default_value_t = 1000, value_parser = parse_positive::<usize>)]
	pub sample_size: usize,

	/// The seed used for every random draw, unless overridden below
	#[arg(long, default_value_t = 0)]
	pub seed: u64,

	/// The seed for the pixel sample given to k-means
	#[arg(long)]
	pub sample_seed: Option<u64>,

	/// The seed for the k-means initialization
	#[arg(long)]
	pub kmeans_seed: Option<u64>,

	/// The seed for the pixels chosen as the random codebook
	#[arg(long)]
	pub codebook_seed: Option<u64>,

	/// The number of trials of k-means to run
	///
	/// k-means can get stuck in a local minimum, so you may want to run a few or more trials to get better results.
	/// The trial with the lowest inertia is picked.
	#[arg(short = 'n', long, default_value_t = 1, value_parser = parse_positive::<u32>)]
	pub trials: u32,

	/// The threshold used to determine k-means convergence
	///
	/// k-means stops once the sum of squared centroid movements is at or below this value.
	/// Colors have components in [0.0, 1.0].
	#[arg(short = 'e', long, default_value_t = 1e-6, value_parser = parse_valid_convergence)]
	pub convergence_threshold: f32,

	/// The maximum number of iterations for each k-means trial
	#[arg(short = 'i', long, default_value_t = 300, value_parser = parse_positive::<u32>)]
	pub max_iter: u32,

	/// Which codebook strategies to run
	#[arg(long, default_value = "both")]
	pub strategy: StrategyChoice,

	/// Resize the image to --size before quantizing it
	///
	/// This is useful for creating pixel art or nonograms.
	#[arg(long)]
	pub pixelize: bool,

	/// The target size used by --pixelize, as WIDTHxHEIGHT
	#[arg(long, default_value = "60x80", value_parser = parse_size)]
	pub size: (u32, u32),

	/// The directory to save the output images in
	#[arg(short, long, default_value = ".")]
	pub output_dir: PathBuf,

	/// Also save the original and quantized images side by side as <stem>_comparison.png
	#[arg(long)]
	pub compare: bool,

	/// Print the colors of each codebook in the given format
	#[arg(short, long)]
	pub palette: Option<FormatOutput>,

	/// Color the foreground or background for each printed color
	#[arg(short, long)]
	pub colorize: Option<ColorizeOutput>,

	/// Save the outputs of the strategies that succeeded, even if another one failed
	#[arg(long)]
	pub keep_going: bool,

	/// The number of threads to use
	///
	/// A value of 0 indicates to automatically choose the number of threads.
	#[cfg(feature = "threads")]
	#[arg(short, long, default_value_t = 0)]
	pub threads: u8,

	/// Print additional information, such as the time taken by each step
	#[arg(short, long)]
	pub verbose: bool,
}

impl Options {
	/// The library options described by these arguments
	pub fn quantize_options(&self) -> kquant::QuantizeOptions {
		let seeds = kquant::Seeds {
			sample: self.sample_seed.unwrap_or(self.seed),
			kmeans: self.kmeans_seed.unwrap_or(self.seed),
			codebook: self.codebook_seed.unwrap_or(self.seed),
		};

		let kmeans = kquant::KmeansOptions::new()
			.trials(self.trials)
			.convergence_threshold(self.convergence_threshold)
			.max_iter(self.max_iter);

		kquant::QuantizeOptions::new()
			.k(self.k)
			.sample_size(self.sample_size)
			.seeds(seeds)
			.kmeans(kmeans)
	}
}

/// Parse a value and ensure it is in the provided, valid range
fn parse_in_range<T>(s: &str, range: impl RangeBounds<T> + Debug) -> Result<T, String>
where
	T: FromStr + Display + PartialOrd,
	T::Err: Display,
{
	let value: T = s.parse().map_err(|e| format!("{e}"))?;
	if range.contains(&value) {
		Ok(value)
	} else {
		Err(format!("{value} is not in {range:?}"))
	}
}

/// Parse an integer and ensure it is at least 1
fn parse_positive<T>(s: &str) -> Result<T, String>
where
	T: FromStr + Display + PartialOrd + From<u8> + Debug,
	T::Err: Display,
{
	parse_in_range(s, T::from(1)..)
}

/// Parse the number of colors and ensure it is in `1..=255`
fn parse_valid_k(s: &str) -> Result<u8, String> {
	parse_in_range(s, 1..=u8::MAX)
}

/// Parse the convergence number and ensure it is >= `0.0`
fn parse_valid_convergence(s: &str) -> Result<f32, String> {
	parse_in_range(s, 0.0..)
}

/// Parse a `WIDTHxHEIGHT` pair with non-zero dimensions
fn parse_size(s: &str) -> Result<(u32, u32), String> {
	let (width, height) = s
		.split_once(|c: char| c.eq_ignore_ascii_case(&'x'))
		.ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s}"))?;

	Ok((parse_positive(width.trim())?, parse_positive(height.trim())?))
}
