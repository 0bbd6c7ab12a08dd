//! Quantize an image with a k-means codebook and with a random codebook, and save both results.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal
)]

mod cli;
mod output;

#[allow(clippy::wildcard_imports)]
use cli::*;

use std::{
    fs, io,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use clap::Parser;
use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use kquant::{ColorGrid, PipelineError, QuantizeError, QuantizeOptions, Quantized, Strategy};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Record the running time of an expression and log the elapsed time
macro_rules! time {
    ($name: literal, $func_call: expr) => {{
        let start = Instant::now();
        let result = $func_call;
        tracing::debug!("{} took {}ms", $name, start.elapsed().as_millis());
        result
    }};
}

/// The dimensions of the generated sample image
const SAMPLE_SIZE: (u32, u32) = (320, 240);

/// The stem used for the outputs of the generated sample image
const SAMPLE_STEM: &str = "sample";

/// Error cases for loading and decoding an image
#[derive(Debug, Error)]
enum ImageLoadError {
    /// The image file does not exist
    #[error("image file {} was not found", .0.display())]
    NotFound(PathBuf),
    /// Failed to read or decode the image file
    #[error("failed to load the image file {}: {source}", path.display())]
    Decode {
        /// The image file
        path: PathBuf,
        /// The underlying error
        #[source]
        source: image::ImageError,
    },
}

/// Errors that end the program with a failure status
#[derive(Debug, Error)]
pub enum AppError {
    /// The image could not be turned into a pixel grid
    #[error("the image cannot be quantized: {0}")]
    Grid(#[from] QuantizeError),
    /// One or more strategies failed
    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Quantize(Vec<PipelineError>),
    /// The output directory could not be created
    #[error("failed to create the output directory {}: {source}", path.display())]
    OutputDir {
        /// The output directory
        path: PathBuf,
        /// The underlying error
        #[source]
        source: io::Error,
    },
    /// An image could not be saved
    #[error("failed to save {}: {source}", path.display())]
    Save {
        /// The path of the image
        path: PathBuf,
        /// The underlying error
        #[source]
        source: image::ImageError,
    },
    /// The thread pool could not be built
    #[cfg(feature = "threads")]
    #[error("failed to initialize the thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// The image to quantize and the name its outputs are saved under
struct Input {
    /// The image to quantize
    image: RgbImage,
    /// The file stem for the output images
    stem: String,
}

fn main() -> ExitCode {
    let options = Options::parse();

    init_logging(options.verbose);

    let result = run_quantize_and_save(&options);

    // Returning Result<_> uses Debug printing instead of Display
    if let Err(e) = result {
        eprintln!("{e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Log to stderr, filtered by `RUST_LOG` if it is set
fn init_logging(verbose: bool) {
    let default = if verbose { "kquant=debug" } else { "kquant=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .init();
}

/// Builds a thread pool and then runs `quantize_and_save`
#[cfg(feature = "threads")]
fn run_quantize_and_save(options: &Options) -> Result<(), AppError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(usize::from(options.threads))
        .build()?;

    pool.install(|| quantize_and_save(options))
}

/// Runs `quantize_and_save` on a single thread
#[cfg(not(feature = "threads"))]
fn run_quantize_and_save(options: &Options) -> Result<(), AppError> {
    quantize_and_save(options)
}

/// Load an image, quantize it with the selected strategies, and save the results
fn quantize_and_save(options: &Options) -> Result<(), AppError> {
    // Input
    let Input { image, stem } = time!(
        "Image loading",
        load_input(&options.image, &options.output_dir)
    )?;

    let image = if options.pixelize {
        let (width, height) = options.size;
        tracing::info!("Pixelizing the image to {width}x{height}");
        time!("Pixelization", pixelize(&image, options.size))
    } else {
        image
    };

    let grid = ColorGrid::from_rgb_image(&image)?;
    tracing::info!(
        "Quantizing {} pixels ({}x{})",
        grid.len(),
        grid.width(),
        grid.height()
    );

    // Processing
    let results = time!(
        "Quantization",
        quantize_strategies(&grid, options.strategy, &options.quantize_options())
    );

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for (_, result) in results {
        match result {
            Ok(quantized) => succeeded.push(quantized),
            Err(e) => failed.push(e),
        }
    }

    for quantized in &succeeded {
        tracing::info!(
            "{} codebook: {} colors, inertia {:.4}",
            quantized.strategy,
            quantized.codebook.len(),
            quantized.inertia(&grid)
        );
    }

    if !failed.is_empty() && !options.keep_going {
        return Err(AppError::Quantize(failed));
    }

    // Output
    if let Some(format) = options.palette {
        for quantized in &succeeded {
            output::print_palette(quantized, format, options.colorize);
        }
    }

    save_outputs(&image, &succeeded, &stem, options)?;

    if failed.is_empty() {
        Ok(())
    } else {
        Err(AppError::Quantize(failed))
    }
}

/// Run each selected strategy on the grid, concurrently if both are selected
fn quantize_strategies(
    grid: &ColorGrid,
    choice: StrategyChoice,
    options: &QuantizeOptions,
) -> Vec<(Strategy, Result<Quantized, PipelineError>)> {
    match choice {
        StrategyChoice::Both => kquant::quantize_all(grid, options),
        StrategyChoice::Kmeans | StrategyChoice::Random => choice
            .strategies()
            .into_iter()
            .map(|strategy| (strategy, kquant::quantize(grid, strategy, options)))
            .collect(),
    }
}

/// Save each quantized image, and the comparison image if requested
fn save_outputs(
    original: &RgbImage,
    quantized: &[Quantized],
    stem: &str,
    options: &Options,
) -> Result<(), AppError> {
    let images = quantized
        .iter()
        .map(|quantized| quantized.grid.to_rgb_image())
        .collect::<Vec<_>>();

    let comparison = options.compare.then(|| {
        let panels = std::iter::once(original)
            .chain(&images)
            .collect::<Vec<_>>();

        output::comparison(&panels)
    });

    let mut outputs = quantized
        .iter()
        .zip(&images)
        .map(|(quantized, image)| {
            let path = output::output_path(&options.output_dir, stem, quantized.strategy.name());
            (image, path)
        })
        .collect::<Vec<_>>();

    if let Some(comparison) = &comparison {
        outputs.push((
            comparison,
            output::output_path(&options.output_dir, stem, "comparison"),
        ));
    }

    if outputs.is_empty() {
        return Ok(());
    }

    create_output_dir(&options.output_dir)?;
    output::save_pngs(&outputs)
}

/// Create the output directory and any missing parents
fn create_output_dir(dir: &Path) -> Result<(), AppError> {
    fs::create_dir_all(dir).map_err(|source| AppError::OutputDir {
        path: dir.to_owned(),
        source,
    })
}

/// Load the image at the given path, or fall back to a generated sample image.
///
/// The sample image is saved to the output directory so that the outputs can be compared against it.
fn load_input(path: &Path, output_dir: &Path) -> Result<Input, AppError> {
    match load_image(path) {
        Ok(image) => {
            let stem = path
                .file_stem()
                .map_or_else(|| "image".to_owned(), |stem| stem.to_string_lossy().into_owned());

            Ok(Input { image, stem })
        }
        Err(e) => {
            tracing::warn!("{e}, using a generated sample image instead");
            let image = sample_image();
            create_output_dir(output_dir)?;
            output::save_png(&image, &output_dir.join(format!("{SAMPLE_STEM}.png")))?;
            Ok(Input { image, stem: SAMPLE_STEM.to_owned() })
        }
    }
}

/// Load the image at the given path
fn load_image(path: &Path) -> Result<RgbImage, ImageLoadError> {
    if !path.is_file() {
        return Err(ImageLoadError::NotFound(path.to_owned()));
    }

    image::open(path)
        .map(image::DynamicImage::into_rgb8)
        .map_err(|source| ImageLoadError::Decode { path: path.to_owned(), source })
}

/// Resize the image to exactly the given dimensions
fn pixelize(image: &RgbImage, (width, height): (u32, u32)) -> RgbImage {
    imageops::resize(image, width, height, FilterType::CatmullRom)
}

/// Generate a landscape: a sky gradient, a sun, and rolling hills
// Coordinates and channel values stay well within the ranges of the casts
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn sample_image() -> RgbImage {
    let (width, height) = SAMPLE_SIZE;

    RgbImage::from_fn(width, height, |x, y| {
        let fx = x as f32 / width as f32;
        let fy = y as f32 / height as f32;

        let horizon = 0.6 + 0.08 * (fx * 9.0).sin();
        let far_hill = 0.5 + 0.05 * (fx * 4.0 + 1.0).sin();
        let sun = (fx - 0.75).powi(2) + (fy - 0.22).powi(2) < 0.08 * 0.08;

        let rgb = if sun {
            [255.0, 215.0, 90.0]
        } else if fy < far_hill.min(horizon) {
            [80.0 + 110.0 * fy, 140.0 + 90.0 * fy, 235.0]
        } else if fy < horizon {
            [70.0, 110.0 - 30.0 * fy, 90.0]
        } else {
            [40.0 + 60.0 * fy, 150.0 - 50.0 * fy, 50.0 + 20.0 * fx]
        };

        Rgb(rgb.map(|c: f32| c.clamp(0.0, 255.0) as u8))
    })
}
