//! Saving, comparing, and printing the quantized images

use crate::{
    cli::{ColorizeOutput, FormatOutput},
    AppError,
};
use colored::Colorize;
use image::{imageops, ImageError, ImageFormat, Rgb, RgbImage};
use kquant::Quantized;
use palette::Srgb;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// The white space between images in the comparison image
const GUTTER: u32 = 8;

/// The path of an output image: `<dir>/<stem>_<suffix>.png`
pub fn output_path(dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{stem}_{suffix}.png"))
}

/// The temporary file an output is written to before being renamed into place
fn partial_path(path: &Path) -> PathBuf {
    path.with_extension("png.partial")
}

/// Remove files left behind by a failed save; they may not all exist
fn remove_all<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}

/// Save an image as a png.
pub fn save_png(image: &RgbImage, path: &Path) -> Result<(), AppError> {
    save_pngs(&[(image, path.to_owned())])
}

/// Save all images as pngs, or none of them.
///
/// Every image is first written to a temporary file next to its path.
/// Only once all of them were written are they renamed into place,
/// so no path ever holds a partially written image and a failure leaves no outputs behind.
pub fn save_pngs(images: &[(&RgbImage, PathBuf)]) -> Result<(), AppError> {
    let partials = images
        .iter()
        .map(|(_, path)| partial_path(path))
        .collect::<Vec<_>>();

    for ((image, path), partial) in images.iter().zip(&partials) {
        if let Err(source) = image.save_with_format(partial, ImageFormat::Png) {
            remove_all(&partials);
            return Err(AppError::Save { path: path.clone(), source });
        }
    }

    for (i, ((_, path), partial)) in images.iter().zip(&partials).enumerate() {
        if let Err(e) = fs::rename(partial, path) {
            remove_all(&partials[i..]);
            remove_all(images[..i].iter().map(|(_, path)| path));
            return Err(AppError::Save { path: path.clone(), source: ImageError::IoError(e) });
        }
    }

    for (_, path) in images {
        tracing::info!("Saved {}", path.display());
    }

    Ok(())
}

/// Place the images side by side from left to right, separated by a white gutter
pub fn comparison(images: &[&RgbImage]) -> RgbImage {
    let gutters = u32::try_from(images.len().saturating_sub(1)).unwrap_or(u32::MAX);
    let width = images.iter().map(|image| image.width()).sum::<u32>() + GUTTER * gutters;
    let height = images.iter().map(|image| image.height()).max().unwrap_or(0);

    let mut canvas = RgbImage::from_pixel(width, height, Rgb([u8::MAX; 3]));
    let mut x = 0;
    for image in images {
        imageops::replace(&mut canvas, *image, i64::from(x), 0);
        x += image.width() + GUTTER;
    }

    canvas
}

/// The codebook colors of a quantized image, sorted by descending number of pixels
pub fn sorted_colors(quantized: &Quantized) -> Vec<Srgb<u8>> {
    let mut colors = quantized
        .codebook
        .colors()
        .iter()
        .zip(&quantized.counts)
        .collect::<Vec<_>>();

    colors.sort_by_key(|&(_, &count)| std::cmp::Reverse(count));

    colors
        .into_iter()
        .map(|(color, _)| color.into_format())
        .collect()
}

/// Print the codebook of a quantized image based off the provided options
pub fn print_palette(
    quantized: &Quantized,
    output: FormatOutput,
    colorize: Option<ColorizeOutput>,
) {
    let colors = sorted_colors(quantized);

    let line = match output {
        FormatOutput::Hex => colorize_format(&colors, colorize, " ", |color| format!("{color:X}")),

        FormatOutput::Rgb => colorize_format(&colors, colorize, " ", |color| {
            format!("({},{},{})", color.red, color.green, color.blue)
        }),

        FormatOutput::Swatch => format_colors(&colors, "", |color| {
            "   "
                .on_truecolor(color.red, color.green, color.blue)
                .to_string()
        }),
    };

    println!("{}: {line}", quantized.strategy);
}

/// Format a line of colors using the given format
fn format_colors(
    colors: &[Srgb<u8>],
    delimiter: &str,
    format: impl Fn(Srgb<u8>) -> String,
) -> String {
    colors
        .iter()
        .map(|&color| format(color))
        .collect::<Vec<_>>()
        .join(delimiter)
}

/// Format and then colorize the text for all colors
fn colorize_format(
    colors: &[Srgb<u8>],
    colorize: Option<ColorizeOutput>,
    delimiter: &str,
    format: impl Fn(Srgb<u8>) -> String,
) -> String {
    match colorize {
        Some(ColorizeOutput::Fg) => format_colors(colors, delimiter, |color| {
            format(color)
                .truecolor(color.red, color.green, color.blue)
                .to_string()
        }),

        Some(ColorizeOutput::Bg) => format_colors(colors, delimiter, |color| {
            format(color)
                .on_truecolor(color.red, color.green, color.blue)
                .to_string()
        }),

        None => format_colors(colors, delimiter, format),
    }
}
