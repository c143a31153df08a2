use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use image::{ImageFormat, Rgb};

use crate::engine::ProcessingMode;
use crate::errors::{CutoutError, Result};
use crate::imageops_ai::{parse_hex_color, ChromaKeyParams, PersonMaskParams};

/// Background separation strategy selected on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Key out a solid background color.
    Chroma,
    /// Cut out people with a segmentation model.
    Person,
}

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Image file or directory of images.
    pub input: PathBuf,

    #[arg(default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = Mode::Person)]
    pub mode: Mode,

    /// ONNX person segmentation model, required in person mode.
    #[arg(short, long)]
    pub model_path: Option<PathBuf>,

    #[arg(short, long, default_value_t = 0)]
    pub device_id: i32,

    #[arg(short, long, default_value = "png", value_parser = check_format)]
    pub format: String,

    /// Background color to key out, `#rgb` or `#rrggbb`.
    #[arg(long, default_value = "#00ff00", value_parser = parse_hex_color)]
    pub key_color: Rgb<u8>,

    /// Color distance treated as background in chroma mode.
    #[arg(long, default_value_t = 40)]
    pub tolerance: u32,

    /// Minimum person confidence, in percent.
    #[arg(long, default_value_t = 55, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub confidence: u8,

    /// Edge feathering strength in person mode.
    #[arg(long, default_value_t = 0)]
    pub feather: u32,

    /// Images wider than this are downscaled first; 0 disables the bound.
    #[arg(long, default_value_t = 900)]
    pub max_width: u32,

    /// Images taller than this are downscaled first; 0 disables the bound.
    #[arg(long, default_value_t = 600)]
    pub max_height: u32,

    #[arg(long)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::parse()
    }

    pub const fn processing_mode(&self) -> ProcessingMode {
        match self.mode {
            Mode::Chroma => {
                ProcessingMode::ChromaKey(ChromaKeyParams::new(self.key_color, self.tolerance))
            }
            Mode::Person => {
                ProcessingMode::Person(PersonMaskParams::new(self.confidence, self.feather))
            }
        }
    }

    pub fn output_format(&self) -> ImageFormat {
        ImageFormat::from_extension(&self.format).unwrap_or(ImageFormat::Png)
    }

    /// Checks settings that depend on each other or on the filesystem.
    pub fn validate(&self) -> Result<()> {
        if !self.input.exists() {
            return Err(CutoutError::FileSystem {
                path: self.input.clone(),
                operation: "check input".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "input does not exist",
                ),
            });
        }
        if self.mode == Mode::Person {
            let model_path = self.model_path.as_ref().ok_or_else(|| CutoutError::Validation {
                field: "model_path".to_string(),
                reason: "is required in person mode".to_string(),
            })?;
            if !model_path.is_file() {
                return Err(CutoutError::Validation {
                    field: "model_path".to_string(),
                    reason: format!("{} is not a file", model_path.display()),
                });
            }
        }
        Ok(())
    }
}

fn supports_alpha(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp | ImageFormat::Tiff
    )
}

fn check_format(s: &str) -> std::result::Result<String, String> {
    let supported: Vec<_> = ImageFormat::all()
        .filter(|f| f.writing_enabled() && supports_alpha(*f))
        .flat_map(|f| f.extensions_str())
        .map(|s| format!("`{}`", s))
        .collect();
    let supported_message = format!("Supported formats: {}", supported.join(", "));

    let format = ImageFormat::from_extension(s)
        .ok_or(format!("{} is not supported. {}", s, supported_message))?;
    if !format.writing_enabled() || !supports_alpha(format) {
        return Err(format!("{} is not supported. {}", s, supported_message));
    }

    Ok(s.to_string())
}
