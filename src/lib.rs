pub mod config;
pub mod engine;
pub mod errors;
pub mod imageops_ai;
pub mod mocks;
pub mod model;
pub mod raster;
pub mod traits;

use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

pub use config::{Config, Mode};
pub use engine::{Composite, Cutout, MaskEngine, ProcessingMode};
pub use errors::{CutoutError, Result};
pub use imageops_ai::{ChromaKeyParams, PersonMaskParams};
pub use model::OnnxSegmentationModel;
pub use raster::{AlphaMask, RasterImage, SourceId};
pub use traits::SegmentationProvider;

/// Outcome counts of a batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ProcessSummary {
    pub const fn total(&self) -> usize {
        self.processed + self.skipped + self.failed
    }
}

/// Runs one cutout per input image and writes the results.
///
/// Every image gets its own [`MaskEngine`] session; a failure on one file is
/// logged and counted without stopping the run.
pub struct CutoutProcessor {
    provider: Option<Box<dyn SegmentationProvider>>,
    config: Config,
}

impl CutoutProcessor {
    pub fn new(config: Config, provider: Option<Box<dyn SegmentationProvider>>) -> Self {
        Self { provider, config }
    }

    pub async fn process_input(&self) -> Result<ProcessSummary> {
        let input_path = &self.config.input;
        let output_path = &self.config.output_dir;

        if !input_path.exists() {
            return Err(CutoutError::FileSystem {
                path: input_path.clone(),
                operation: "check input".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "input does not exist"),
            });
        }

        fs::create_dir_all(output_path).map_err(|e| CutoutError::FileSystem {
            path: output_path.clone(),
            operation: "create output directory".to_string(),
            source: e,
        })?;

        let image_files = self.collect_image_files(input_path);
        if image_files.is_empty() {
            info!(input = %input_path.display(), "no images to process");
            return Ok(ProcessSummary::default());
        }

        let pb = ProgressBar::new(image_files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .map_err(|e| CutoutError::Configuration {
                    message: e.to_string(),
                })?
                .progress_chars("#>-"),
        );

        let mode = self.config.processing_mode();
        let mut summary = ProcessSummary::default();
        for input_file in &image_files {
            match self.process_single_image(input_file, &mode).await {
                Ok(true) => summary.processed += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    error!(file = %input_file.display(), error = %e, "failed to process image");
                    summary.failed += 1;
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "finished"
        );
        Ok(summary)
    }

    fn collect_image_files(&self, input_path: &Path) -> Vec<PathBuf> {
        if input_path.is_file() {
            return if self.is_supported_image_format(input_path) {
                vec![input_path.to_path_buf()]
            } else {
                Vec::new()
            };
        }

        WalkDir::new(input_path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.is_supported_image_format(e.path()))
            .map(|e| e.into_path())
            .collect()
    }

    /// Whether `path` has the extension of a format this build can decode.
    pub fn is_supported_image_format(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
            .is_some_and(|format| format.reading_enabled())
    }

    /// Cuts out one image. Returns `false` when there was nothing to write.
    async fn process_single_image(
        &self,
        input_file: &Path,
        mode: &ProcessingMode,
    ) -> Result<bool> {
        let image = RasterImage::open(input_file)?
            .fit_within(self.config.max_width, self.config.max_height);

        let engine = MaskEngine::new();
        let cutout = engine
            .process(&image, mode, self.provider.as_deref())
            .await?;
        let Some(composite) = cutout.into_composite() else {
            warn!(file = %input_file.display(), "nothing to cut out, skipping");
            return Ok(false);
        };

        let output_file = self.output_path(input_file)?;
        if let Some(parent) = output_file.parent() {
            fs::create_dir_all(parent).map_err(|e| CutoutError::FileSystem {
                path: parent.to_path_buf(),
                operation: "create output directory".to_string(),
                source: e,
            })?;
        }

        let bytes = raster::encode(&composite.image, self.config.output_format())?;
        fs::write(&output_file, bytes).map_err(|e| CutoutError::FileSystem {
            path: output_file.clone(),
            operation: "write cutout".to_string(),
            source: e,
        })?;
        debug!(from = %input_file.display(), to = %output_file.display(), "wrote cutout");

        Ok(true)
    }

    pub fn get_relative_path(&self, input_file: &Path) -> Result<PathBuf> {
        let input = &self.config.input;
        let relative = if input.is_file() {
            input_file.file_name().map(PathBuf::from)
        } else {
            input_file.strip_prefix(input).ok().map(Path::to_path_buf)
        };
        relative.ok_or_else(|| CutoutError::FileSystem {
            path: input_file.to_path_buf(),
            operation: "resolve relative path".to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "file is not inside the input directory",
            ),
        })
    }

    pub fn output_path(&self, input_file: &Path) -> Result<PathBuf> {
        Ok(self
            .config
            .output_dir
            .join(self.get_relative_path(input_file)?)
            .with_extension(&self.config.format))
    }
}
