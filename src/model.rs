use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::{buffer::ConvertBuffer, imageops, imageops::FilterType, RgbImage, RgbaImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
    value::TensorRef,
};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::errors::{CutoutError, Result};
use crate::raster::{resize_mask, AlphaMask, RasterImage};
use crate::traits::SegmentationProvider;

/// Spatial size used when the model declares dynamic input dimensions.
const DEFAULT_INPUT_SIZE: u32 = 256;

/// Axis order of the model's image input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// `1x3xHxW`
    Nchw,
    /// `1xHxWx3`
    Nhwc,
}

struct InferenceSession {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl InferenceSession {
    fn run(&self, tensor: ArrayView4<f32>) -> Result<(Vec<usize>, Vec<f32>)> {
        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(&tensor.as_standard_layout())?
        ])?;
        let mask = outputs[self.output_name.as_str()].try_extract_array::<f32>()?;
        Ok((mask.shape().to_vec(), mask.iter().copied().collect()))
    }
}

/// Person segmentation with an ONNX model.
///
/// Expects an RGB float input in `[0, 1]`, laid out NCHW or NHWC, and a
/// single-channel probability output. Inference runs on tokio's blocking pool.
pub struct OnnxSegmentationModel {
    inference: Arc<InferenceSession>,
    layout: InputLayout,
    input_width: u32,
    input_height: u32,
}

fn model_error<E: Display>(operation: &str) -> impl FnOnce(E) -> CutoutError + '_ {
    move |e| CutoutError::model(operation, e.to_string())
}

impl OnnxSegmentationModel {
    pub fn new(model_path: &Path, device_id: i32) -> Result<Self> {
        let session = SessionBuilder::new()
            .map_err(model_error("session builder initialization"))?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])
            .map_err(model_error("execution provider registration"))?
            .commit_from_file(model_path)
            .map_err(|e| {
                CutoutError::model(
                    format!("load model file {}", model_path.display()),
                    e.to_string(),
                )
            })?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| CutoutError::model("read model inputs", "model has no inputs"))?;
        let output = session
            .outputs
            .first()
            .ok_or_else(|| CutoutError::model("read model outputs", "model has no outputs"))?;

        let (layout, input_width, input_height) = match input.input_type.tensor_shape() {
            Some(shape) => input_layout(shape).ok_or_else(|| {
                CutoutError::model(
                    "read model inputs",
                    format!("unsupported input shape {:?}", shape.to_vec()),
                )
            })?,
            None => (InputLayout::Nchw, DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE),
        };
        let input_name = input.name.clone();
        let output_name = output.name.clone();

        info!(
            model = %model_path.display(),
            input = %input_name,
            output = %output_name,
            ?layout,
            "loaded segmentation model ({input_width}x{input_height})"
        );

        Ok(Self {
            inference: Arc::new(InferenceSession {
                session: Mutex::new(session),
                input_name,
                output_name,
            }),
            layout,
            input_width,
            input_height,
        })
    }

    pub const fn input_size(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }

    pub const fn input_layout(&self) -> InputLayout {
        self.layout
    }

    /// Runs the model on the calling thread, returning the output shape and
    /// its values.
    pub fn predict(&self, tensor: ArrayView4<f32>) -> Result<(Vec<usize>, Vec<f32>)> {
        self.inference.run(tensor)
    }
}

#[async_trait]
impl SegmentationProvider for OnnxSegmentationModel {
    async fn segment(&self, image: &RasterImage) -> Result<AlphaMask> {
        let inference = Arc::clone(&self.inference);
        let pixels = image.pixels().clone();
        let (layout, width, height) = (self.layout, self.input_width, self.input_height);
        let (shape, values) = off_runtime("run inference", move || {
            let tensor = preprocess(&pixels, width, height, layout);
            inference.run(tensor.view())
        })
        .await?;
        debug!(?shape, "segmentation output");
        let (mask_width, mask_height) = mask_dimensions(&shape).ok_or_else(|| {
            CutoutError::model(
                "interpret model output",
                format!("unsupported output shape {shape:?}"),
            )
        })?;
        postprocess_mask(values, mask_width, mask_height, image.width(), image.height())
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

/// Runs `task` on tokio's blocking pool.
async fn off_runtime<T, F>(operation: &'static str, task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(model_error(operation))?
}

fn spatial(dimension: i64) -> u32 {
    u32::try_from(dimension)
        .ok()
        .filter(|&size| size > 0)
        .unwrap_or(DEFAULT_INPUT_SIZE)
}

/// Detects the axis order of a 4-d RGB input and its width and height.
///
/// A dynamic channel axis is read as NCHW.
fn input_layout(shape: &[i64]) -> Option<(InputLayout, u32, u32)> {
    match *shape {
        [_, 3, h, w] => Some((InputLayout::Nchw, spatial(w), spatial(h))),
        [_, h, w, 3] => Some((InputLayout::Nhwc, spatial(w), spatial(h))),
        [_, c, h, w] if c <= 0 => Some((InputLayout::Nchw, spatial(w), spatial(h))),
        _ => None,
    }
}

/// Resizes to the model input and lays the pixels out as a `1x3xHxW` or
/// `1xHxWx3` tensor in `[0, 1]`.
pub fn preprocess(
    image: &RgbaImage,
    width: u32,
    height: u32,
    layout: InputLayout,
) -> Array4<f32> {
    let rgb: RgbImage = image.convert();
    let resized = imageops::resize(&rgb, width, height, FilterType::Triangle);
    let chw = resized.as_ndarray3();
    let tensor = match layout {
        InputLayout::Nchw => chw.slice_move(s![NewAxis, .., .., ..]),
        InputLayout::Nhwc => chw.permuted_axes([1, 2, 0]).slice_move(s![NewAxis, .., .., ..]),
    };
    tensor.mapv(|v| f32::from(v) / 255.0)
}

/// Width and height of a single-channel mask output.
fn mask_dimensions(shape: &[usize]) -> Option<(u32, u32)> {
    let (height, width) = match *shape {
        [1, 1, h, w] | [1, h, w, 1] | [1, h, w] | [h, w] => (h, w),
        _ => return None,
    };
    Some((u32::try_from(width).ok()?, u32::try_from(height).ok()?))
}

/// Builds a probability mask from raw model output, stretched to the source
/// size and clamped to `[0, 1]`.
pub fn postprocess_mask(
    values: Vec<f32>,
    mask_width: u32,
    mask_height: u32,
    width: u32,
    height: u32,
) -> Result<AlphaMask> {
    let mask = AlphaMask::from_raw(mask_width, mask_height, values).ok_or_else(|| {
        CutoutError::model("build mask", "output length does not match its shape")
    })?;
    let mut mask = resize_mask(&mask, width, height);
    for value in mask.iter_mut() {
        *value = value.max(0.0).min(1.0);
    }
    Ok(mask)
}
