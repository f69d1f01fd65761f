//! ONNX model plumbing shared by the detection and mesh stages

use image::imageops::FilterType;
use image::{GenericImageView, Rgb};
use tract_onnx::prelude::*;

use crate::MonitorError;

pub(crate) type OnnxModel = TypedRunnableModel<TypedModel>;

/// Load an NHWC model taking a single `1 x edge x edge x 3` f32 input
pub(crate) fn load(path: &str, edge: usize) -> Result<OnnxModel, MonitorError> {
    tract_onnx::onnx()
        .model_for_path(path)
        .and_then(|m| m.with_input_fact(0, f32::fact([1, edge, edge, 3]).into()))
        .and_then(|m| m.into_optimized())
        .and_then(|m| m.into_runnable())
        .map_err(|e| MonitorError::ModelLoad(format!("{}: {}", path, e)))
}

/// Resize `img` to `edge` x `edge` and lay it out as a `1 x edge x edge x 3`
/// tensor, mapping each channel value through `scale`
pub(crate) fn image_tensor<I>(img: &I, edge: usize, scale: impl Fn(u8) -> f32) -> Tensor
where
    I: GenericImageView<Pixel = Rgb<u8>>,
{
    let size = edge as u32;
    let resized = image::imageops::resize(img, size, size, FilterType::Triangle);

    tract_ndarray::Array4::<f32>::from_shape_fn((1, edge, edge, 3), |(_, y, x, c)| {
        scale(resized.get_pixel(x as u32, y as u32)[c])
    })
    .into()
}

/// Run the model and flatten every output to f32s
pub(crate) fn run(model: &OnnxModel, input: Tensor) -> Result<Vec<Vec<f32>>, MonitorError> {
    let outputs = model
        .run(tvec!(input.into()))
        .map_err(|e| MonitorError::Inference(e.to_string()))?;

    outputs
        .iter()
        .map(|output| {
            output
                .to_array_view::<f32>()
                .map(|view| view.iter().copied().collect())
                .map_err(|e| MonitorError::Inference(e.to_string()))
        })
        .collect()
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
