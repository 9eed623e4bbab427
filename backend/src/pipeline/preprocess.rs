use image::imageops::{self, FilterType};
use image::ImageReader;
use ndarray::{Array4, ArrayView4};
use std::io::Cursor;

use crate::config::{ImageConfig, Normalization};
use crate::error::DiagnosisError;

/// Batch-of-one image tensor laid out `[1, height, width, channels]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor(Array4<f32>);

impl NormalizedTensor {
    pub fn new(array: Array4<f32>) -> Self {
        Self(array)
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }
}

/// Turns uploaded bytes into the tensor the classifier was trained on.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    height: u32,
    width: u32,
    normalization: Normalization,
}

impl Preprocessor {
    pub fn new(config: &ImageConfig) -> Self {
        Self {
            height: config.height(),
            width: config.width(),
            normalization: config.normalization,
        }
    }

    pub fn preprocess(&self, image: &[u8]) -> Result<NormalizedTensor, DiagnosisError> {
        let decoded = ImageReader::new(Cursor::new(image))
            .with_guessed_format()
            .map_err(|e| DiagnosisError::UnreadableImage(e.to_string()))?
            .decode()
            .map_err(|e| DiagnosisError::UnreadableImage(e.to_string()))?;

        let rgb = decoded.to_rgb8();
        let resized = imageops::resize(&rgb, self.width, self.height, FilterType::Nearest);

        let shape = (1, self.height as usize, self.width as usize, 3);
        let mode = self.normalization;
        let tensor = Array4::from_shape_fn(shape, |(_, y, x, c)| {
            normalize(resized.get_pixel(x as u32, y as u32).0[c], mode)
        });

        Ok(NormalizedTensor::new(tensor))
    }
}

fn normalize(value: u8, mode: Normalization) -> f32 {
    let value = f32::from(value);
    match mode {
        Normalization::Inception => value / 127.5 - 1.0,
        Normalization::Unit => value / 255.0,
        Normalization::Raw => value,
    }
}
