use backend::config::{ImageConfig, OutputActivation};
use backend::pipeline::model::{Classifier, InferenceEngine, InferenceError};
use backend::pipeline::preprocess::Preprocessor;
use backend::registry::ClassRegistry;
use backend::service::DiagnosisService;
use backend::storage::upload_store::UploadStore;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::{ArrayView4, Axis};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const BOUNDARY: &str = "----plantguard-test-boundary";

/// Stand-in for the trained network: green-dominant leaves are healthy,
/// red-dominant leaves have anthracnose, anything else is die back.
pub struct FixtureClassifier {
    pub calls: Arc<AtomicUsize>,
}

impl Classifier for FixtureClassifier {
    fn name(&self) -> &str {
        "fixture"
    }

    fn classify(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let means: Vec<f32> = (0..3)
            .map(|c| {
                let channel = input.index_axis(Axis(3), c);
                channel.sum() / channel.len() as f32
            })
            .collect();
        let (red, green, blue) = (means[0], means[1], means[2]);

        let (top, score) = if green > red && green > blue {
            (5, 0.93)
        } else if red > green && red > blue {
            (0, 0.88)
        } else {
            (3, 0.6)
        };
        let rest = (1.0 - score) / 5.0;
        Ok((0..6).map(|i| if i == top { score } else { rest }).collect())
    }
}

pub fn fixture_service(upload_dir: &Path, calls: Arc<AtomicUsize>) -> DiagnosisService {
    fixture_service_with_shape(upload_dir, calls, ImageConfig::default().tensor_shape())
}

pub fn fixture_service_with_shape(
    upload_dir: &Path,
    calls: Arc<AtomicUsize>,
    engine_shape: [usize; 4],
) -> DiagnosisService {
    let engine = InferenceEngine::new(
        Box::new(FixtureClassifier { calls }),
        engine_shape,
        6,
        OutputActivation::Probabilities,
    );
    DiagnosisService::new(
        engine,
        ClassRegistry::embedded().unwrap(),
        Preprocessor::new(&ImageConfig::default()),
        UploadStore::new(upload_dir),
    )
}

fn leaf(color: [u8; 3], format: ImageFormat) -> Vec<u8> {
    let mut img = RgbImage::from_pixel(320, 240, Rgb(color));
    // A darker vein so the fixture is not a flat fill.
    for x in 0..320 {
        img.put_pixel(x, 120, Rgb([color[0] / 2, color[1] / 2, color[2] / 2]));
    }
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn healthy_leaf_png() -> Vec<u8> {
    leaf([62, 168, 71], ImageFormat::Png)
}

pub fn anthracnose_leaf_jpeg() -> Vec<u8> {
    leaf([150, 72, 38], ImageFormat::Jpeg)
}

pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub data: &'a [u8],
}

pub fn multipart_body(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let disposition = match part.filename {
            Some(filename) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.name, filename
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name),
        };
        body.extend_from_slice(disposition.as_bytes());
        if part.filename.is_some() {
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

pub fn file_part<'a>(filename: &'a str, data: &'a [u8]) -> Part<'a> {
    Part {
        name: "file",
        filename: Some(filename),
        data,
    }
}
