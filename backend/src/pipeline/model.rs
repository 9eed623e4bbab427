use ndarray::ArrayView4;
use shared::DiseaseClass;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use strum::EnumCount;

use crate::config::{ImageConfig, ModelBackend, ModelConfig, OutputActivation};
use crate::error::StartupError;
use crate::pipeline::onnx::OnnxClassifier;
use crate::pipeline::preprocess::NormalizedTensor;

/// Slack allowed around `[0, 1]` for float drift in the model's softmax.
const PROBABILITY_TOLERANCE: f32 = 1e-4;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("expected shape {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("{0}")]
    InvalidOutput(String),
    #[error("{0}")]
    Backend(String),
}

/// A loaded network. Implementations only need to be `Send`; the engine
/// never calls one from two threads at once.
pub trait Classifier: Send {
    fn name(&self) -> &str;

    fn classify(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError>;
}

/// One score per class, in class order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityVector(Vec<f32>);

impl ProbabilityVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index and value of the largest score. On ties the lowest index wins.
    pub fn argmax(&self) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (index, &score) in self.0.iter().enumerate() {
            if score.is_nan() {
                continue;
            }
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }
        best
    }
}

/// Owns the process-wide classifier. `classify` is single-flight: the
/// classifier sits behind one mutex, so at most one inference runs at a
/// time regardless of how many requests are in progress.
pub struct InferenceEngine {
    classifier: Mutex<Box<dyn Classifier>>,
    backend_name: String,
    input_shape: [usize; 4],
    num_classes: usize,
    activation: OutputActivation,
}

impl InferenceEngine {
    pub fn load(model: &ModelConfig, image: &ImageConfig) -> Result<Self, StartupError> {
        let input_shape = image.tensor_shape();
        log::info!(
            "Loading {:?} model from {} (input {:?})",
            model.backend,
            model.path.display(),
            input_shape
        );

        let classifier: Box<dyn Classifier> = match model.backend {
            ModelBackend::Onnx => Box::new(
                OnnxClassifier::load(&model.path, input_shape)
                    .map_err(|e| load_failure(&model.path, e))?,
            ),
            ModelBackend::Torch => load_torch(&model.path)?,
        };

        Ok(Self::new(
            classifier,
            input_shape,
            DiseaseClass::COUNT,
            model.activation,
        ))
    }

    pub fn new(
        classifier: Box<dyn Classifier>,
        input_shape: [usize; 4],
        num_classes: usize,
        activation: OutputActivation,
    ) -> Self {
        let backend_name = classifier.name().to_string();
        Self {
            classifier: Mutex::new(classifier),
            backend_name,
            input_shape,
            num_classes,
            activation,
        }
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn classify(&self, tensor: &NormalizedTensor) -> Result<ProbabilityVector, InferenceError> {
        if tensor.shape() != self.input_shape.as_slice() {
            return Err(InferenceError::ShapeMismatch {
                expected: self.input_shape.to_vec(),
                actual: tensor.shape().to_vec(),
            });
        }

        let raw = {
            // A panic elsewhere cannot leave a read-only classifier half-updated.
            let classifier = self
                .classifier
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let started = Instant::now();
            let raw = classifier.classify(tensor.view())?;
            log::debug!(
                "{} inference took {:.1} ms",
                self.backend_name,
                started.elapsed().as_secs_f64() * 1000.0
            );
            raw
        };

        if raw.len() != self.num_classes {
            return Err(InferenceError::ShapeMismatch {
                expected: vec![self.num_classes],
                actual: vec![raw.len()],
            });
        }

        let scores = match self.activation {
            OutputActivation::Probabilities => raw,
            OutputActivation::Logits => softmax(&raw),
        };
        validate_probabilities(scores).map(ProbabilityVector::new)
    }
}

fn load_failure(path: &Path, reason: impl std::fmt::Display) -> StartupError {
    StartupError::ModelLoadFailure {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(feature = "torch")]
fn load_torch(path: &Path) -> Result<Box<dyn Classifier>, StartupError> {
    let classifier =
        crate::pipeline::torch::TorchClassifier::load(path).map_err(|e| load_failure(path, e))?;
    Ok(Box::new(classifier))
}

#[cfg(not(feature = "torch"))]
fn load_torch(path: &Path) -> Result<Box<dyn Classifier>, StartupError> {
    Err(load_failure(
        path,
        "torch backend requested but this build lacks the `torch` feature",
    ))
}

/// Softmax with the max subtracted first so large logits cannot overflow.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn validate_probabilities(scores: Vec<f32>) -> Result<Vec<f32>, InferenceError> {
    let range = -PROBABILITY_TOLERANCE..=1.0 + PROBABILITY_TOLERANCE;
    if let Some((index, score)) = scores
        .iter()
        .enumerate()
        .find(|(_, s)| !s.is_finite() || !range.contains(*s))
    {
        return Err(InferenceError::InvalidOutput(format!(
            "score {} at index {} is not a probability",
            score, index
        )));
    }
    Ok(scores.into_iter().map(|s| s.clamp(0.0, 1.0)).collect())
}
