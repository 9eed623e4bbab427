use ndarray::ArrayView4;
use std::path::Path;
use tract_onnx::prelude::*;

use crate::pipeline::model::{Classifier, InferenceError};

/// ONNX graph executed by tract, optimized once for a fixed input shape.
pub struct OnnxClassifier {
    plan: TypedRunnableModel<TypedModel>,
    input_shape: [usize; 4],
}

impl OnnxClassifier {
    pub fn load(path: &Path, input_shape: [usize; 4]) -> TractResult<Self> {
        let [batch, height, width, channels] = input_shape;
        let plan = tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(batch, height, width, channels)),
            )?
            .into_optimized()?
            .into_runnable()?;
        Ok(Self { plan, input_shape })
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        "onnx"
    }

    fn classify(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_shape(&self.input_shape, &data)
            .map_err(|e| InferenceError::Backend(e.to_string()))?;

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| InferenceError::Backend(e.to_string()))?;
        let scores = outputs
            .first()
            .ok_or_else(|| InferenceError::Backend("model produced no outputs".into()))?
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Backend(e.to_string()))?
            .iter()
            .copied()
            .collect();
        Ok(scores)
    }
}
