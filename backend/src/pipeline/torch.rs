use ndarray::ArrayView4;
use std::path::Path;
use tch::{CModule, Device, Kind, Tensor};

use crate::pipeline::model::{Classifier, InferenceError};

/// TorchScript module, on CUDA when one is available.
pub struct TorchClassifier {
    module: CModule,
    device: Device,
}

impl TorchClassifier {
    pub fn load(path: &Path) -> Result<Self, tch::TchError> {
        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(path, device)?;
        Ok(Self { module, device })
    }
}

impl Classifier for TorchClassifier {
    fn name(&self) -> &str {
        "torch"
    }

    fn classify(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = input.iter().copied().collect();

        // TorchScript vision models take NCHW.
        let tensor = Tensor::from_slice(&data)
            .reshape(shape.as_slice())
            .permute([0, 3, 1, 2])
            .to_device(self.device);

        let output = tch::no_grad(|| self.module.forward_ts(&[tensor]))
            .map_err(|e| InferenceError::Backend(e.to_string()))?;
        let output_flat = output
            .to_kind(Kind::Float)
            .to_device(Device::Cpu)
            .reshape([-1]);

        Vec::<f32>::try_from(&output_flat).map_err(|e| InferenceError::Backend(e.to_string()))
    }
}
