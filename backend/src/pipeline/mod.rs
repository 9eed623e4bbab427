pub mod model;
pub mod onnx;
pub mod preprocess;
pub mod resolver;
#[cfg(feature = "torch")]
pub mod torch;
