pub mod adapter;
pub mod backend;
pub mod events;
pub mod inference;
#[cfg(feature = "keras")]
pub mod keras;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod processor;
pub mod tflite;
