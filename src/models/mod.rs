//! Model artifacts: the classifier, the frozen text encoders and their loader

pub mod classifier;
pub mod inference;
pub mod loader;
pub mod text_encoder;

pub use classifier::{Classifier, LabelTensor, OnnxClassifier};
pub use inference::InferenceEngine;
pub use loader::{LoadedArtifacts, ModelLoader};
pub use text_encoder::{CategoryMapEncoder, TextEncoder, UnknownPolicy};
