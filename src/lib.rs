//! Loan Approval Pipeline Library
//!
//! Encodes loan applications into the feature layout of a pre-trained
//! approval model and turns the model's label into an approve/reject
//! decision, served over NATS.

pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_encoder;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod producer;
pub mod schema;
pub mod types;

pub use config::AppConfig;
pub use consumer::ApplicationConsumer;
pub use error::{EncodingError, InferenceError, PipelineError, SchemaError};
pub use feature_encoder::{EncodedFeatureRow, FeatureEncoder};
pub use models::inference::InferenceEngine;
pub use pipeline::DecisionPipeline;
pub use producer::DecisionProducer;
pub use schema::EncodingSchema;
pub use types::{Decision, DecisionReply, LoanApplicationRecord, Prediction};
