//! Type definitions for the loan approval pipeline

pub mod application;
pub mod decision;

pub use application::LoanApplicationRecord;
pub use decision::{Decision, DecisionReply, Prediction};
