//! Loan decision data structures

use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Binary outcome of the approval model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    /// Map a classifier label to a decision: 1 approves, anything else rejects.
    pub fn from_label(label: i64) -> Self {
        if label == 1 {
            Decision::Approved
        } else {
            Decision::Rejected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
        }
    }
}

/// Result of running the classifier on one encoded row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub decision: Decision,
    /// Label exactly as returned by the classifier
    pub raw_label: i64,
}

impl Prediction {
    pub fn from_label(raw_label: i64) -> Self {
        Self {
            decision: Decision::from_label(raw_label),
            raw_label,
        }
    }
}

/// Reply sent back for every consumed application.
///
/// A rejection is a `Decided` reply; `Failed` is reserved for applications the
/// pipeline could not evaluate at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DecisionReply {
    Decided {
        reply_id: String,
        application_id: String,
        decision: Decision,
        raw_label: i64,
        timestamp: DateTime<Utc>,
    },
    Failed {
        reply_id: String,
        application_id: Option<String>,
        stage: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DecisionReply {
    /// Reply for a successfully evaluated application
    pub fn decided(application_id: String, prediction: Prediction) -> Self {
        DecisionReply::Decided {
            reply_id: uuid::Uuid::new_v4().to_string(),
            application_id,
            decision: prediction.decision,
            raw_label: prediction.raw_label,
            timestamp: Utc::now(),
        }
    }

    /// Reply for an application that failed encoding or inference
    pub fn failed(application_id: String, error: &PipelineError) -> Self {
        DecisionReply::Failed {
            reply_id: uuid::Uuid::new_v4().to_string(),
            application_id: Some(application_id),
            stage: error.stage().to_string(),
            message: error.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Reply for a payload that could not be parsed into an application
    pub fn malformed(message: String) -> Self {
        DecisionReply::Failed {
            reply_id: uuid::Uuid::new_v4().to_string(),
            application_id: None,
            stage: "request".to_string(),
            message,
            timestamp: Utc::now(),
        }
    }

    pub fn reply_id(&self) -> &str {
        match self {
            DecisionReply::Decided { reply_id, .. } | DecisionReply::Failed { reply_id, .. } => {
                reply_id
            }
        }
    }

    pub fn application_id(&self) -> Option<&str> {
        match self {
            DecisionReply::Decided { application_id, .. } => Some(application_id),
            DecisionReply::Failed { application_id, .. } => application_id.as_deref(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DecisionReply::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EncodingError;

    #[test]
    fn test_decision_from_label() {
        assert_eq!(Decision::from_label(1), Decision::Approved);
        assert_eq!(Decision::from_label(0), Decision::Rejected);
        assert_eq!(Decision::from_label(2), Decision::Rejected);
        assert_eq!(Decision::from_label(-1), Decision::Rejected);
    }

    #[test]
    fn test_decided_reply_json() {
        let reply = DecisionReply::decided("app_1".to_string(), Prediction::from_label(1));
        let json = serde_json::to_value(&reply).unwrap();

        assert_eq!(json["status"], "decided");
        assert_eq!(json["decision"], "approved");
        assert_eq!(json["raw_label"], 1);
        assert_eq!(json["application_id"], "app_1");
    }

    #[test]
    fn test_failed_reply_is_distinct_from_rejection() {
        let error = PipelineError::from(EncodingError::UnknownCategory {
            field: "home_ownership",
            value: "UNKNOWN".to_string(),
        });
        let reply = DecisionReply::failed("app_2".to_string(), &error);
        assert!(reply.is_failure());

        let json = serde_json::to_string(&reply).unwrap();
        let back: DecisionReply = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reply);

        match back {
            DecisionReply::Failed { stage, message, .. } => {
                assert_eq!(stage, "encoding");
                assert!(message.contains("home_ownership"));
            }
            other => panic!("expected failure, got {:?}", other),
        }

        let rejected = DecisionReply::decided("app_3".to_string(), Prediction::from_label(0));
        assert!(!rejected.is_failure());
    }
}
