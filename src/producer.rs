//! NATS message producer for loan decisions

use crate::types::decision::DecisionReply;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Producer for publishing decision replies to NATS
#[derive(Clone)]
pub struct DecisionProducer {
    client: Client,
    subject: String,
}

impl DecisionProducer {
    /// Create a new decision producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a reply, to the requester's reply subject when there is one
    pub async fn publish(&self, reply: &DecisionReply, reply_to: Option<Subject>) -> Result<()> {
        let payload = serde_json::to_vec(reply)?;
        let subject = reply_to.unwrap_or_else(|| Subject::from(self.subject.as_str()));

        self.client
            .publish(subject.clone(), payload.into())
            .await?;

        debug!(
            reply_id = %reply.reply_id(),
            application_id = reply.application_id().unwrap_or("-"),
            subject = %subject,
            "Published decision reply"
        );

        Ok(())
    }

    /// Get the default subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
