//! Test Application Producer
//!
//! Sends randomised loan applications to the pipeline over NATS request/reply
//! and prints the decisions that come back.

use anyhow::{Context, Result};
use loan_approval_pipeline::schema::EncodingSchema;
use loan_approval_pipeline::{AppConfig, DecisionReply, LoanApplicationRecord};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

const EMP_TITLES: [&str; 6] = [
    "Marketing / Tech / Business",
    "Teacher",
    "Registered Nurse",
    "Manager",
    "Driver",
    "Software Engineer",
];

const LOAN_TITLES: [&str; 4] = [
    "Personal Loan",
    "Debt consolidation",
    "Credit card refinancing",
    "Home improvement",
];

/// Application generator for testing
struct ApplicationGenerator {
    rng: rand::rngs::ThreadRng,
    schema: EncodingSchema,
    counter: u64,
}

impl ApplicationGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            schema: EncodingSchema::builtin(),
            counter: 0,
        }
    }

    fn pick(&mut self, options: &[&str]) -> String {
        options
            .choose(&mut self.rng)
            .map(|s| s.to_string())
            .unwrap_or_default()
    }

    fn pick_owned(&mut self, options: &[String]) -> String {
        options.choose(&mut self.rng).cloned().unwrap_or_default()
    }

    /// Generate an application within every field's domain
    fn generate(&mut self) -> LoanApplicationRecord {
        self.counter += 1;
        let mut record = LoanApplicationRecord::sample();

        let grades: Vec<String> = self.schema.grade.labels().map(str::to_string).collect();
        let emp_lengths: Vec<String> = self.schema.emp_length.labels().map(str::to_string).collect();
        let ownership: Vec<String> = self.schema.home_ownership.labels().map(str::to_string).collect();
        let purposes: Vec<String> = self.schema.purpose.labels().map(str::to_string).collect();

        record.application_id = format!("app_{:012}", self.counter);
        record.loan_amnt = (self.rng.gen_range(1..=80) * 500) as f64;
        record.term = self.pick(&["36 months", "60 months"]);
        record.int_rate = (self.rng.gen_range(5.0..30.0_f64) * 100.0).round() / 100.0;
        record.installment = (record.loan_amnt / 36.0 * 1.1 * 100.0).round() / 100.0;
        record.grade = self.pick_owned(&grades);
        record.sub_grade = self.rng.gen_range(1..=5).to_string();
        record.emp_title = self.pick(&EMP_TITLES);
        record.emp_length = self.pick_owned(&emp_lengths);
        record.home_ownership = self.pick_owned(&ownership);
        record.annual_inc = (self.rng.gen_range(20..=250) * 1000) as f64;
        record.verification_status =
            self.pick(&["Verified", "Not Verified", "Source Verified"]);
        record.issue_d = format!(
            "{}-{:02}",
            self.rng.gen_range(2007..=2016),
            self.rng.gen_range(1..=12)
        );
        record.purpose = self.pick_owned(&purposes);
        record.title = self.pick(&LOAN_TITLES);
        record.earliest_cr_line = format!(
            "{}-{:02}",
            self.rng.gen_range(1970..=2005),
            self.rng.gen_range(1..=12)
        );
        record.open_acc = self.rng.gen_range(1..=40) as f64;
        record.pub_rec = self.rng.gen_range(0..=2) as f64;
        record.revol_bal = self.rng.gen_range(0.0..60000.0_f64).round();
        record.revol_util = (self.rng.gen_range(0.0..100.0_f64) * 10.0).round() / 10.0;
        record.total_acc = record.open_acc + self.rng.gen_range(0..=30) as f64;
        record.initial_list_status = self.pick(&["Waiting", "Fulfilled"]);
        record.application_type = self.pick(&["INDIVIDUAL", "JOINT", "DIRECT_PAY"]);
        record.mort_acc = self.rng.gen_range(0..=6) as f64;
        record.pub_rec_bankruptcies = self.rng.gen_bool(0.1);
        record.address = format!(
            "{} Example Street, Springfield, OK {:05}",
            self.rng.gen_range(1..9999),
            self.rng.gen_range(0..100000)
        );

        record
    }

    /// Generate an application with an out-of-domain category
    fn generate_invalid(&mut self) -> LoanApplicationRecord {
        let mut record = self.generate();
        record.home_ownership = "UNKNOWN".to_string();
        record
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    let count: usize = std::env::args()
        .nth(1)
        .map(|n| n.parse::<usize>())
        .transpose()
        .context("count must be a number")?
        .unwrap_or(20);

    let config = AppConfig::load().unwrap_or_default();
    let client = async_nats::connect(&config.nats.url).await?;
    info!(url = %config.nats.url, count, "Connected to NATS, sending applications");

    let mut generator = ApplicationGenerator::new();
    let (mut approved, mut rejected, mut failed) = (0usize, 0usize, 0usize);

    for i in 0..count {
        // Every tenth application exercises the failure path
        let record = if i % 10 == 9 {
            generator.generate_invalid()
        } else {
            generator.generate()
        };
        let payload = serde_json::to_vec(&record)?;

        let response = match tokio::time::timeout(
            Duration::from_secs(5),
            client.request(config.nats.application_subject.clone(), payload.into()),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(application_id = %record.application_id, error = %e, "Request failed");
                continue;
            }
            Err(_) => {
                warn!(application_id = %record.application_id, "Request timed out");
                continue;
            }
        };

        match serde_json::from_slice::<DecisionReply>(&response.payload)? {
            DecisionReply::Decided { decision, .. } => {
                if decision == loan_approval_pipeline::Decision::Approved {
                    approved += 1;
                } else {
                    rejected += 1;
                }
                info!(application_id = %record.application_id, decision = decision.as_str(), "Decision received");
            }
            DecisionReply::Failed { stage, message, .. } => {
                failed += 1;
                info!(application_id = %record.application_id, stage = %stage, message = %message, "Application failed");
            }
        }
    }

    info!(approved, rejected, failed, "Done");
    Ok(())
}
