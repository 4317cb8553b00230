//! Loan application records as submitted by applicants

use crate::error::EncodingError;
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};

fn new_application_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One applicant's raw, human-readable input.
///
/// Categorical fields keep the labels the applicant picked; mapping them to
/// model codes is the job of [`crate::FeatureEncoder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplicationRecord {
    /// Unique application identifier
    #[serde(default = "new_application_id")]
    pub application_id: String,

    /// Requested loan amount
    pub loan_amnt: f64,

    /// Loan term ("36 months" or "60 months")
    pub term: String,

    /// Interest rate in percent
    pub int_rate: f64,

    /// Monthly installment
    pub installment: f64,

    /// Loan grade (A-G)
    pub grade: String,

    /// Loan subgrade, either "B3" or just the digit "3"
    pub sub_grade: String,

    /// Employment title (free text)
    pub emp_title: String,

    /// Employment length bucket ("< 1 year", "10+ years", "Not Provided", ...)
    pub emp_length: String,

    /// Home ownership (ANY, MORTGAGE, NONE, OTHER, OWN, RENT)
    pub home_ownership: String,

    /// Annual income
    pub annual_inc: f64,

    /// Income verification status
    pub verification_status: String,

    /// Loan issue date ("Dec-2015", "2015-12-01" or "2015-12")
    pub issue_d: String,

    /// Loan purpose
    pub purpose: String,

    /// Loan title (free text)
    pub title: String,

    /// Debt-to-income ratio in percent; derived from installment and income when absent
    #[serde(default)]
    pub dti: Option<f64>,

    /// Earliest credit line date, same formats as `issue_d`
    pub earliest_cr_line: String,

    /// Open credit lines
    pub open_acc: f64,

    /// Derogatory public records
    pub pub_rec: f64,

    /// Revolving balance
    pub revol_bal: f64,

    /// Revolving line utilization in percent
    pub revol_util: f64,

    /// Total credit accounts
    pub total_acc: f64,

    /// Initial listing status ("Waiting"/"Fulfilled" or the codes "w"/"f")
    pub initial_list_status: String,

    /// Application type (INDIVIDUAL, JOINT, DIRECT_PAY)
    pub application_type: String,

    /// Mortgage accounts
    pub mort_acc: f64,

    /// Public record bankruptcies ("Yes"/"No" or a boolean)
    #[serde(deserialize_with = "deserialize_yes_no")]
    pub pub_rec_bankruptcies: bool,

    /// Postal address; the 5-digit zip is extracted during encoding
    pub address: String,
}

impl LoanApplicationRecord {
    /// Application pre-filled with the form's default values.
    ///
    /// Both dates default to the current month, as the form's date pickers do.
    pub fn sample() -> Self {
        let today = Utc::now().format("%Y-%m-%d").to_string();

        Self {
            application_id: new_application_id(),
            loan_amnt: 10000.0,
            term: "36 months".to_string(),
            int_rate: 11.44,
            installment: 329.48,
            grade: "A".to_string(),
            sub_grade: "1".to_string(),
            emp_title: "Marketing / Tech / Business".to_string(),
            emp_length: "Not Provided".to_string(),
            home_ownership: "NONE".to_string(),
            annual_inc: 117000.0,
            verification_status: "Verified".to_string(),
            issue_d: today.clone(),
            purpose: "car".to_string(),
            title: "Personal Loan".to_string(),
            dti: None,
            earliest_cr_line: today,
            open_acc: 16.0,
            pub_rec: 0.0,
            revol_bal: 36369.0,
            revol_util: 41.8,
            total_acc: 25.0,
            initial_list_status: "Waiting".to_string(),
            application_type: "INDIVIDUAL".to_string(),
            mort_acc: 0.0,
            pub_rec_bankruptcies: false,
            address: "0174 Michelle Gateway, Mendozaberg, OK 22690".to_string(),
        }
    }

    /// Debt-to-income ratio, falling back to `installment / monthly income * 100`.
    pub fn effective_dti(&self) -> f64 {
        self.dti
            .unwrap_or_else(|| self.installment / (self.annual_inc / 12.0) * 100.0)
    }

    /// Subgrade qualified with its grade letter ("3" with grade "B" becomes "B3").
    ///
    /// A full label must belong to `grade`; "G5" under grade "A" is rejected.
    pub fn qualified_sub_grade(&self) -> Result<String, EncodingError> {
        let grade = self.grade.trim();
        let sub = self.sub_grade.trim();

        if sub.len() == 1 && sub.chars().all(|c| c.is_ascii_digit()) {
            Ok(format!("{}{}", grade, sub))
        } else if !grade.is_empty() && sub.starts_with(grade) {
            Ok(sub.to_string())
        } else {
            Err(EncodingError::UnknownCategory {
                field: "sub_grade",
                value: self.sub_grade.clone(),
            })
        }
    }

    /// Listing status as the single-letter code used at training time.
    pub fn listing_status_code(&self) -> &str {
        match self.initial_list_status.as_str() {
            "Waiting" => "w",
            "Fulfilled" => "f",
            other => other,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YesNo {
    Flag(bool),
    Number(f64),
    Label(String),
}

fn deserialize_yes_no<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match YesNo::deserialize(deserializer)? {
        YesNo::Flag(flag) => Ok(flag),
        YesNo::Number(n) if n == 1.0 => Ok(true),
        YesNo::Number(n) if n == 0.0 => Ok(false),
        YesNo::Number(n) => Err(D::Error::custom(format!(
            "expected 0 or 1 for a yes/no field, got {}",
            n
        ))),
        YesNo::Label(label) => match label.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(true),
            "no" => Ok(false),
            _ => Err(D::Error::custom(format!(
                "expected \"Yes\" or \"No\", got {:?}",
                label
            ))),
        },
    }
}
