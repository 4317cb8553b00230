//! Versioned encoding schema shared with the training pipeline.
//!
//! The lookup tables and the feature column order are a contract with the
//! trained model: changing any code here without redeploying the model
//! artifacts silently corrupts predictions. Some codes look arbitrary
//! (OWN is 15.1 right after OTHER at 15, Verified sits between Not Verified
//! and Source Verified) and are kept exactly as they were at training time.

use crate::error::{EncodingError, SchemaError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

/// Number of columns in an encoded feature row.
pub const FEATURE_COUNT: usize = 26;

/// Canonical feature names, in training-time column order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "loan_amnt",
    "term",
    "int_rate",
    "installment",
    "grade",
    "sub_grade",
    "emp_title",
    "emp_length",
    "home_ownership",
    "annual_inc",
    "verification_status",
    "issue_d",
    "purpose",
    "title",
    "dti",
    "earliest_cr_line",
    "open_acc",
    "pub_rec",
    "revol_bal",
    "revol_util",
    "total_acc",
    "initial_list_status",
    "application_type",
    "mort_acc",
    "pub_rec_bankruptcies",
    "address",
];

/// Version tag of the embedded schema.
pub const BUILTIN_SCHEMA_VERSION: &str = "1";

const GRADES: [&str; 7] = ["A", "B", "C", "D", "E", "F", "G"];

/// Fixed mapping from a categorical label to its model code
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupTable(BTreeMap<String, f64>);

impl LookupTable {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(label, code)| (label.to_string(), code))
                .collect(),
        )
    }

    /// Look up `value`, failing instead of producing a missing feature.
    pub fn code(&self, field: &'static str, value: &str) -> Result<f64, EncodingError> {
        self.0
            .get(value)
            .copied()
            .ok_or_else(|| EncodingError::UnknownCategory {
                field,
                value: value.to_string(),
            })
    }

    pub fn get(&self, value: &str) -> Option<f64> {
        self.0.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn validate(&self, table: &'static str) -> Result<(), SchemaError> {
        if self.0.is_empty() {
            return Err(SchemaError::EmptyTable(table));
        }
        if let Some((key, _)) = self.0.iter().find(|(_, code)| !code.is_finite()) {
            return Err(SchemaError::NonFiniteCode {
                table,
                key: key.clone(),
            });
        }
        Ok(())
    }
}

/// Lookup tables plus the feature column order expected by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingSchema {
    pub version: String,
    pub feature_order: Vec<String>,
    pub term: LookupTable,
    pub grade: LookupTable,
    pub sub_grade: LookupTable,
    pub emp_length: LookupTable,
    pub home_ownership: LookupTable,
    pub verification_status: LookupTable,
    pub purpose: LookupTable,
    pub initial_list_status: LookupTable,
    pub application_type: LookupTable,
}

impl EncodingSchema {
    /// Schema embedded in the binary, matching the deployed model.
    pub fn builtin() -> Self {
        let sub_grade = GRADES
            .iter()
            .flat_map(|grade| (1..=5).map(move |digit| format!("{}{}", grade, digit)))
            .enumerate()
            .map(|(i, label)| (label, (i + 1) as f64))
            .collect();

        Self {
            version: BUILTIN_SCHEMA_VERSION.to_string(),
            feature_order: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            term: LookupTable::from_pairs([("36 months", 0.0), ("60 months", 1.0)]),
            grade: LookupTable::from_pairs(
                GRADES
                    .iter()
                    .enumerate()
                    .map(|(i, grade)| (*grade, (i + 1) as f64)),
            ),
            sub_grade: LookupTable(sub_grade),
            emp_length: LookupTable::from_pairs([
                ("10+ years", 10.0),
                ("2 years", 2.0),
                ("< 1 year", 0.5),
                ("3 years", 3.0),
                ("5 years", 5.0),
                ("1 year", 1.0),
                ("4 years", 4.0),
                ("6 years", 6.0),
                ("7 years", 7.0),
                ("8 years", 8.0),
                ("9 years", 9.0),
                ("Not Provided", 0.1),
            ]),
            home_ownership: LookupTable::from_pairs([
                ("ANY", 1.0),
                ("MORTGAGE", 13.0),
                ("NONE", 14.0),
                ("OTHER", 15.0),
                ("OWN", 15.1),
                ("RENT", 18.0),
            ]),
            verification_status: LookupTable::from_pairs([
                ("Not Verified", 0.0),
                ("Source Verified", 1.0),
                ("Verified", 0.5),
            ]),
            purpose: LookupTable::from_pairs([
                ("car", 1.0),
                ("credit_card", 1.1),
                ("debt_consolidation", 2.0),
                ("educational", 3.0),
                ("home_improvement", 4.0),
                ("house", 4.1),
                ("major_purchase", 4.2),
                ("medical", 4.3),
                ("moving", 4.4),
                ("other", 5.0),
                ("renewable_energy", 6.0),
                ("small_business", 7.0),
                ("vacation", 8.0),
                ("wedding", 9.0),
            ]),
            initial_list_status: LookupTable::from_pairs([("f", 1.0), ("w", 0.0)]),
            application_type: LookupTable::from_pairs([
                ("DIRECT_PAY", 1.0),
                ("INDIVIDUAL", 2.0),
                ("JOINT", 3.0),
            ]),
        }
    }

    /// Load a schema exported alongside the model artifacts (JSON).
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let schema = Self::from_json(&raw).map_err(|e| match e {
            SchemaError::Parse { source, .. } => SchemaError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })?;

        info!(
            path = %path.display(),
            version = %schema.version,
            features = schema.feature_order.len(),
            "Encoding schema loaded"
        );

        Ok(schema)
    }

    /// Parse and validate a schema document.
    pub fn from_json(raw: &str) -> Result<Self, SchemaError> {
        let schema: Self = serde_json::from_str(raw).map_err(|source| SchemaError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        schema.validate()?;
        Ok(schema)
    }

    /// Check every table and resolve the feature order to canonical indices.
    pub fn validate(&self) -> Result<Vec<usize>, SchemaError> {
        for (name, table) in self.tables() {
            table.validate(name)?;
        }

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(FEATURE_COUNT);
        for name in &self.feature_order {
            let index = FEATURE_NAMES
                .iter()
                .position(|known| *known == name.as_str())
                .ok_or_else(|| SchemaError::UnknownFeature(name.clone()))?;
            if !seen.insert(index) {
                return Err(SchemaError::DuplicateFeature(name.clone()));
            }
            columns.push(index);
        }

        if let Some(missing) = FEATURE_NAMES
            .iter()
            .enumerate()
            .find(|(i, _)| !seen.contains(i))
        {
            return Err(SchemaError::MissingFeature(missing.1.to_string()));
        }

        Ok(columns)
    }

    fn tables(&self) -> [(&'static str, &LookupTable); 9] {
        [
            ("term", &self.term),
            ("grade", &self.grade),
            ("sub_grade", &self.sub_grade),
            ("emp_length", &self.emp_length),
            ("home_ownership", &self.home_ownership),
            ("verification_status", &self.verification_status),
            ("purpose", &self.purpose),
            ("initial_list_status", &self.initial_list_status),
            ("application_type", &self.application_type),
        ]
    }
}

impl Default for EncodingSchema {
    fn default() -> Self {
        Self::builtin()
    }
}
