//! Feature encoding for loan approval model inference.
//!
//! This module turns a raw loan application into the numeric row the
//! classifier was trained on. Every categorical code, the date formula and
//! the zip extraction reproduce the training-time preprocessing exactly;
//! any drift here is train/serve skew the model cannot detect.

use crate::error::{EncodingError, SchemaError};
use crate::models::text_encoder::TextEncoder;
use crate::schema::{EncodingSchema, FEATURE_COUNT};
use crate::types::application::LoanApplicationRecord;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Numeric feature row, columns in the schema's feature order.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatureRow {
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl EncodedFeatureRow {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the named feature
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    /// Single-precision copy for the model input tensor
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|&v| v as f32).collect()
    }
}

/// Encoder that transforms loan applications into model input rows.
///
/// Holds the lookup tables and the two frozen text encoders; all of them are
/// read-only, so one encoder can be shared across workers.
pub struct FeatureEncoder {
    schema: Arc<EncodingSchema>,
    /// Canonical feature index for each output column
    columns: Vec<usize>,
    names: Arc<[String]>,
    emp_title_encoder: Arc<dyn TextEncoder>,
    title_encoder: Arc<dyn TextEncoder>,
}

impl FeatureEncoder {
    /// Create an encoder, validating the schema's feature order.
    pub fn new(
        schema: Arc<EncodingSchema>,
        emp_title_encoder: Arc<dyn TextEncoder>,
        title_encoder: Arc<dyn TextEncoder>,
    ) -> Result<Self, SchemaError> {
        let columns = schema.validate()?;
        let names: Arc<[String]> = schema.feature_order.iter().cloned().collect();

        Ok(Self {
            schema,
            columns,
            names,
            emp_title_encoder,
            title_encoder,
        })
    }

    /// Encode one application.
    ///
    /// Fails on the first field outside its domain; a partial row is never
    /// returned.
    pub fn encode(
        &self,
        record: &LoanApplicationRecord,
    ) -> Result<EncodedFeatureRow, EncodingError> {
        let schema = &self.schema;

        // Canonical order, see schema::FEATURE_NAMES
        let canonical: [f64; FEATURE_COUNT] = [
            non_negative("loan_amnt", record.loan_amnt)?,
            schema.term.code("term", &record.term)?,
            in_range("int_rate", record.int_rate, 0.0, 50.0)?,
            non_negative("installment", record.installment)?,
            schema.grade.code("grade", &record.grade)?,
            schema
                .sub_grade
                .code("sub_grade", &record.qualified_sub_grade()?)?,
            encode_text("emp_title", self.emp_title_encoder.as_ref(), &record.emp_title)?,
            schema.emp_length.code("emp_length", &record.emp_length)?,
            schema
                .home_ownership
                .code("home_ownership", &record.home_ownership)?,
            non_negative("annual_inc", record.annual_inc)?,
            schema
                .verification_status
                .code("verification_status", &record.verification_status)?,
            date_feature("issue_d", &record.issue_d)?,
            schema.purpose.code("purpose", &record.purpose)?,
            encode_text("title", self.title_encoder.as_ref(), &record.title)?,
            non_negative("dti", record.effective_dti())?,
            date_feature("earliest_cr_line", &record.earliest_cr_line)?,
            non_negative("open_acc", record.open_acc)?,
            non_negative("pub_rec", record.pub_rec)?,
            non_negative("revol_bal", record.revol_bal)?,
            non_negative("revol_util", record.revol_util)?,
            non_negative("total_acc", record.total_acc)?,
            schema
                .initial_list_status
                .code("initial_list_status", record.listing_status_code())?,
            schema
                .application_type
                .code("application_type", &record.application_type)?,
            non_negative("mort_acc", record.mort_acc)?,
            if record.pub_rec_bankruptcies { 1.0 } else { 0.0 },
            zip_code(&record.address) as f64,
        ];

        let values: Vec<f64> = self.columns.iter().map(|&i| canonical[i]).collect();

        debug!(
            application_id = %record.application_id,
            schema_version = %schema.version,
            features = values.len(),
            "Application encoded"
        );

        Ok(EncodedFeatureRow {
            names: Arc::clone(&self.names),
            values,
        })
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        self.columns.len()
    }

    /// Get feature names in output order.
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    pub fn schema_version(&self) -> &str {
        &self.schema.version
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, EncodingError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(EncodingError::OutOfRange { field, value })
    }
}

fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64, EncodingError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(EncodingError::OutOfRange { field, value })
    }
}

/// Run a frozen text encoder on a single-row column.
fn encode_text(
    field: &'static str,
    encoder: &dyn TextEncoder,
    text: &str,
) -> Result<f64, EncodingError> {
    let codes = encoder
        .transform(&[text])
        .map_err(|e| EncodingError::TextEncoder {
            field,
            reason: format!("{:#}", e),
        })?;

    match codes.as_slice() {
        [code] if code.is_finite() => Ok(*code),
        [code] => Err(EncodingError::TextEncoder {
            field,
            reason: format!("non-finite code {}", code),
        }),
        other => Err(EncodingError::TextEncoder {
            field,
            reason: format!("expected 1 code for 1 row, got {}", other.len()),
        }),
    }
}

fn date_feature(field: &'static str, value: &str) -> Result<f64, EncodingError> {
    let (year, month) = parse_year_month(field, value)?;
    Ok(year_month_feature(year, month))
}

/// Parse a calendar value into year and month.
///
/// Accepts the training data's `Mon-YYYY` form ("Dec-2015") as well as ISO
/// dates ("2015-12-01") and bare ISO months ("2015-12").
pub fn parse_year_month(field: &'static str, value: &str) -> Result<(i32, u32), EncodingError> {
    let trimmed = value.trim();

    let parsed = NaiveDate::parse_from_str(&format!("01-{}", trimmed), "%d-%b-%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d"));

    parsed
        .map(|date| (date.year(), date.month()))
        .map_err(|_| EncodingError::InvalidDate {
            field,
            value: value.to_string(),
        })
}

/// Date feature as engineered at training time: `(year * 10 + month) / 1000`.
///
/// Not a chronological ordinal (month 12 of one year overlaps the next
/// year's range), but it is what the model saw.
pub fn year_month_feature(year: i32, month: u32) -> f64 {
    (i64::from(year) * 10 + i64::from(month)) as f64 / 1000.0
}

fn zip_pattern() -> &'static Regex {
    static ZIP: OnceLock<Regex> = OnceLock::new();
    ZIP.get_or_init(|| Regex::new(r"\b[0-9]{5}\b").expect("zip pattern is valid"))
}

/// First standalone 5-digit run in an address, or 0 when there is none.
///
/// Only ASCII digits count as a zip.
pub fn zip_code(address: &str) -> u32 {
    zip_pattern()
        .find(address)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::text_encoder::{CategoryMapEncoder, UnknownPolicy};
    use std::collections::HashMap;

    fn text_encoder(column: &str, known: &[(&str, f64)]) -> Arc<dyn TextEncoder> {
        let categories: HashMap<String, f64> = known
            .iter()
            .map(|(text, code)| (text.to_string(), *code))
            .collect();
        Arc::new(CategoryMapEncoder::new(
            column,
            categories,
            UnknownPolicy::Value { value: 0.0 },
        ))
    }

    fn encoder_with(schema: EncodingSchema) -> FeatureEncoder {
        FeatureEncoder::new(
            Arc::new(schema),
            text_encoder("emp_title", &[("Marketing / Tech / Business", 42.0)]),
            text_encoder("title", &[("Personal Loan", 7.0)]),
        )
        .unwrap()
    }

    fn encoder() -> FeatureEncoder {
        encoder_with(EncodingSchema::builtin())
    }

    fn sample() -> LoanApplicationRecord {
        let mut record = LoanApplicationRecord::sample();
        record.issue_d = "Dec-2015".to_string();
        record.earliest_cr_line = "1999-04-17".to_string();
        record
    }

    #[test]
    fn test_feature_encoding() {
        let encoder = encoder();
        let row = encoder.encode(&sample()).unwrap();

        assert_eq!(row.len(), encoder.feature_count());
        assert_eq!(row.get("loan_amnt"), Some(10000.0));
        assert_eq!(row.get("term"), Some(0.0));
        assert_eq!(row.get("grade"), Some(1.0));
        assert_eq!(row.get("sub_grade"), Some(1.0));
        assert_eq!(row.get("emp_title"), Some(42.0));
        assert_eq!(row.get("emp_length"), Some(0.1));
        assert_eq!(row.get("home_ownership"), Some(14.0));
        assert_eq!(row.get("verification_status"), Some(0.5));
        assert_eq!(row.get("issue_d"), Some(20.162));
        assert_eq!(row.get("purpose"), Some(1.0));
        assert_eq!(row.get("title"), Some(7.0));
        assert_eq!(row.get("earliest_cr_line"), Some(19.994));
        assert_eq!(row.get("initial_list_status"), Some(0.0));
        assert_eq!(row.get("application_type"), Some(2.0));
        assert_eq!(row.get("pub_rec_bankruptcies"), Some(0.0));
        assert_eq!(row.get("address"), Some(22690.0));
    }

    #[test]
    fn test_feature_count() {
        let encoder = encoder();
        assert_eq!(encoder.feature_count(), 26);
        assert_eq!(encoder.feature_names().len(), 26);
        assert_eq!(encoder.feature_names()[0], "loan_amnt");
        assert_eq!(encoder.feature_names()[25], "address");
        assert_eq!(encoder.schema_version(), "1");
    }

    #[test]
    fn test_term_encoding() {
        let encoder = encoder();
        let mut record = sample();

        record.term = "60 months".to_string();
        assert_eq!(encoder.encode(&record).unwrap().get("term"), Some(1.0));

        record.term = "48 months".to_string();
        assert!(matches!(
            encoder.encode(&record),
            Err(EncodingError::UnknownCategory { field: "term", .. })
        ));
    }

    #[test]
    fn test_sub_grade_from_digit_and_full_label() {
        let encoder = encoder();
        let mut record = sample();
        record.grade = "B".to_string();
        record.sub_grade = "3".to_string();
        assert_eq!(encoder.encode(&record).unwrap().get("sub_grade"), Some(8.0));

        record.grade = "G".to_string();
        record.sub_grade = "G5".to_string();
        assert_eq!(encoder.encode(&record).unwrap().get("sub_grade"), Some(35.0));

        record.sub_grade = "6".to_string();
        assert!(encoder.encode(&record).is_err());
    }

    #[test]
    fn test_sub_grade_must_match_grade() {
        let encoder = encoder();
        let mut record = sample();
        record.grade = "A".to_string();
        record.sub_grade = "G5".to_string();

        assert_eq!(
            encoder.encode(&record).unwrap_err(),
            EncodingError::UnknownCategory {
                field: "sub_grade",
                value: "G5".to_string()
            }
        );
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encoder = encoder();
        let record = sample();
        assert_eq!(
            encoder.encode(&record).unwrap(),
            encoder.encode(&record).unwrap()
        );
    }

    #[test]
    fn test_zip_extraction() {
        assert_eq!(zip_code("0174 Michelle Gateway, Mendozaberg, OK 22690"), 22690);
        assert_eq!(zip_code("Main St Apt 4"), 0);
        assert_eq!(zip_code("PSC 3812, Box 9120, APO AP 05113"), 5113);
        assert_eq!(zip_code("123456 Long Number Rd"), 0);
        assert_eq!(zip_code(""), 0);
    }

    #[test]
    fn test_zip_requires_ascii_digits() {
        assert_eq!(zip_code("Mendozaberg, OK ２２６９０"), 0);
        assert_eq!(zip_code("Mendozaberg, OK ٢٢٦٩٠"), 0);
        // a non-ASCII digit glued on means no standalone run
        assert_eq!(zip_code("Mendozaberg, OK 22690２"), 0);
    }

    #[test]
    fn test_year_month_feature() {
        assert_eq!(year_month_feature(2015, 12), 20.162);
        assert_eq!(parse_year_month("issue_d", "Dec-2015").unwrap(), (2015, 12));
        assert_eq!(parse_year_month("issue_d", "2015-12-31").unwrap(), (2015, 12));
        assert_eq!(parse_year_month("issue_d", "2015-12").unwrap(), (2015, 12));
        assert_eq!(parse_year_month("issue_d", " Jan-2001 ").unwrap(), (2001, 1));
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let encoder = encoder();
        let mut record = sample();
        record.earliest_cr_line = "sometime in 1999".to_string();

        assert_eq!(
            encoder.encode(&record).unwrap_err(),
            EncodingError::InvalidDate {
                field: "earliest_cr_line",
                value: "sometime in 1999".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_category_fails_fast() {
        let encoder = encoder();
        let mut record = sample();
        record.home_ownership = "UNKNOWN".to_string();

        assert_eq!(
            encoder.encode(&record).unwrap_err(),
            EncodingError::UnknownCategory {
                field: "home_ownership",
                value: "UNKNOWN".to_string()
            }
        );
    }

    #[test]
    fn test_numeric_domains() {
        let encoder = encoder();

        let mut record = sample();
        record.int_rate = 50.5;
        assert!(matches!(
            encoder.encode(&record),
            Err(EncodingError::OutOfRange { field: "int_rate", .. })
        ));

        let mut record = sample();
        record.loan_amnt = -1.0;
        assert!(matches!(
            encoder.encode(&record),
            Err(EncodingError::OutOfRange { field: "loan_amnt", .. })
        ));

        let mut record = sample();
        record.revol_util = f64::NAN;
        assert!(matches!(
            encoder.encode(&record),
            Err(EncodingError::OutOfRange { field: "revol_util", .. })
        ));

        // derived dti with zero income is infinite
        let mut record = sample();
        record.annual_inc = 0.0;
        assert!(matches!(
            encoder.encode(&record),
            Err(EncodingError::OutOfRange { field: "dti", .. })
        ));
    }

    #[test]
    fn test_listing_status_and_bankruptcies() {
        let encoder = encoder();
        let mut record = sample();
        record.initial_list_status = "Fulfilled".to_string();
        record.pub_rec_bankruptcies = true;

        let row = encoder.encode(&record).unwrap();
        assert_eq!(row.get("initial_list_status"), Some(1.0));
        assert_eq!(row.get("pub_rec_bankruptcies"), Some(1.0));
    }

    #[test]
    fn test_strict_text_encoder_failure() {
        let strict: Arc<dyn TextEncoder> = Arc::new(CategoryMapEncoder::new(
            "emp_title",
            HashMap::new(),
            UnknownPolicy::Error,
        ));
        let encoder = FeatureEncoder::new(
            Arc::new(EncodingSchema::builtin()),
            strict,
            text_encoder("title", &[]),
        )
        .unwrap();

        assert!(matches!(
            encoder.encode(&sample()),
            Err(EncodingError::TextEncoder { field: "emp_title", .. })
        ));
    }

    #[test]
    fn test_text_encoder_must_return_one_code() {
        struct Doubling;

        impl TextEncoder for Doubling {
            fn column(&self) -> &str {
                "title"
            }

            fn transform(&self, column: &[&str]) -> anyhow::Result<Vec<f64>> {
                Ok(column.iter().flat_map(|_| [1.0, 2.0]).collect())
            }
        }

        let encoder = FeatureEncoder::new(
            Arc::new(EncodingSchema::builtin()),
            text_encoder("emp_title", &[]),
            Arc::new(Doubling),
        )
        .unwrap();

        assert!(matches!(
            encoder.encode(&sample()),
            Err(EncodingError::TextEncoder { field: "title", .. })
        ));
    }

    #[test]
    fn test_schema_feature_order_is_honoured() {
        let mut schema = EncodingSchema::builtin();
        schema.feature_order.reverse();
        let encoder = encoder_with(schema);

        let row = encoder.encode(&sample()).unwrap();
        assert_eq!(row.names()[0], "address");
        assert_eq!(row.values()[0], 22690.0);
        assert_eq!(row.values()[25], 10000.0);
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let mut schema = EncodingSchema::builtin();
        schema.feature_order.truncate(10);

        let result = FeatureEncoder::new(
            Arc::new(schema),
            text_encoder("emp_title", &[]),
            text_encoder("title", &[]),
        );
        assert!(matches!(result, Err(SchemaError::MissingFeature(_))));
    }
}
