//! CSV result file.
//!
//! UTF-8 with byte-order mark so spreadsheet tools pick the right encoding,
//! decimal comma in the loss column.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;

use crate::error::ValidatorError;
use crate::models::ValidationOutcome;
use crate::traits::ResultSink;

pub const HEADER: [&str; 7] = ["doc_id", "doc_type", "table", "status", "loss", "url", "missing"];

const BOM: &[u8] = b"\xEF\xBB\xBF";

pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    /// Create (or overwrite) the result file and write the header.
    pub fn create(path: &Path) -> Result<Self, ValidatorError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Self::new(file)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(mut inner: W) -> Result<Self, ValidatorError> {
        inner.write_all(BOM)?;
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(inner);
        writer.write_record(HEADER)?;
        Ok(Self { writer })
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("failed to flush result file: {}", e.error()))
    }
}

/// Loss ratio with `,` as decimal separator and at least one decimal,
/// e.g. `0,125` or `0,0`.
pub fn format_loss(loss: Option<f64>) -> String {
    loss.map(|l| format!("{:?}", l).replace('.', ","))
        .unwrap_or_default()
}

pub fn outcome_record(outcome: &ValidationOutcome) -> [String; 7] {
    [
        outcome.doc_id.clone(),
        outcome.doc_type.map(|code| code.to_string()).unwrap_or_default(),
        outcome.table.clone().unwrap_or_default(),
        outcome.status.as_str().to_string(),
        format_loss(outcome.loss_ratio),
        outcome.url.clone().unwrap_or_default(),
        outcome.detail.clone(),
    ]
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn write(&mut self, outcome: &ValidationOutcome) -> Result<()> {
        self.writer
            .write_record(outcome_record(outcome))
            .map_err(ValidatorError::from)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().map_err(ValidatorError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutcomeStatus;

    fn outcome(status: OutcomeStatus, loss: Option<f64>, detail: &str) -> ValidationOutcome {
        ValidationOutcome {
            doc_id: "D1".to_string(),
            doc_type: Some(6),
            table: Some("t_fass_smpc".to_string()),
            status,
            loss_ratio: loss,
            url: loss.map(|_| "https://example.org/health/product/1/smpc".to_string()),
            detail: detail.to_string(),
        }
    }

    fn render(outcomes: &[ValidationOutcome]) -> String {
        let mut sink = CsvSink::new(Vec::new()).unwrap();
        for o in outcomes {
            sink.write(o).unwrap();
        }
        sink.finish().unwrap();
        String::from_utf8(sink.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_format_loss() {
        assert_eq!(format_loss(Some(0.125)), "0,125");
        assert_eq!(format_loss(Some(0.0)), "0,0");
        assert_eq!(format_loss(Some(1.0)), "1,0");
        assert_eq!(format_loss(Some(0.25)), "0,25");
        assert_eq!(format_loss(None), "");
    }

    #[test]
    fn test_bom_and_header() {
        let out = render(&[]);
        assert!(out.starts_with('\u{feff}'));
        assert_eq!(
            out.trim_start_matches('\u{feff}'),
            "doc_id,doc_type,table,status,loss,url,missing\r\n"
        );
    }

    #[test]
    fn test_fail_row_quotes_decimal_comma_and_tokens() {
        let out = render(&[outcome(OutcomeStatus::Fail, Some(0.25), "alpha, beta")]);
        let row = out.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "D1,6,t_fass_smpc,FAIL,\"0,25\",https://example.org/health/product/1/smpc,\"alpha, beta\""
        );
    }

    #[test]
    fn test_missing_row_has_empty_loss_and_url() {
        let out = render(&[outcome(
            OutcomeStatus::MissingInDestination,
            None,
            "not found",
        )]);
        let row = out.lines().nth(1).unwrap();
        assert_eq!(row, "D1,6,t_fass_smpc,MISSING_IN_DESTINATION,,,not found");
    }

    #[test]
    fn test_zero_loss_keeps_decimal() {
        let out = render(&[outcome(OutcomeStatus::Success, Some(0.0), "")]);
        let row = out.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "D1,6,t_fass_smpc,SUCCESS,\"0,0\",https://example.org/health/product/1/smpc,"
        );
    }

    #[test]
    fn test_untyped_row_has_empty_type() {
        let untyped = ValidationOutcome {
            doc_type: None,
            table: None,
            ..outcome(OutcomeStatus::Skipped, None, "unconfigured type")
        };
        let out = render(&[untyped]);
        let row = out.lines().nth(1).unwrap();
        assert_eq!(row, "D1,,,SKIPPED,,,unconfigured type");
    }
}
