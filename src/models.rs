//! Core data models that flow through a validation run.
//!
//! A [`DocumentRecord`] comes from the legacy store, a [`DestinationRecord`]
//! from the migrated store, and every processed document ends up as exactly
//! one [`ValidationOutcome`].

use serde::Serialize;

/// A legacy document as yielded by the source cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    /// `None` when the stored type code is NULL or not an integer; such
    /// documents are reported as unconfigured.
    pub doc_type: Option<i64>,
    /// Raw XML markup; `None` when the stored blob is NULL.
    pub content: Option<String>,
    pub name: Option<String>,
}

/// The migrated counterpart of a legacy document.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationRecord {
    pub content: Option<String>,
    /// Id used to build the public URL of the migrated page.
    pub cross_reference: Option<String>,
}

/// Final classification of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Success,
    Fail,
    Error,
    Skipped,
    MissingInDestination,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "SUCCESS",
            OutcomeStatus::Fail => "FAIL",
            OutcomeStatus::Error => "ERROR",
            OutcomeStatus::Skipped => "SKIPPED",
            OutcomeStatus::MissingInDestination => "MISSING_IN_DESTINATION",
        }
    }

    /// FAIL, ERROR and MISSING_IN_DESTINATION count as failures.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OutcomeStatus::Fail | OutcomeStatus::Error | OutcomeStatus::MissingInDestination
        )
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type code for log lines, `NULL` when absent.
pub fn type_label(doc_type: Option<i64>) -> String {
    doc_type.map_or_else(|| "NULL".to_string(), |code| code.to_string())
}

/// One row of the validation report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub doc_id: String,
    pub doc_type: Option<i64>,
    /// Destination table without schema; `None` for unconfigured types.
    pub table: Option<String>,
    pub status: OutcomeStatus,
    pub loss_ratio: Option<f64>,
    pub url: Option<String>,
    /// Missing tokens joined by `, ` for FAIL, otherwise a message.
    pub detail: String,
}

impl ValidationOutcome {
    pub fn skipped(record: &DocumentRecord, table: Option<&str>, detail: impl Into<String>) -> Self {
        Self {
            doc_id: record.id.clone(),
            doc_type: record.doc_type,
            table: table.map(str::to_string),
            status: OutcomeStatus::Skipped,
            loss_ratio: None,
            url: None,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_label() {
        assert_eq!(type_label(Some(7)), "7");
        assert_eq!(type_label(None), "NULL");
    }
}
