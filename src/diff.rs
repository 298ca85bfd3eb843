//! Vocabulary-level comparison of a legacy document and its migration.
//!
//! The loss ratio is the share of legacy tokens that do not appear anywhere
//! in the destination text. Tokens of one or two characters are not counted
//! as missing (stray letters, unit abbreviations, single digits), but the
//! denominator is always the full legacy token count.

use serde::Serialize;
use tracing::debug;

use crate::extract::{destination_text, legacy_text};
use crate::normalize::{normalize, TokenSet};

/// Default number of missing tokens attached to a failing result.
pub const MISSING_TOKENS_LIMIT: usize = 10;

/// Tokens this short never count as missing.
const MAX_NOISE_TOKEN_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiffStatus {
    Success,
    Fail,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffResult {
    pub status: DiffStatus,
    pub loss_ratio: Option<f64>,
    /// At most `missing_tokens_limit` tokens, only populated on FAIL.
    pub missing_tokens: Vec<String>,
    pub message: Option<String>,
}

impl DiffResult {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: DiffStatus::Error,
            loss_ratio: None,
            missing_tokens: Vec::new(),
            message: Some(message.into()),
        }
    }
}

/// Comparison settings for one document type.
#[derive(Debug, Clone, Copy)]
pub struct DiffOptions<'a> {
    pub threshold: f64,
    pub excluded_tags: &'a [String],
    pub missing_tokens_limit: usize,
}

impl<'a> DiffOptions<'a> {
    pub fn new(threshold: f64, excluded_tags: &'a [String]) -> Self {
        Self {
            threshold,
            excluded_tags,
            missing_tokens_limit: MISSING_TOKENS_LIMIT,
        }
    }
}

/// Validate one document pair.
///
/// Returns `None` when the legacy side has nothing to compare (it
/// normalizes to zero tokens); callers report that as skipped, not failed.
pub fn validate(
    legacy_markup: Option<&str>,
    destination_markup: Option<&str>,
    options: DiffOptions<'_>,
) -> Option<DiffResult> {
    let (legacy, destination) = match (legacy_markup, destination_markup) {
        (Some(l), Some(d)) if !l.is_empty() && !d.is_empty() => (l, d),
        _ => return Some(DiffResult::error("empty content found")),
    };

    let legacy_plain = match legacy_text(legacy, options.excluded_tags) {
        Ok(text) => text,
        Err(e) => return Some(DiffResult::error(e.to_string())),
    };
    let legacy_tokens = normalize(&legacy_plain);
    let destination_tokens = normalize(&destination_text(destination));

    debug!(
        "token counts: legacy={}, destination={}",
        legacy_tokens.len(),
        destination_tokens.len()
    );
    debug!(
        "token trace: legacy={} destination={}",
        preview(&legacy_tokens),
        preview(&destination_tokens)
    );

    compare_tokens(&legacy_tokens, &destination_tokens, options)
}

/// Compare already-normalized token sets.
pub fn compare_tokens(
    legacy: &TokenSet,
    destination: &TokenSet,
    options: DiffOptions<'_>,
) -> Option<DiffResult> {
    if legacy.is_empty() {
        return None;
    }

    let missing: Vec<&String> = legacy
        .difference(destination)
        .filter(|token| token.chars().count() > MAX_NOISE_TOKEN_LEN)
        .collect();

    let loss_ratio = missing.len() as f64 / legacy.len() as f64;
    debug!("calculated loss ratio: {:.4}", loss_ratio);
    if !missing.is_empty() {
        debug!("missing tokens ({}): {:?}", missing.len(), missing);
    }

    if loss_ratio > options.threshold {
        Some(DiffResult {
            status: DiffStatus::Fail,
            loss_ratio: Some(loss_ratio),
            missing_tokens: missing
                .into_iter()
                .take(options.missing_tokens_limit)
                .cloned()
                .collect(),
            message: None,
        })
    } else {
        Some(DiffResult {
            status: DiffStatus::Success,
            loss_ratio: Some(loss_ratio),
            missing_tokens: Vec::new(),
            message: None,
        })
    }
}

fn preview(tokens: &TokenSet) -> String {
    let joined = tokens.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
    match joined.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &joined[..idx]),
        None => joined,
    }
}
