//! Offline comparison of two files.
//!
//! `mval compare legacy.xml migrated.html` runs the same extraction and
//! diff as a validation run, without any database. Handy for reproducing a
//! single FAIL row from a result file.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use crate::config::{Config, ValidationConfig};
use crate::diff::{self, DiffOptions, DiffResult, DiffStatus};
use crate::error::ValidatorError;

/// Settings resolved from the configuration (if any) and the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareSettings {
    pub threshold: f64,
    pub excluded_tags: Vec<String>,
    pub missing_tokens_limit: usize,
}

impl CompareSettings {
    /// With a type code the type's threshold and tags apply; without one,
    /// only the global tags and the default threshold. An explicit
    /// `threshold` always wins.
    ///
    /// `config` is the outcome of loading the configuration file. A load
    /// error is only fatal when `type_code` is given, and is then reported
    /// as the cause.
    pub fn resolve(
        config: Result<&Config, &anyhow::Error>,
        type_code: Option<i64>,
        threshold: Option<f64>,
    ) -> Result<Self> {
        let defaults = ValidationConfig::default();
        let validation = config.map(|c| &c.validation).unwrap_or(&defaults);

        let mut settings = match type_code {
            Some(code) => {
                let config = config.map_err(|load_error| {
                    anyhow!("{:#}", load_error).context(ValidatorError::Configuration(format!(
                        "--type {} needs a readable configuration file",
                        code
                    )))
                })?;
                let registry = config.registry()?;
                let descriptor = registry.descriptor(code).ok_or_else(|| {
                    ValidatorError::Configuration(format!("type {} is not configured", code))
                })?;
                Self {
                    threshold: descriptor.loss_threshold,
                    excluded_tags: registry.excluded_tags(descriptor),
                    missing_tokens_limit: validation.missing_tokens_limit,
                }
            }
            None => Self {
                threshold: validation.default_loss_threshold,
                excluded_tags: validation.global_ignore_tags.clone(),
                missing_tokens_limit: validation.missing_tokens_limit,
            },
        };

        if let Some(t) = threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(ValidatorError::Configuration(format!(
                    "--threshold must be in [0.0, 1.0], got {}",
                    t
                ))
                .into());
            }
            settings.threshold = t;
        }
        Ok(settings)
    }
}

/// Compare a legacy XML file with a destination HTML file.
pub fn compare_files(
    legacy: &Path,
    destination: &Path,
    settings: &CompareSettings,
) -> Result<Option<DiffResult>> {
    let legacy_markup = std::fs::read_to_string(legacy)
        .with_context(|| format!("Failed to read {}", legacy.display()))?;
    let destination_markup = std::fs::read_to_string(destination)
        .with_context(|| format!("Failed to read {}", destination.display()))?;

    Ok(diff::validate(
        Some(&legacy_markup),
        Some(&destination_markup),
        DiffOptions {
            threshold: settings.threshold,
            excluded_tags: &settings.excluded_tags,
            missing_tokens_limit: settings.missing_tokens_limit,
        },
    ))
}

#[derive(Serialize)]
struct JsonReport<'a> {
    status: &'a str,
    loss_ratio: Option<f64>,
    threshold: f64,
    missing_tokens: &'a [String],
    message: Option<&'a str>,
}

fn status_label(result: Option<&DiffResult>) -> &'static str {
    match result.map(|r| r.status) {
        None => "SKIPPED",
        Some(DiffStatus::Success) => "SUCCESS",
        Some(DiffStatus::Fail) => "FAIL",
        Some(DiffStatus::Error) => "ERROR",
    }
}

pub fn render_json(result: Option<&DiffResult>, settings: &CompareSettings) -> Result<String> {
    let report = JsonReport {
        status: status_label(result),
        loss_ratio: result.and_then(|r| r.loss_ratio),
        threshold: settings.threshold,
        missing_tokens: result.map(|r| r.missing_tokens.as_slice()).unwrap_or(&[]),
        message: result.and_then(|r| r.message.as_deref()),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub fn render_text(result: Option<&DiffResult>, settings: &CompareSettings) -> String {
    let mut out = format!("Status:    {}\n", status_label(result));
    match result {
        None => out.push_str("Legacy document has no comparable text.\n"),
        Some(r) => {
            if let Some(loss) = r.loss_ratio {
                out.push_str(&format!(
                    "Loss:      {:.2}% (threshold {:.2}%)\n",
                    loss * 100.0,
                    settings.threshold * 100.0
                ));
            }
            if !r.missing_tokens.is_empty() {
                out.push_str(&format!("Missing:   {}\n", r.missing_tokens.join(", ")));
            }
            if let Some(msg) = &r.message {
                out.push_str(&format!("Message:   {}\n", msg));
            }
        }
    }
    out
}

/// Entry point for `mval compare`.
pub fn run_compare(
    config: Result<&Config, &anyhow::Error>,
    legacy: &Path,
    destination: &Path,
    type_code: Option<i64>,
    threshold: Option<f64>,
    json: bool,
) -> Result<()> {
    let settings = CompareSettings::resolve(config, type_code, threshold)?;
    let result = compare_files(legacy, destination, &settings)?;
    if json {
        println!("{}", render_json(result.as_ref(), &settings)?);
    } else {
        print!("{}", render_text(result.as_ref(), &settings));
    }
    Ok(())
}
