//! Validation run orchestration.
//!
//! A run moves through three phases:
//!
//! 1. **init**: [`plan_run`] resolves the environment and builds the
//!    selection without side effects; [`run_validation`] then opens both
//!    connections and creates the result file. Any failure here aborts
//!    before a single row is written.
//! 2. **streaming**: pull batches from the source until one comes back
//!    empty. Each document is deduplicated by id, resolved to its type,
//!    looked up in the destination store, compared, written and counted.
//! 3. **done**: flush the result file, close connections, report totals.
//!
//! Per-document problems become [`OutcomeStatus`] values and never stop the
//! loop. Only configuration and connectivity errors end a run early.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::config::{Config, EnvironmentConfig, OutputConfig, ValidationConfig};
use crate::cursor::SqlDocumentSource;
use crate::db;
use crate::diff::{self, DiffOptions, DiffStatus};
use crate::error::{Store, ValidatorError};
use crate::models::{type_label, DocumentRecord, OutcomeStatus, ValidationOutcome};
use crate::progress::{format_number, ProgressCounters, RunStats};
use crate::query::{build_selection, RunIntent, Selection, SelectionQuery};
use crate::registry::{Resolution, TypeRegistry};
use crate::resolver::SqlDestination;
use crate::sink::CsvSink;
use crate::traits::{DestinationLookup, DocumentSource, ResultSink};

/// Knobs for the streaming phase.
#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub batch_size: usize,
    pub progress_interval: u64,
    pub missing_tokens_limit: usize,
    /// Write SUCCESS and SKIPPED outcomes too, not only failures.
    pub write_passing: bool,
}

impl RunSettings {
    pub fn from_config(validation: &ValidationConfig, output: &OutputConfig) -> Self {
        Self {
            batch_size: validation.batch_size,
            progress_interval: validation.progress_interval,
            missing_tokens_limit: validation.missing_tokens_limit,
            write_passing: output.write_passing,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default(), &OutputConfig::default())
    }
}

/// Drives the batch loop for one run. Owns the dedup set, the unknown-type
/// set and the progress counters; nothing else sees them.
pub struct Orchestrator<'a> {
    registry: &'a TypeRegistry,
    lookup: &'a dyn DestinationLookup,
    sink: &'a mut dyn ResultSink,
    url_base: String,
    settings: RunSettings,
    processed_ids: HashSet<String>,
    unknown_types: HashSet<Option<i64>>,
    counters: ProgressCounters,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        lookup: &'a dyn DestinationLookup,
        sink: &'a mut dyn ResultSink,
        url_base: impl Into<String>,
        settings: RunSettings,
    ) -> Self {
        Self {
            registry,
            lookup,
            sink,
            url_base: url_base.into(),
            settings,
            processed_ids: HashSet::new(),
            unknown_types: HashSet::new(),
            counters: ProgressCounters::new(settings.progress_interval),
        }
    }

    /// Stream every batch from `source` and flush the sink at the end.
    pub async fn run(&mut self, source: &mut dyn DocumentSource) -> Result<RunStats> {
        loop {
            let batch = source.next_batch(self.settings.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            self.process_batch(batch).await?;
        }
        self.sink.finish()?;
        Ok(self.counters.stats())
    }

    pub async fn process_batch(&mut self, batch: Vec<DocumentRecord>) -> Result<()> {
        let new_types: Vec<i64> = {
            let mut in_batch: HashSet<&str> = HashSet::new();
            batch
                .iter()
                .filter(|r| !self.processed_ids.contains(&r.id) && in_batch.insert(r.id.as_str()))
                .filter_map(|r| r.doc_type)
                .collect()
        };
        self.counters.register(new_types);

        for record in &batch {
            if !self.processed_ids.insert(record.id.clone()) {
                continue;
            }

            let outcome = self.process_document(record).await?;
            if outcome.status.is_failure() || self.settings.write_passing {
                self.sink.write(&outcome)?;
            }

            if self.counters.record(record.doc_type, outcome.status) {
                self.log_progress();
            }
        }
        Ok(())
    }

    /// Take one document end to end. Errors are connectivity failures only.
    pub async fn process_document(&mut self, record: &DocumentRecord) -> Result<ValidationOutcome> {
        debug!(
            "--- Processing Doc ID: {} (Type: {}) ---",
            record.id,
            type_label(record.doc_type)
        );

        let registry = self.registry;
        let resolution = record
            .doc_type
            .map_or(Resolution::NotConfigured, |code| registry.resolve(code));
        let descriptor = match resolution {
            Resolution::Configured(descriptor) => descriptor,
            Resolution::Ignored => {
                return Ok(ValidationOutcome::skipped(record, None, "ignored type"));
            }
            Resolution::NotConfigured => {
                if self.unknown_types.insert(record.doc_type) {
                    warn!(
                        "Unknown Type ID: {} | Name example: {}",
                        type_label(record.doc_type),
                        record.name.as_deref().unwrap_or("")
                    );
                }
                return Ok(ValidationOutcome::skipped(record, None, "unconfigured type"));
            }
        };
        let table = descriptor.table_short_name();

        let Some(destination) = self.lookup.fetch(&record.id, descriptor).await? else {
            let msg = format!(
                "Doc ID {} not found in destination table {}",
                record.id, descriptor.destination_table
            );
            warn!("{}", msg);
            return Ok(ValidationOutcome {
                doc_id: record.id.clone(),
                doc_type: record.doc_type,
                table: Some(table.to_string()),
                status: OutcomeStatus::MissingInDestination,
                loss_ratio: None,
                url: None,
                detail: msg,
            });
        };

        let excluded_tags = registry.excluded_tags(descriptor);
        let options = DiffOptions {
            threshold: descriptor.loss_threshold,
            excluded_tags: &excluded_tags,
            missing_tokens_limit: self.settings.missing_tokens_limit,
        };
        let Some(result) = diff::validate(
            record.content.as_deref(),
            destination.content.as_deref(),
            options,
        ) else {
            info!(
                "SKIPPED: ID: {} | Type: {} | No content to validate.",
                record.id,
                type_label(record.doc_type)
            );
            return Ok(ValidationOutcome::skipped(
                record,
                Some(table),
                "no content to validate",
            ));
        };

        let url = descriptor.document_url(&self.url_base, destination.cross_reference.as_deref());
        let mut outcome = ValidationOutcome {
            doc_id: record.id.clone(),
            doc_type: record.doc_type,
            table: Some(table.to_string()),
            status: OutcomeStatus::Success,
            loss_ratio: result.loss_ratio,
            url: Some(url),
            detail: String::new(),
        };

        match result.status {
            DiffStatus::Success => {
                debug!("SUCCESS: ID: {} passed validation.", record.id);
            }
            DiffStatus::Fail => {
                info!(
                    "FAIL: ID: {} | Type: {} | Loss: {:.2}%",
                    record.id,
                    type_label(record.doc_type),
                    result.loss_ratio.unwrap_or(0.0) * 100.0
                );
                outcome.status = OutcomeStatus::Fail;
                outcome.detail = result.missing_tokens.join(", ");
            }
            DiffStatus::Error => {
                let msg = result.message.unwrap_or_default();
                error!("ERROR: ID: {}: {}", record.id, msg);
                outcome.status = OutcomeStatus::Error;
                outcome.loss_ratio = None;
                outcome.detail = msg;
            }
        }
        Ok(outcome)
    }

    pub fn stats(&self) -> RunStats {
        self.counters.stats()
    }

    fn log_progress(&self) {
        info!(
            "--- Progress: {} docs processed ---",
            format_number(self.counters.stats().processed)
        );
        for p in self.counters.pending() {
            info!(
                "   Type {}: {}/{} done ({} remaining)",
                p.doc_type,
                format_number(p.processed),
                format_number(p.seen),
                format_number(p.remaining())
            );
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub environment: String,
    pub stats: RunStats,
    pub output_path: PathBuf,
}

/// Directory for one day's results: `<output.dir>/output_<YYYYMMDD>`.
pub fn dated_output_dir(base: &Path, now: chrono::DateTime<chrono::Local>) -> PathBuf {
    base.join(now.format("output_%Y%m%d").to_string())
}

/// Everything a run needs that can be checked without touching a store.
#[derive(Debug)]
pub struct RunPlan<'c> {
    pub environment: &'c str,
    env: &'c EnvironmentConfig,
    registry: TypeRegistry,
    pub selection: Selection,
    query: SelectionQuery,
}

/// Resolve the environment, registry and selection for a run. Fails with a
/// configuration error before anything is connected or created.
pub fn plan_run<'c>(config: &'c Config, env_name: &str, intent: &RunIntent) -> Result<RunPlan<'c>> {
    let (environment, env) = config.environment(env_name).ok_or_else(|| {
        ValidatorError::Configuration(format!(
            "Unknown environment '{}'. Available: {}",
            env_name,
            config
                .environments
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;

    let registry = config.registry()?;
    let selection = build_selection(intent, environment, &registry)?;
    let query = selection.to_query(&config.source_schema, &registry);
    Ok(RunPlan {
        environment,
        env,
        registry,
        selection,
        query,
    })
}

/// Run a planned validation against the SQL stores of its environment.
pub async fn run_validation(
    config: &Config,
    plan: RunPlan<'_>,
    output_dir: &Path,
) -> Result<RunReport> {
    // init
    let RunPlan {
        environment,
        env,
        registry,
        selection,
        query,
    } = plan;
    info!("Targeting Environment: {}", environment);
    selection.log_summary();
    debug!("Selection query: {}", query.sql);

    let source_pool = db::connect(&env.source_url, Store::Source).await?;
    let destination_pool = db::connect(&env.destination_url, Store::Destination).await?;
    info!("Connected to databases.");

    let output_path = output_dir.join(&selection.output_name);
    let mut sink = CsvSink::create(&output_path)?;

    // streaming
    info!("Fetching legacy documents...");
    let mut source = SqlDocumentSource::open(source_pool.clone(), query);
    let lookup = SqlDestination::new(destination_pool);
    let settings = RunSettings::from_config(&config.validation, &config.output);

    let stats = {
        let mut orchestrator =
            Orchestrator::new(&registry, &lookup, &mut sink, env.url_base.clone(), settings);
        orchestrator.run(&mut source).await?
    };

    // done
    drop(source);
    source_pool.close().await;
    lookup.close().await;

    debug!("run finished: {:?}", stats);

    Ok(RunReport {
        environment: environment.to_string(),
        stats,
        output_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryLookup, MemorySink, MemorySource};
    use crate::registry::TypeDescriptor;
    use std::collections::BTreeMap;

    fn registry() -> TypeRegistry {
        let mut descriptors = BTreeMap::new();
        descriptors.insert(
            6,
            TypeDescriptor {
                code: 6,
                destination_table: "fasssmpc.t_fass_smpc".to_string(),
                id_column: "doc_id".to_string(),
                cross_reference_column: "npl_id".to_string(),
                url_template: "{base}/health/product/{}/smpc".to_string(),
                ignored_tags: Vec::new(),
                loss_threshold: 0.0,
            },
        );
        TypeRegistry::new(
            descriptors,
            [200].into_iter().collect(),
            Default::default(),
            vec!["meta-data".to_string()],
        )
    }

    fn record(id: &str, doc_type: i64, content: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            doc_type: Some(doc_type),
            content: Some(content.to_string()),
            name: Some(format!("name of {}", id)),
        }
    }

    #[tokio::test]
    async fn test_url_built_from_cross_reference() {
        let reg = registry();
        let mut lookup = MemoryLookup::new();
        lookup.insert("fasssmpc.t_fass_smpc", "D1", Some("<p>other words</p>"), Some("123"));
        let mut sink = MemorySink::new();
        let mut orch = Orchestrator::new(
            &reg,
            &lookup,
            &mut sink,
            "https://www.example.org",
            RunSettings::default(),
        );
        let outcome = orch
            .process_document(&record("D1", 6, "<doc>vanished words</doc>"))
            .await
            .unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Fail);
        assert_eq!(outcome.table.as_deref(), Some("t_fass_smpc"));
        assert_eq!(
            outcome.url.as_deref(),
            Some("https://www.example.org/health/product/123/smpc")
        );
        assert_eq!(outcome.detail, "vanished");
    }

    #[tokio::test]
    async fn test_global_tags_excluded() {
        let reg = registry();
        let mut lookup = MemoryLookup::new();
        lookup.insert("fasssmpc.t_fass_smpc", "D1", Some("<p>kept</p>"), None);
        let mut sink = MemorySink::new();
        let mut orch =
            Orchestrator::new(&reg, &lookup, &mut sink, "", RunSettings::default());
        let outcome = orch
            .process_document(&record("D1", 6, "<doc><meta-data>audit</meta-data>kept</doc>"))
            .await
            .unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(outcome.url.as_deref(), Some("N/A"));
    }

    #[tokio::test]
    async fn test_ignored_type_skipped() {
        let reg = registry();
        let lookup = MemoryLookup::new();
        let mut sink = MemorySink::new();
        let mut orch =
            Orchestrator::new(&reg, &lookup, &mut sink, "", RunSettings::default());
        let outcome = orch
            .process_document(&record("D1", 200, "<doc>x</doc>"))
            .await
            .unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert!(orch.unknown_types.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_registered_once() {
        let reg = registry();
        let lookup = MemoryLookup::new();
        let mut sink = MemorySink::new();
        let mut orch =
            Orchestrator::new(&reg, &lookup, &mut sink, "", RunSettings::default());
        for id in ["D1", "D2"] {
            let outcome = orch
                .process_document(&record(id, 99, "<doc>x</doc>"))
                .await
                .unwrap();
            assert_eq!(outcome.status, OutcomeStatus::Skipped);
        }
        assert_eq!(orch.unknown_types.len(), 1);
    }

    #[tokio::test]
    async fn test_untyped_document_skipped_as_unconfigured() {
        let reg = registry();
        let lookup = MemoryLookup::new();
        let mut sink = MemorySink::new();
        let mut orch =
            Orchestrator::new(&reg, &lookup, &mut sink, "", RunSettings::default());
        let untyped = DocumentRecord {
            doc_type: None,
            ..record("D1", 6, "<doc>x</doc>")
        };
        let outcome = orch.process_document(&untyped).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert_eq!(outcome.doc_type, None);
        assert_eq!(outcome.detail, "unconfigured type");
        assert!(orch.unknown_types.contains(&None));
    }

    #[tokio::test]
    async fn test_only_failures_written_by_default() {
        let reg = registry();
        let mut lookup = MemoryLookup::new();
        lookup.insert("fasssmpc.t_fass_smpc", "OK", Some("<p>same text</p>"), Some("1"));
        let mut sink = MemorySink::new();
        {
            let mut orch =
                Orchestrator::new(&reg, &lookup, &mut sink, "", RunSettings::default());
            let mut source = MemorySource::new(vec![
                record("OK", 6, "<doc>same text</doc>"),
                record("GONE", 6, "<doc>text</doc>"),
                record("IGN", 200, "<doc>text</doc>"),
            ]);
            let stats = orch.run(&mut source).await.unwrap();
            assert_eq!(
                stats,
                RunStats {
                    processed: 2,
                    failures: 1,
                    skipped: 1
                }
            );
        }
        assert!(sink.finished);
        assert_eq!(sink.outcomes.len(), 1);
        assert_eq!(sink.outcomes[0].doc_id, "GONE");
        assert_eq!(sink.outcomes[0].status, OutcomeStatus::MissingInDestination);
    }

    #[tokio::test]
    async fn test_progress_registration_ignores_duplicates() {
        let reg = registry();
        let lookup = MemoryLookup::new();
        let mut sink = MemorySink::new();
        let mut orch =
            Orchestrator::new(&reg, &lookup, &mut sink, "", RunSettings::default());
        orch.process_batch(vec![
            record("A", 99, "<doc>x</doc>"),
            record("A", 99, "<doc>x</doc>"),
        ])
        .await
        .unwrap();
        orch.process_batch(vec![record("A", 99, "<doc>x</doc>")])
            .await
            .unwrap();
        assert!(orch.counters.pending().is_empty());
        assert_eq!(orch.stats().skipped, 1);
    }

    #[test]
    fn test_plan_checks_environment_and_filter() {
        let cfg = crate::config::parse_config(
            r#"
[environments.ACC]
source_url = "postgres://nobody@unreachable.invalid/legacy"
destination_url = "postgres://nobody@unreachable.invalid/api"
url_base = "https://test.example.org"

[types.6]
table = "fasssmpc.t_fass_smpc"
id_column = "doc_id"
cross_reference_column = "npl_id"
url_template = "{base}/health/product/{}/smpc"
"#,
        )
        .unwrap();

        let plan = plan_run(&cfg, "acc", &RunIntent::default()).unwrap();
        assert_eq!(plan.environment, "ACC");
        assert_eq!(plan.selection.output_name, "compare_ACC_all.csv");

        let bad_filter = RunIntent {
            types: Some("42".to_string()),
            ..RunIntent::default()
        };
        let err = plan_run(&cfg, "ACC", &bad_filter).unwrap_err();
        assert!(err.to_string().contains("No valid document types"), "{}", err);
        assert!(plan_run(&cfg, "STAGE", &RunIntent::default()).is_err());
    }

    #[test]
    fn test_dated_output_dir() {
        use chrono::TimeZone;
        let now = chrono::Local.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(
            dated_output_dir(Path::new("out"), now),
            PathBuf::from("out/output_20240309")
        );
    }
}
