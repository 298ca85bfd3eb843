use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::registry::{TypeDescriptor, TypeRegistry};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub source_schema: SourceSchema,
    pub environments: BTreeMap<String, EnvironmentConfig>,
    #[serde(default)]
    pub types: BTreeMap<String, TypeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub write_passing: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            write_passing: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ValidationConfig {
    #[serde(default)]
    pub default_loss_threshold: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    #[serde(default = "default_missing_tokens_limit")]
    pub missing_tokens_limit: usize,
    #[serde(default = "default_global_ignore_tags")]
    pub global_ignore_tags: Vec<String>,
    #[serde(default)]
    pub ignored_types: Vec<i64>,
    #[serde(default)]
    pub article_types: Vec<i64>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            default_loss_threshold: 0.0,
            batch_size: default_batch_size(),
            progress_interval: default_progress_interval(),
            missing_tokens_limit: default_missing_tokens_limit(),
            global_ignore_tags: default_global_ignore_tags(),
            ignored_types: Vec::new(),
            article_types: Vec::new(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}
fn default_progress_interval() -> u64 {
    1000
}
fn default_missing_tokens_limit() -> usize {
    10
}
fn default_global_ignore_tags() -> Vec<String> {
    vec!["audittrail-list".to_string(), "meta-data".to_string()]
}

/// Table and column names of the legacy document store.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceSchema {
    #[serde(default = "default_documents_table")]
    pub documents_table: String,
    #[serde(default = "default_doc_id_column")]
    pub id_column: String,
    #[serde(default = "default_type_column")]
    pub type_column: String,
    #[serde(default = "default_content_column")]
    pub content_column: String,
    #[serde(default = "default_name_column")]
    pub name_column: String,
    #[serde(default = "default_article_links_table")]
    pub article_links_table: String,
    #[serde(default = "default_product_links_table")]
    pub product_links_table: String,
    #[serde(default = "default_doc_id_column")]
    pub link_document_column: String,
}

impl Default for SourceSchema {
    fn default() -> Self {
        Self {
            documents_table: default_documents_table(),
            id_column: default_doc_id_column(),
            type_column: default_type_column(),
            content_column: default_content_column(),
            name_column: default_name_column(),
            article_links_table: default_article_links_table(),
            product_links_table: default_product_links_table(),
            link_document_column: default_doc_id_column(),
        }
    }
}

fn default_documents_table() -> String {
    "FASSADMIN.T_DOKUMENT".to_string()
}
fn default_doc_id_column() -> String {
    "DOK_ID".to_string()
}
fn default_type_column() -> String {
    "DOKUMENT_TYP".to_string()
}
fn default_content_column() -> String {
    "CONTENT".to_string()
}
fn default_name_column() -> String {
    "NAMN".to_string()
}
fn default_article_links_table() -> String {
    "FASSADMIN.T_DOKUMENT_ARTIKEL".to_string()
}
fn default_product_links_table() -> String {
    "FASSADMIN.T_DOKUMENT_PRODUKT".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnvironmentConfig {
    pub source_url: String,
    pub destination_url: String,
    pub url_base: String,
}

/// Raw `[types.<code>]` entry as written in the file.
#[derive(Debug, Deserialize, Clone)]
pub struct TypeConfig {
    pub table: String,
    pub id_column: String,
    pub cross_reference_column: String,
    pub url_template: String,
    #[serde(default)]
    pub ignore_tags: Vec<String>,
    #[serde(default)]
    pub loss_threshold: Option<f64>,
}

impl Config {
    /// Look up an environment by name, ignoring case.
    pub fn environment(&self, name: &str) -> Option<(&str, &EnvironmentConfig)> {
        self.environments
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(key, env)| (key.as_str(), env))
    }

    /// Build the immutable type registry from the `[types]` and
    /// `[validation]` sections.
    pub fn registry(&self) -> Result<TypeRegistry> {
        let mut descriptors = BTreeMap::new();
        for (key, raw) in &self.types {
            let code: i64 = key
                .trim()
                .parse()
                .with_context(|| format!("types.{}: type key must be an integer", key))?;
            let descriptor = TypeDescriptor {
                code,
                destination_table: raw.table.clone(),
                id_column: raw.id_column.clone(),
                cross_reference_column: raw.cross_reference_column.clone(),
                url_template: raw.url_template.clone(),
                ignored_tags: raw.ignore_tags.clone(),
                loss_threshold: raw
                    .loss_threshold
                    .unwrap_or(self.validation.default_loss_threshold),
            };
            if descriptors.insert(code, descriptor).is_some() {
                bail!("types.{}: type code {} is configured twice", key, code);
            }
        }

        Ok(TypeRegistry::new(
            descriptors,
            self.validation.ignored_types.iter().copied().collect(),
            self.validation.article_types.iter().copied().collect(),
            self.validation.global_ignore_tags.clone(),
        ))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate validation settings
    if config.validation.batch_size == 0 {
        bail!("validation.batch_size must be > 0");
    }
    if config.validation.progress_interval == 0 {
        bail!("validation.progress_interval must be > 0");
    }
    if !(0.0..=1.0).contains(&config.validation.default_loss_threshold) {
        bail!("validation.default_loss_threshold must be in [0.0, 1.0]");
    }

    // Validate environments
    if config.environments.is_empty() {
        bail!("at least one [environments.<name>] section is required");
    }

    // Validate legacy schema
    let schema = &config.source_schema;
    for (field, value) in [
        ("documents_table", &schema.documents_table),
        ("id_column", &schema.id_column),
        ("type_column", &schema.type_column),
        ("content_column", &schema.content_column),
        ("name_column", &schema.name_column),
        ("article_links_table", &schema.article_links_table),
        ("product_links_table", &schema.product_links_table),
        ("link_document_column", &schema.link_document_column),
    ] {
        if !is_sql_identifier(value) {
            bail!("source_schema.{} is not a valid identifier: '{}'", field, value);
        }
    }

    // Validate types
    for (key, raw) in &config.types {
        for (field, value) in [
            ("table", &raw.table),
            ("id_column", &raw.id_column),
            ("cross_reference_column", &raw.cross_reference_column),
        ] {
            if !is_sql_identifier(value) {
                bail!("types.{}.{} is not a valid identifier: '{}'", key, field, value);
            }
        }
        if !raw.url_template.contains("{}") {
            bail!("types.{}.url_template must contain a '{{}}' placeholder", key);
        }
        if let Some(threshold) = raw.loss_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                bail!("types.{}.loss_threshold must be in [0.0, 1.0]", key);
            }
        }
    }

    let registry = config.registry()?;
    if let Some(code) = registry.conflicting_codes().first() {
        bail!(
            "type {} is listed in validation.ignored_types and also configured in [types]",
            code
        );
    }

    Ok(config)
}

/// Table/column names are spliced into SQL, so only plain (optionally
/// schema-qualified) identifiers are accepted.
fn is_sql_identifier(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('.')
        && !s.ends_with('.')
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
