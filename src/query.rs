//! Run intent → document selection.
//!
//! Turns the CLI flags into a [`Selection`]: which legacy documents to
//! stream, plus the stable name of the result file. Nothing here touches a
//! database; an unusable type filter fails before any connection is opened.
//!
//! A document only counts as published when it has the association its type
//! requires: article-linked types (package leaflets) need an article link,
//! every other type needs a product link.

use tracing::info;

use crate::config::SourceSchema;
use crate::error::ValidatorError;
use crate::registry::{LinkCategory, TypeRegistry};

/// What the user asked to validate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunIntent {
    /// Single-document (investigative) mode; wins over `types`.
    pub doc_id: Option<String>,
    /// Raw comma-separated type filter, e.g. `"3, 7"`.
    pub types: Option<String>,
}

/// Which documents the source cursor should yield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    /// Exactly one document, no association check.
    Document(String),
    /// Every document with the association its type requires, optionally
    /// restricted to a set of type codes.
    Linked { types: Option<Vec<i64>> },
    /// Type set that falls entirely into one association category; an
    /// inner join on that category's link table suffices.
    LinkedNarrow {
        types: Vec<i64>,
        category: LinkCategory,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub criterion: Criterion,
    /// Result file name, derived only from environment and intent.
    pub output_name: String,
    /// Codes from the type filter that are not configured.
    pub dropped_types: Vec<i64>,
}

/// SQL text plus the values to bind, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionQuery {
    pub sql: String,
    pub binds: Vec<String>,
}

pub fn build_selection(
    intent: &RunIntent,
    env_name: &str,
    registry: &TypeRegistry,
) -> Result<Selection, ValidatorError> {
    if let Some(doc_id) = intent.doc_id.as_deref() {
        return Ok(Selection {
            criterion: Criterion::Document(doc_id.to_string()),
            output_name: format!("val_{}_{}.csv", env_name, sanitize(doc_id)),
            dropped_types: Vec::new(),
        });
    }

    let Some(raw_types) = intent.types.as_deref() else {
        return Ok(Selection {
            criterion: Criterion::Linked { types: None },
            output_name: format!("compare_{}_all.csv", env_name),
            dropped_types: Vec::new(),
        });
    };

    let requested = parse_type_filter(raw_types)?;
    let valid: Vec<i64> = requested
        .iter()
        .copied()
        .filter(|code| registry.is_configured(*code))
        .collect();

    let dropped: Vec<i64> = requested
        .iter()
        .copied()
        .filter(|code| !registry.is_configured(*code))
        .collect();
    if valid.is_empty() {
        return Err(ValidatorError::Configuration(format!(
            "No valid document types found in configuration (unconfigured: {:?}).",
            dropped
        )));
    }

    let suffix = valid
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("_");
    let output_name = format!("compare_{}_types_{}.csv", env_name, suffix);

    let has_article = valid
        .iter()
        .any(|c| registry.link_category(*c) == LinkCategory::Article);
    let has_product = valid
        .iter()
        .any(|c| registry.link_category(*c) == LinkCategory::Product);

    let criterion = match (has_article, has_product) {
        (true, false) => Criterion::LinkedNarrow {
            types: valid,
            category: LinkCategory::Article,
        },
        (false, true) => Criterion::LinkedNarrow {
            types: valid,
            category: LinkCategory::Product,
        },
        _ => Criterion::Linked { types: Some(valid) },
    };

    Ok(Selection {
        criterion,
        output_name,
        dropped_types: dropped,
    })
}

/// Parse `"3, 7,32"` into codes, keeping first occurrences in order.
fn parse_type_filter(raw: &str) -> Result<Vec<i64>, ValidatorError> {
    if raw.trim().is_empty() {
        return Err(ValidatorError::Configuration(
            "type filter is empty".to_string(),
        ));
    }
    let mut codes = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        let code: i64 = part.parse().map_err(|_| {
            ValidatorError::Configuration(format!("invalid document type in filter: '{}'", part))
        })?;
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    Ok(codes)
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl Selection {
    /// Log what the run is about to select.
    pub fn log_summary(&self) {
        if !self.dropped_types.is_empty() {
            info!("Ignoring unconfigured types in filter: {:?}", self.dropped_types);
        }
        match &self.criterion {
            Criterion::Document(doc_id) => {
                info!("Running in investigative mode for document {}", doc_id);
            }
            Criterion::Linked { types: Some(types) } | Criterion::LinkedNarrow { types, .. } => {
                info!("Processing only types: {:?}", types);
            }
            Criterion::Linked { types: None } => {}
        }
    }

    /// Render the selection as SQL against the legacy schema.
    ///
    /// Type codes are integers and are inlined; the document id is bound.
    pub fn to_query(&self, schema: &SourceSchema, registry: &TypeRegistry) -> SelectionQuery {
        let select = format!(
            "SELECT t.{id}, t.{ty}, t.{content}, t.{name} FROM {table} t",
            id = schema.id_column,
            ty = schema.type_column,
            content = schema.content_column,
            name = schema.name_column,
            table = schema.documents_table,
        );
        let article_join = format!(
            "{table} da ON t.{id} = da.{link}",
            table = schema.article_links_table,
            id = schema.id_column,
            link = schema.link_document_column,
        );
        let product_join = format!(
            "{table} dp ON t.{id} = dp.{link}",
            table = schema.product_links_table,
            id = schema.id_column,
            link = schema.link_document_column,
        );

        match &self.criterion {
            Criterion::Document(doc_id) => SelectionQuery {
                sql: format!("{} WHERE t.{} = $1", select, schema.id_column),
                binds: vec![doc_id.clone()],
            },
            Criterion::LinkedNarrow { types, category } => {
                let join = match category {
                    LinkCategory::Article => &article_join,
                    LinkCategory::Product => &product_join,
                };
                SelectionQuery {
                    sql: format!(
                        "{} JOIN {} WHERE t.{} IN ({})",
                        select,
                        join,
                        schema.type_column,
                        code_list(types)
                    ),
                    binds: Vec::new(),
                }
            }
            Criterion::Linked { types } => {
                let linked = linked_condition(schema, registry);
                let condition = match types {
                    Some(types) => format!(
                        "t.{} IN ({}) AND {}",
                        schema.type_column,
                        code_list(types),
                        linked
                    ),
                    None => linked,
                };
                SelectionQuery {
                    sql: format!(
                        "{} LEFT JOIN {} LEFT JOIN {} WHERE {}",
                        select, article_join, product_join, condition
                    ),
                    binds: Vec::new(),
                }
            }
        }
    }
}

fn linked_condition(schema: &SourceSchema, registry: &TypeRegistry) -> String {
    let article_types: Vec<i64> = registry.article_types().iter().copied().collect();
    if article_types.is_empty() {
        return format!("dp.{} IS NOT NULL", schema.link_document_column);
    }
    let list = code_list(&article_types);
    format!(
        "((t.{ty} IN ({list}) AND da.{link} IS NOT NULL) OR (t.{ty} NOT IN ({list}) AND dp.{link} IS NOT NULL))",
        ty = schema.type_column,
        list = list,
        link = schema.link_document_column,
    )
}

fn code_list(codes: &[i64]) -> String {
    codes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
