//! SQL cursor over the legacy document store.
//!
//! The selection query is executed once; rows are streamed from the open
//! connection and handed out in batches, so memory use is bounded by the
//! batch size regardless of corpus size.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use tracing::warn;

use crate::db;
use crate::error::ValidatorError;
use crate::models::DocumentRecord;
use crate::query::SelectionQuery;
use crate::traits::DocumentSource;

pub struct SqlDocumentSource {
    rows: BoxStream<'static, Result<DocumentRecord>>,
}

impl SqlDocumentSource {
    /// Start streaming `query` over `pool`. Columns must be, in order:
    /// id, type code, content, name.
    ///
    /// Only query and connection failures end the stream with an error.
    /// Rows without an id are logged and dropped; a type code that is NULL
    /// or not an integer is passed on as `None`.
    pub fn open(pool: AnyPool, query: SelectionQuery) -> Self {
        let rows = async_stream::try_stream! {
            let mut q = sqlx::query(&query.sql);
            for value in &query.binds {
                q = q.bind(value.as_str());
            }
            let mut stream = q.fetch(&pool);
            while let Some(row) = stream
                .try_next()
                .await
                .map_err(ValidatorError::source_store)?
            {
                if let Some(record) = decode_record(&row) {
                    yield record;
                } else {
                    warn!("Skipping legacy row without a document id");
                }
            }
        };
        Self {
            rows: Box::pin(rows),
        }
    }
}

fn decode_record(row: &AnyRow) -> Option<DocumentRecord> {
    let id = db::text_or_integer(row, 0)?;
    let doc_type = db::integer(row, 1).or_else(|| {
        db::text_or_integer(row, 1).and_then(|raw| raw.trim().parse().ok())
    });
    let content: Option<String> = row.try_get(2).unwrap_or(None);
    let name = db::text_or_integer(row, 3);
    Some(DocumentRecord {
        id,
        doc_type,
        content,
        name,
    })
}

#[async_trait]
impl DocumentSource for SqlDocumentSource {
    async fn next_batch(&mut self, size: usize) -> Result<Vec<DocumentRecord>> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            match self.rows.try_next().await? {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Store;
    use crate::memory::{MemoryLookup, MemorySink};
    use crate::progress::RunStats;
    use crate::registry::TypeRegistry;
    use crate::validate::{Orchestrator, RunSettings};
    use std::collections::BTreeMap;

    async fn seeded_pool() -> AnyPool {
        let pool = db::connect("sqlite::memory:", Store::Source).await.unwrap();
        sqlx::query("CREATE TABLE docs (id TEXT, type INTEGER, content TEXT, name TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        for i in 0..5 {
            sqlx::query("INSERT INTO docs VALUES ($1, $2, $3, $4)")
                .bind(format!("d{}", i))
                .bind(3_i64)
                .bind(format!("<doc>{}</doc>", i))
                .bind("name")
                .execute(&pool)
                .await
                .unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_streams_in_batches() {
        let pool = seeded_pool().await;
        let mut source = SqlDocumentSource::open(
            pool,
            SelectionQuery {
                sql: "SELECT id, type, content, name FROM docs ORDER BY id".to_string(),
                binds: Vec::new(),
            },
        );
        let first = source.next_batch(2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id, "d0");
        assert_eq!(first[0].doc_type, Some(3));
        assert_eq!(first[0].content.as_deref(), Some("<doc>0</doc>"));
        assert_eq!(source.next_batch(2).await.unwrap().len(), 2);
        assert_eq!(source.next_batch(2).await.unwrap().len(), 1);
        assert!(source.next_batch(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bound_id() {
        let pool = seeded_pool().await;
        let mut source = SqlDocumentSource::open(
            pool,
            SelectionQuery {
                sql: "SELECT id, type, content, name FROM docs WHERE id = $1".to_string(),
                binds: vec!["d3".to_string()],
            },
        );
        let batch = source.next_batch(100).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, "d3");
    }

    async fn untyped_pool() -> AnyPool {
        let pool = db::connect("sqlite::memory:", Store::Source).await.unwrap();
        sqlx::query("CREATE TABLE docs (id TEXT, type, content TEXT, name TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO docs VALUES \
                ('a', NULL, '<doc>a</doc>', 'no type'), \
                (NULL, 3, '<doc>x</doc>', 'no id'), \
                ('b', 'leaflet', '<doc>b</doc>', 'text type'), \
                ('c', 99, '<doc>c</doc>', 'unknown type')",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    fn untyped_query() -> SelectionQuery {
        SelectionQuery {
            sql: "SELECT id, type, content, name FROM docs ORDER BY id".to_string(),
            binds: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_rows_with_bad_type_or_id_do_not_end_the_stream() {
        let mut source = SqlDocumentSource::open(untyped_pool().await, untyped_query());
        let batch = source.next_batch(10).await.unwrap();
        let decoded: Vec<(&str, Option<i64>)> = batch
            .iter()
            .map(|r| (r.id.as_str(), r.doc_type))
            .collect();
        assert_eq!(decoded, vec![("a", None), ("b", None), ("c", Some(99))]);
        assert!(source.next_batch(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_untyped_rows_reported_as_skipped() {
        let registry = TypeRegistry::new(
            BTreeMap::new(),
            Default::default(),
            Default::default(),
            Vec::new(),
        );
        let lookup = MemoryLookup::new();
        let mut sink = MemorySink::new();
        let settings = RunSettings {
            write_passing: true,
            ..RunSettings::default()
        };
        let stats = {
            let mut orchestrator = Orchestrator::new(&registry, &lookup, &mut sink, "", settings);
            let mut source = SqlDocumentSource::open(untyped_pool().await, untyped_query());
            orchestrator.run(&mut source).await.unwrap()
        };
        assert_eq!(
            stats,
            RunStats {
                processed: 0,
                failures: 0,
                skipped: 3
            }
        );
        let types: Vec<Option<i64>> = sink.outcomes.iter().map(|o| o.doc_type).collect();
        assert_eq!(types, vec![None, None, Some(99)]);
        assert!(sink.finished);
    }

    #[tokio::test]
    async fn test_query_error_surfaces() {
        let pool = seeded_pool().await;
        let mut source = SqlDocumentSource::open(
            pool,
            SelectionQuery {
                sql: "SELECT * FROM no_such_table".to_string(),
                binds: Vec::new(),
            },
        );
        assert!(source.next_batch(10).await.is_err());
    }
}
