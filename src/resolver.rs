//! Destination content lookup.
//!
//! One point query per legacy document against the table its type maps to.
//! A missing row is a normal outcome; only connection problems are errors.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{AnyPool, Row};

use crate::db;
use crate::error::ValidatorError;
use crate::models::DestinationRecord;
use crate::registry::TypeDescriptor;
use crate::traits::DestinationLookup;

/// [`DestinationLookup`] over the migrated store's connection.
pub struct SqlDestination {
    pool: AnyPool,
}

impl SqlDestination {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// The lookup statement for one descriptor; the id is bound as `$1`.
pub fn lookup_sql(descriptor: &TypeDescriptor) -> String {
    format!(
        "SELECT content, {} FROM {} WHERE {} = $1",
        descriptor.cross_reference_column, descriptor.destination_table, descriptor.id_column
    )
}

#[async_trait]
impl DestinationLookup for SqlDestination {
    async fn fetch(
        &self,
        doc_id: &str,
        descriptor: &TypeDescriptor,
    ) -> Result<Option<DestinationRecord>> {
        let sql = lookup_sql(descriptor);
        let row = sqlx::query(&sql)
            .bind(doc_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ValidatorError::destination_store)?;

        Ok(row.map(|row| DestinationRecord {
            content: row.try_get::<Option<String>, _>(0).unwrap_or(None),
            cross_reference: db::text_or_integer(&row, 1),
        }))
    }
}
