//! In-memory implementations of the store traits.
//!
//! Used by tests and by callers that already hold their documents in
//! memory. Behavior mirrors the SQL implementations: the source hands out
//! records in the order given, the lookup is keyed by `(table, doc_id)`.

use std::collections::{HashMap, VecDeque};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DestinationRecord, DocumentRecord, ValidationOutcome};
use crate::registry::TypeDescriptor;
use crate::traits::{DestinationLookup, DocumentSource, ResultSink};

/// Source that yields a fixed list of records.
#[derive(Debug, Default)]
pub struct MemorySource {
    records: VecDeque<DocumentRecord>,
}

impl MemorySource {
    pub fn new(records: Vec<DocumentRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn next_batch(&mut self, size: usize) -> Result<Vec<DocumentRecord>> {
        let take = size.min(self.records.len());
        Ok(self.records.drain(..take).collect())
    }
}

/// Lookup backed by a map of `(table, doc_id)` to destination rows.
#[derive(Debug, Default)]
pub struct MemoryLookup {
    rows: HashMap<(String, String), DestinationRecord>,
}

impl MemoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        table: &str,
        doc_id: &str,
        content: Option<&str>,
        cross_reference: Option<&str>,
    ) {
        self.rows.insert(
            (table.to_string(), doc_id.to_string()),
            DestinationRecord {
                content: content.map(str::to_string),
                cross_reference: cross_reference.map(str::to_string),
            },
        );
    }
}

#[async_trait]
impl DestinationLookup for MemoryLookup {
    async fn fetch(
        &self,
        doc_id: &str,
        descriptor: &TypeDescriptor,
    ) -> Result<Option<DestinationRecord>> {
        Ok(self
            .rows
            .get(&(descriptor.destination_table.clone(), doc_id.to_string()))
            .cloned())
    }
}

/// Sink that keeps every written outcome.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub outcomes: Vec<ValidationOutcome>,
    pub finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultSink for MemorySink {
    fn write(&mut self, outcome: &ValidationOutcome) -> Result<()> {
        self.outcomes.push(outcome.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            doc_type: Some(3),
            content: None,
            name: None,
        }
    }

    #[tokio::test]
    async fn test_memory_source_batches() {
        let mut source = MemorySource::new(vec![record("1"), record("2"), record("3")]);
        assert_eq!(source.next_batch(2).await.unwrap().len(), 2);
        assert_eq!(source.next_batch(2).await.unwrap().len(), 1);
        assert!(source.next_batch(2).await.unwrap().is_empty());
    }
}
