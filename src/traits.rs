//! Seams to the external stores.
//!
//! The orchestrator only talks to these traits. The SQL implementations live
//! in [`crate::cursor`], [`crate::resolver`] and [`crate::sink`]; in-memory
//! ones for tests live in [`crate::memory`].
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │DocumentSource│──▶│ Orchestrator │──▶│  ResultSink  │
//! │ (legacy XML) │   │              │   │    (CSV)     │
//! └──────────────┘   └──────┬───────┘   └──────────────┘
//!                           ▼
//!                  ┌──────────────────┐
//!                  │DestinationLookup │
//!                  │ (migrated HTML)  │
//!                  └──────────────────┘
//! ```

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DestinationRecord, DocumentRecord, ValidationOutcome};
use crate::registry::TypeDescriptor;

/// Streaming cursor over the selected legacy documents.
///
/// Batches arrive in arbitrary order and may repeat ids across batches;
/// an empty batch means the cursor is exhausted.
#[async_trait]
pub trait DocumentSource: Send {
    async fn next_batch(&mut self, size: usize) -> Result<Vec<DocumentRecord>>;
}

/// Point lookup of a migrated document.
#[async_trait]
pub trait DestinationLookup: Send + Sync {
    /// Fetch the destination row for `doc_id` from the descriptor's table.
    ///
    /// `Ok(None)` means no such row, which is an expected outcome. `Err` is
    /// reserved for connectivity failures and aborts the run.
    async fn fetch(
        &self,
        doc_id: &str,
        descriptor: &TypeDescriptor,
    ) -> Result<Option<DestinationRecord>>;
}

/// Durable record of validation outcomes.
pub trait ResultSink {
    fn write(&mut self, outcome: &ValidationOutcome) -> Result<()>;

    /// Flush buffered rows. Called once at the end of a run.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
