//! # Migration Validator
//!
//! Checks that documents migrated from a legacy XML store into an HTML
//! publishing store kept their text. Each legacy document is reduced to a
//! set of normalized word tokens and compared with the tokens of its
//! migrated rendering; documents that lost too much vocabulary, went
//! missing, or could not be parsed end up in a CSV report.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────┐   ┌─────────────┐
//! │ Legacy store │──▶│     Orchestrator     │──▶│  CSV report │
//! │   (cursor)   │   │ resolve → diff → log │   │  (UTF-8 BOM)│
//! └──────────────┘   └──────────┬───────────┘   └─────────────┘
//!                               │ point lookups
//!                               ▼
//!                      ┌──────────────────┐
//!                      │ Destination store│
//!                      └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mval run --env DEV                  # every published document
//! mval run --env DEV --types 3,7      # only two document types
//! mval run --env DEV --doc-id ABC123 --debug
//! mval compare legacy.xml page.html --type 6
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`registry`] | Document type registry |
//! | [`normalize`] | Text → token set |
//! | [`extract`] | XML / HTML text extraction |
//! | [`diff`] | Loss ratio and verdict |
//! | [`query`] | Run intent → selection query |
//! | [`traits`] | Source, lookup and sink seams |
//! | [`cursor`] | Streaming SQL document source |
//! | [`resolver`] | SQL destination lookup |
//! | [`memory`] | In-memory source, lookup and sink |
//! | [`sink`] | CSV result file |
//! | [`progress`] | Per-type progress counters |
//! | [`validate`] | Run orchestration |
//! | [`compare`] | Offline file comparison |
//! | [`db`] | Database connections |

pub mod compare;
pub mod config;
pub mod cursor;
pub mod db;
pub mod diff;
pub mod error;
pub mod extract;
pub mod logging;
pub mod memory;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod sink;
pub mod sources;
pub mod traits;
pub mod types_cmd;
pub mod validate;
