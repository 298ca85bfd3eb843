//! # Migration Validator CLI (`mval`)
//!
//! ## Usage
//!
//! ```bash
//! mval --config ./config/validator.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mval run` | Validate migrated documents of one environment |
//! | `mval compare <xml> <html>` | Compare two files without a database |
//! | `mval types` | Print the document type registry |
//! | `mval envs` | List environments, optionally checking connectivity |
//!
//! ## Examples
//!
//! ```bash
//! # Everything published in the test environment
//! mval run --env TEST
//!
//! # Two types only
//! mval run --env PROD --types "3, 7"
//!
//! # Investigate one document with a full trace file
//! mval run --env DEV --doc-id 19990101000123 --debug
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use migration_validator::query::RunIntent;
use migration_validator::{compare, config, logging, sources, types_cmd, validate};

/// Migration Validator: checks that migrated documents kept their text.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/validator.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "mval",
    about = "Migration Validator: checks that migrated documents kept their text",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "./config/validator.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate migrated documents against the legacy store.
    ///
    /// Streams legacy documents, looks each one up in the destination
    /// store and writes failing documents to a CSV file under
    /// `<output.dir>/output_<YYYYMMDD>/`.
    Run {
        /// Environment name as configured under `[environments]`.
        #[arg(long, default_value = "DEV")]
        env: String,

        /// Comma-separated type codes, e.g. `3,7`.
        #[arg(long)]
        types: Option<String>,

        /// Validate a single document by id. Overrides `--types`.
        #[arg(long)]
        doc_id: Option<String>,

        /// Write a debug trace file next to the results.
        #[arg(long)]
        debug: bool,
    },

    /// Compare a legacy XML file with a migrated HTML file.
    Compare {
        /// Legacy XML document.
        legacy: PathBuf,

        /// Migrated HTML rendering.
        destination: PathBuf,

        /// Apply the threshold and ignored tags of this document type.
        #[arg(long = "type")]
        type_code: Option<i64>,

        /// Override the loss threshold (0.0 - 1.0).
        #[arg(long)]
        threshold: Option<f64>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the configured document types.
    Types,

    /// List configured environments.
    Envs {
        /// Open a connection to both stores of every environment.
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Compare works without a config file
    if let Commands::Compare {
        legacy,
        destination,
        type_code,
        threshold,
        json,
    } = &cli.command
    {
        logging::init_console()?;
        let cfg = config::load_config(&cli.config);
        compare::run_compare(
            cfg.as_ref(),
            legacy,
            destination,
            *type_code,
            *threshold,
            *json,
        )?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Run {
            env,
            types,
            doc_id,
            debug,
        } => {
            let intent = RunIntent { doc_id, types };
            let plan = validate::plan_run(&cfg, &env, &intent)?;

            let output_dir = validate::dated_output_dir(&cfg.output.dir, chrono::Local::now());
            if let Some(trace) = logging::init_run(debug, &output_dir, intent.doc_id.as_deref())? {
                println!("Debug trace: {}", trace.display());
            }

            let report = validate::run_validation(&cfg, plan, &output_dir).await?;
            println!(
                "Done. Processed: {}. Failures: {}. Skipped: {}",
                report.stats.processed, report.stats.failures, report.stats.skipped
            );
            println!("Results written to: {}", report.output_path.display());
        }
        Commands::Types => {
            types_cmd::list_types(&cfg)?;
        }
        Commands::Envs { check } => {
            logging::init_console()?;
            if !sources::list_environments(&cfg, check).await? {
                anyhow::bail!("connectivity check failed");
            }
        }
        Commands::Compare { .. } => unreachable!(),
    }

    Ok(())
}
