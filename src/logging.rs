//! Log output setup.
//!
//! The console gets `info` and above, or `debug` and above with `--debug`.
//! `RUST_LOG` overrides either. With `--debug`, every event down to `debug`
//! is also written to a trace file next to the run's results:
//! `trace_<doc id>_<HHMMSS>.log`, or `trace_<HHMMSS>.log` for batch runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// File name for a debug trace.
pub fn trace_file_name(doc_id: Option<&str>, now: DateTime<Local>) -> String {
    let time = now.format("%H%M%S");
    match doc_id {
        Some(id) => {
            let label: String = id
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
                .collect();
            format!("trace_{}_{}.log", label, time)
        }
        None => format!("trace_{}.log", time),
    }
}

// statement logging from the driver drowns out the document trace
const DEBUG_DIRECTIVES: &str = "debug,sqlx=warn";

/// Console directives used when `RUST_LOG` is not set.
pub fn console_directives(debug: bool) -> &'static str {
    if debug {
        DEBUG_DIRECTIVES
    } else {
        "info"
    }
}

fn console_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_directives(debug)))
}

/// Console-only logging, for the commands that do not run a validation.
pub fn init_console() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_filter(console_filter(false)),
        )
        .try_init()
        .context("failed to install log subscriber")?;
    Ok(())
}

/// Logging for a validation run. Returns the trace file path when `debug`
/// is set. Call it only once the run's configuration has been checked, since
/// the trace file is created here.
pub fn init_run(debug: bool, trace_dir: &Path, doc_id: Option<&str>) -> Result<Option<PathBuf>> {
    if !debug {
        init_console()?;
        return Ok(None);
    }

    std::fs::create_dir_all(trace_dir)
        .with_context(|| format!("failed to create {}", trace_dir.display()))?;
    let name = trace_file_name(doc_id, Local::now());
    let appender = tracing_appender::rolling::never(trace_dir, &name);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_filter(console_filter(true)),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(appender)
                .with_filter(EnvFilter::new(DEBUG_DIRECTIVES)),
        )
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(Some(trace_dir.join(name)))
}
