//! ---
//! spc_section: "03-logging"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Tracing bootstrap for the controller daemon."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::io::Write;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

pub const LOG_ENV: &str = "SPC_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

/// Writer guards; dropping them would lose buffered lines.
struct LogGuards {
    _file: WorkerGuard,
    _stdout: WorkerGuard,
}

static GUARDS: OnceCell<LogGuards> = OnceCell::new();

/// Available log formats for the daemon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Pick the filter directive: `SPC_LOG`, then `RUST_LOG`, then `info`.
/// Blank values are skipped.
fn resolve_directive(spc_log: Option<String>, rust_log: Option<String>) -> String {
    [spc_log, rust_log]
        .into_iter()
        .flatten()
        .find(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_owned())
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|err| {
        let _ = writeln!(
            std::io::stderr(),
            "invalid log directive '{directive}' ({err}); using {DEFAULT_DIRECTIVE}"
        );
        EnvFilter::new(DEFAULT_DIRECTIVE)
    })
}

fn stdout_layer<S>(format: LogFormat, writer: NonBlocking) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer().with_timer(fmt::time::UtcTime::rfc_3339());
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().with_writer(writer).boxed(),
        LogFormat::Pretty => layer.with_target(true).with_writer(writer).boxed(),
    }
}

/// Install the global subscriber: stdout in the configured format plus a
/// daily rolling JSON file named after `service_name` (or `file_prefix`).
///
/// Calling it again is harmless; the first subscriber stays installed.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "unable to create log directory {}",
            config.directory.display()
        )
    })?;
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(daily(&config.directory, format!("{prefix}.log")));
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let _ = GUARDS.set(LogGuards {
        _file: file_guard,
        _stdout: stdout_guard,
    });

    let directive = resolve_directive(
        std::env::var(LOG_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );
    let file_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer);

    let installed = tracing_subscriber::registry()
        .with(build_filter(&directive))
        .with(stdout_layer(config.format, stdout_writer))
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        info!(service = %service_name, log_dir = %config.directory.display(), format = ?config.format, %directive, "tracing initialised");
    }
    Ok(())
}
