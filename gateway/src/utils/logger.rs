use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::utils;

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Per-target log levels, e.g. `{"sheets_gateway": "debug", "hyper": "warn"}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>")]
pub struct LoggerTargets {
    directives: Vec<Directive>,
}

impl TryFrom<BTreeMap<String, String>> for LoggerTargets {
    type Error = tracing_subscriber::filter::ParseError;

    fn try_from(targets: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let directives = targets
            .into_iter()
            .map(|(target, level)| format!("{target}={level}").parse())
            .collect::<Result<_, _>>()?;
        Ok(Self { directives })
    }
}

impl LoggerTargets {
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        utils::serde::load_json_from_file(path)
    }

    pub fn build_filter(&self) -> EnvFilter {
        self.directives
            .iter()
            .fold(EnvFilter::default(), |filter, directive| {
                filter.add_directive(directive.clone())
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub outputs: Vec<LoggerOutput>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            outputs: vec![LoggerOutput::Stderr(LoggerStderrOutput::default())],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable on a terminal, JSON otherwise for files.
    #[default]
    Auto,
    Human,
    /// Stackdriver-compatible JSON lines.
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LoggerOutput {
    Stderr(LoggerStderrOutput),
    File(LoggerFileOutput),
}

impl LoggerOutput {
    fn as_layer<S>(&self) -> Result<BoxedLayer<S>>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        match self {
            Self::Stderr(stderr) => Ok(stderr.as_layer()),
            Self::File(file) => file.as_layer(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct LoggerStderrOutput {
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggerStderrOutput {
    fn as_layer<S>(&self) -> BoxedLayer<S>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        match self.format {
            LogFormat::Json => tracing_stackdriver::layer()
                .with_writer(std::io::stderr)
                .boxed(),
            LogFormat::Human | LogFormat::Auto => fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .boxed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerFileOutput {
    pub dir: PathBuf,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "log_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "max_log_files")]
    pub max_files: NonZeroUsize,
}

impl LoggerFileOutput {
    fn as_layer<S>(&self) -> Result<BoxedLayer<S>>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let writer = tracing_appender::rolling::Builder::new()
            .rotation(Rotation::DAILY)
            .filename_prefix(&self.file_prefix)
            .max_log_files(self.max_files.get())
            .build(&self.dir)
            .with_context(|| format!("failed to open log dir {}", self.dir.display()))?;

        Ok(match self.format {
            LogFormat::Human => fmt::layer().with_ansi(false).with_writer(writer).boxed(),
            LogFormat::Json | LogFormat::Auto => {
                tracing_stackdriver::layer().with_writer(writer).boxed()
            }
        })
    }
}

fn log_file_prefix() -> String {
    "sheets-gateway.log".to_owned()
}

fn max_log_files() -> NonZeroUsize {
    NonZeroUsize::new(7).expect("shouldn't happen")
}

/// Initializes the global subscriber.
///
/// Levels come from `logger_targets` when given, otherwise from `RUST_LOG`
/// with `info` as the default. Fails if called twice.
pub fn init_logger(config: &LoggerConfig, logger_targets: Option<&Path>) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;

    static ONCE: Once = Once::new();

    let mut result = None;
    ONCE.call_once(|| {
        result = Some((|| {
            let filter = match logger_targets {
                Some(path) => LoggerTargets::load_from(path)
                    .context("failed to load logger targets")?
                    .build_filter(),
                None => EnvFilter::builder()
                    .with_default_directive(tracing::Level::INFO.into())
                    .from_env_lossy(),
            };

            let outputs = config
                .outputs
                .iter()
                .map(LoggerOutput::as_layer)
                .collect::<Result<Vec<_>>>()?;

            let subscriber = tracing_subscriber::registry().with(filter).with(outputs);
            tracing::subscriber::set_global_default(subscriber)?;
            Ok::<_, anyhow::Error>(())
        })());
    });

    match result {
        Some(res) => res,
        None => anyhow::bail!("logger was already initialized"),
    }
}

/// Routes panics through `tracing` and exits the process.
pub fn set_abort_with_tracing() {
    std::panic::set_hook(Box::new(|info| {
        use std::io::Write;

        let backtrace = std::backtrace::Backtrace::force_capture();
        tracing::error!("panic: {info}\n{backtrace}");

        std::io::stderr().flush().ok();
        std::io::stdout().flush().ok();

        #[allow(clippy::exit)]
        std::process::exit(1);
    }));
}
