//! Subscriber setup for the `logging` config section.
//!
//! [`GantryRuntime`](crate::GantryRuntime) calls [`init_from_config`] when it
//! is built from a config, so most bots never touch this module. The
//! framework's `dispatch` and `command` spans become visible by enabling
//! `span_events.new` and `span_events.close`:
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "compact"
//!
//! [logging.span_events]
//! new = true
//! close = true
//!
//! [logging.filters]
//! gantry_framework = "debug"
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs a global subscriber from `config`.
///
/// Does nothing if a subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    if let Err(err) = LoggingBuilder::from_config(config).try_init() {
        tracing::debug!(error = %err, "Subscriber already installed, keeping it");
    }
}

fn fmt_span(events: &SpanEventConfig) -> FmtSpan {
    [
        (events.new, FmtSpan::NEW),
        (events.enter, FmtSpan::ENTER),
        (events.exit, FmtSpan::EXIT),
        (events.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// A resolved `logging` section, ready to become the global subscriber.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    span_events: FmtSpan,
    format: LogFormat,
    output: LogOutput,
    thread_ids: bool,
    file_location: bool,
    file_path: Option<PathBuf>,
}

impl LoggingBuilder {
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));

        Self {
            level: config.level.to_tracing_level(),
            directives: filters
                .into_iter()
                .map(|(module, level)| format!("{module}={level}"))
                .collect(),
            span_events: fmt_span(&config.span_events),
            format: config.format,
            output: config.output,
            thread_ids: config.thread_ids,
            file_location: config.file_location,
            file_path: config.file_path.clone(),
        }
    }

    /// Filter directives in install order: the base level, then one per
    /// configured module.
    pub fn directives(&self) -> Vec<String> {
        std::iter::once(self.level.to_string().to_lowercase())
            .chain(self.directives.iter().cloned())
            .collect()
    }

    /// `RUST_LOG` replaces the base level but not the module directives.
    fn filter(&self) -> EnvFilter {
        let base = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string().to_lowercase()));
        self.directives
            .iter()
            .filter_map(|directive| directive.parse::<Directive>().ok())
            .fold(base, EnvFilter::add_directive)
    }

    fn layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(self.span_events.clone())
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_location)
            .with_line_number(self.file_location);

        match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => layer.boxed(),
            LogFormat::Full => layer.boxed(),
        }
    }

    pub fn try_init(self) -> Result<(), TryInitError> {
        let layer = match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => self.layer(std::io::stdout),
            (LogOutput::Stderr, _) => self.layer(std::io::stderr),
            (LogOutput::File, Some(path)) => self.layer(tracing_appender::rolling::never(
                path.parent().unwrap_or_else(|| Path::new(".")),
                path.file_name().unwrap_or_else(|| OsStr::new("gantry.log")),
            )),
            (LogOutput::File, None) => self.layer(std::io::stdout),
        };

        tracing_subscriber::registry()
            .with(layer)
            .with(self.filter())
            .try_init()?;

        if self.output == LogOutput::File && self.file_path.is_none() {
            warn!("File output requested but no file path configured, logging to stdout");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_from_config_collects_directives() {
        let mut config = LoggingConfig {
            level: LogLevel::Warn,
            ..Default::default()
        };
        config
            .filters
            .insert("gantry_framework".into(), LogLevel::Debug);
        config.filters.insert("gantry_core".into(), LogLevel::Trace);

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(
            builder.directives(),
            vec!["warn", "gantry_core=trace", "gantry_framework=debug"]
        );
    }

    #[test]
    fn test_span_events_from_config() {
        let lifecycle = SpanEventConfig {
            new: true,
            close: true,
            ..Default::default()
        };
        assert_eq!(fmt_span(&lifecycle), FmtSpan::NEW | FmtSpan::CLOSE);
        assert_eq!(fmt_span(&SpanEventConfig::default()), FmtSpan::NONE);
    }

    #[test]
    fn test_second_init_is_rejected_quietly() {
        let config = LoggingConfig {
            output: LogOutput::Stderr,
            ..Default::default()
        };
        let _ = LoggingBuilder::from_config(&config).try_init();
        assert!(LoggingBuilder::from_config(&config).try_init().is_err());
        init_from_config(&LoggingConfig::default());
    }
}
