//! # Logging
//!
//! Installs the process-wide `tracing` subscriber for a player host:
//! an `EnvFilter`, one formatted output on stdout (pretty, compact or JSON)
//! and, optionally, a [`HostLogLayer`] that mirrors every surviving event
//! into a host [`LoggerSink`].
//!
//! Asset locators routinely carry signed query strings, credentials or the
//! user's home directory. [`redact_locator`] strips those; the host layer
//! applies it to locator-like fields on its own, and call sites that log a
//! locator through the regular output redact it explicitly.
//!
//! ```ignore
//! use bridge_traits::{LogLevel, StderrLogger};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use std::sync::Arc;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_host_sink(Arc::new(StderrLogger::new(LogLevel::Warn))),
//! )?;
//! ```

use crate::error::{Error, Result};

use bridge_traits::logger::{LogEntry, LogLevel, LoggerSink};

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Crates whose events pass at the configured level by default.
const WORKSPACE_TARGETS: &[&str] = &[
    "video_player_workspace",
    "bridge_traits",
    "core_runtime",
    "core_playback",
];

/// Field names the host layer treats as asset locators.
const LOCATOR_FIELDS: &[&str] = &["asset", "locator", "url", "path"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored; for development.
    Pretty,
    /// One line per event.
    Compact,
    /// One JSON object per line with the event fields flattened.
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level for the workspace crates. Everything else logs at `warn`.
    pub level: LogLevel,
    /// Raw `EnvFilter` directives. Replaces the level-based default.
    pub directives: Option<String>,
    pub host_sink: Option<Arc<dyn LoggerSink>>,
    /// Log span creation and close (pretty/compact), or attach the current
    /// span to each record (JSON).
    pub span_events: bool,
    pub show_target: bool,
    pub show_threads: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            directives: None,
            host_sink: None,
            span_events: false,
            show_target: true,
            show_threads: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("directives", &self.directives)
            .field("host_sink", &self.host_sink.is_some())
            .field("span_events", &self.span_events)
            .field("show_target", &self.show_target)
            .field("show_threads", &self.show_threads)
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Use explicit filter directives, e.g. `"warn,core_playback=trace"`.
    pub fn with_directives(mut self, directives: impl Into<String>) -> Self {
        self.directives = Some(directives.into());
        self
    }

    pub fn with_host_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.host_sink = Some(sink);
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_target(mut self, shown: bool) -> Self {
        self.show_target = shown;
        self
    }

    pub fn with_threads(mut self, shown: bool) -> Self {
        self.show_threads = shown;
        self
    }

    /// The directive string the filter will be built from.
    pub fn filter_directives(&self) -> String {
        if let Some(directives) = &self.directives {
            return directives.clone();
        }
        WORKSPACE_TARGETS
            .iter()
            .fold(String::from("warn"), |mut acc, target| {
                acc.push(',');
                acc.push_str(target);
                acc.push('=');
                acc.push_str(self.level.as_str());
                acc
            })
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// [`Error::Config`] if the directives do not parse or a global subscriber
/// is already set.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let host = config.host_sink.clone().map(HostLogLayer::new);

    tracing_subscriber::registry()
        .with(filter)
        .with(output_layer(&config))
        .with(host)
        .try_init()
        .map_err(|e| Error::Config(format!("Cannot install log subscriber: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = config.filter_directives();
    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("Invalid log directives '{}': {}", directives, e)))
}

fn output_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let spans = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(config.show_target)
        .with_thread_ids(config.show_threads)
        .with_thread_names(config.show_threads);

    match config.format {
        LogFormat::Pretty => layer.pretty().with_span_events(spans).boxed(),
        LogFormat::Compact => layer.compact().with_span_events(spans).boxed(),
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(config.span_events)
            .with_span_list(false)
            .boxed(),
    }
}

/// Mirrors events into a host [`LoggerSink`].
///
/// Inside a tokio runtime each record is delivered from a spawned task;
/// elsewhere the sink is driven to completion on the emitting thread.
/// Sink failures go to stderr since there is nowhere else to report them.
pub struct HostLogLayer {
    sink: Arc<dyn LoggerSink>,
}

impl HostLogLayer {
    pub fn new(sink: Arc<dyn LoggerSink>) -> Self {
        Self { sink }
    }

    fn deliver(&self, entry: LogEntry) {
        let sink = Arc::clone(&self.sink);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(err) = sink.log(entry).await {
                        eprintln!("host log sink failed: {}", err);
                    }
                });
            }
            Err(_) => {
                if let Err(err) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("host log sink failed: {}", err);
                }
            }
        }
    }
}

impl<S> Layer<S> for HostLogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = host_level(metadata.level());
        if !self.sink.accepts(level) {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_owned());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        entry.fields = fields.values;
        entry.span = ctx.event_span(event).map(|span| span.name().to_owned());

        self.deliver(entry);
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: BTreeMap<String, String>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name if LOCATOR_FIELDS.contains(&name) => {
                self.values.insert(name.to_owned(), redact_locator(&value));
            }
            name => {
                self.values.insert(name.to_owned(), value);
            }
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_owned());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{:?}", value));
    }
}

fn host_level(level: &tracing::Level) -> LogLevel {
    match *level {
        tracing::Level::ERROR => LogLevel::Error,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::TRACE => LogLevel::Trace,
    }
}

/// Remove secrets from an asset locator before it reaches a log.
///
/// URL user-info and query strings are replaced with `[REDACTED]`; anything
/// without a scheme is treated as a file path and reduced to its file name.
/// Applying it twice gives the same result.
///
/// ```
/// use core_runtime::logging::redact_locator;
///
/// assert_eq!(
///     redact_locator("https://user:pw@cdn.example.com/v/clip.m3u8?token=abc"),
///     "https://[REDACTED]@cdn.example.com/v/clip.m3u8?[REDACTED]"
/// );
/// assert_eq!(redact_locator("/Users/jane/Movies/trip.mov"), "trip.mov");
/// ```
pub fn redact_locator(locator: &str) -> String {
    let Some(scheme_end) = locator.find("://").map(|i| i + 3) else {
        return file_name(locator).to_owned();
    };

    let (scheme, rest) = locator.split_at(scheme_end);
    let (rest, query) = match rest.split_once('?') {
        Some((before, _)) => (before, "?[REDACTED]"),
        None => (rest, ""),
    };
    let (authority, path) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
    let host = match authority.rsplit_once('@') {
        Some((_, host)) => format!("[REDACTED]@{}", host),
        None => authority.to_owned(),
    };

    format!("{}{}{}{}", scheme, host, path, query)
}

/// Last component of a `/` or `\` separated path.
///
/// ```
/// use core_runtime::logging::file_name;
///
/// assert_eq!(file_name("C:\\Videos\\clip.mp4"), "clip.mp4");
/// assert_eq!(file_name("clip.mp4"), "clip.mp4");
/// ```
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
