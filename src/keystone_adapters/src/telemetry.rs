//! Process-wide `tracing` subscriber.
//!
//! Request enrichment does not happen here: [`RequestContext::span`] opens a
//! span carrying whichever of `correlation_id`, `ip_address` and
//! `session_token` are bound, and both layers below print the fields of the
//! spans an event was emitted in.
//!
//! [`RequestContext::span`]: keystone_core::RequestContext::span

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use color_eyre::eyre::{Result, WrapErr};
use serde_json::{Map, Value};
use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{
        FmtContext, FormatEvent, FormatFields, FormattedFields, MakeWriter,
        format::{JsonFields, Writer},
        time::ChronoUtc,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::config::{Environment, LoggingSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable console output.
    Development,
    /// One JSON object per line, for a log forwarder.
    Production,
}

impl From<Environment> for LogFormat {
    fn from(environment: Environment) -> Self {
        match environment {
            Environment::Local => LogFormat::Development,
            Environment::Production => LogFormat::Production,
        }
    }
}

/// One JSON object per event: numeric epoch `timestamp`, `level`, `target`,
/// the event's own fields, the innermost span as `span` and the whole scope
/// root-first as `spans`.
///
/// Span fields are taken from the [`JsonFields`] output the layer stores on
/// each span, so later `Span::record` calls are included.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochJson;

impl<S, N> FormatEvent<S, N> for EpochJson
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'w> FormatFields<'w> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let mut record = Map::new();
        record.insert("timestamp".to_owned(), Value::from(epoch_seconds()));
        record.insert("level".to_owned(), Value::from(metadata.level().as_str()));
        record.insert("target".to_owned(), Value::from(metadata.target()));
        event.record(&mut JsonVisitor(&mut record));

        if let Some(scope) = ctx.event_scope() {
            let spans: Vec<Value> = scope
                .from_root()
                .map(|span| {
                    let extensions = span.extensions();
                    let mut fields = extensions
                        .get::<FormattedFields<N>>()
                        .and_then(|formatted| {
                            serde_json::from_str::<Map<String, Value>>(&formatted.fields).ok()
                        })
                        .unwrap_or_default();
                    fields.insert("name".to_owned(), Value::from(span.name()));
                    Value::Object(fields)
                })
                .collect();
            if let Some(current) = spans.last() {
                record.insert("span".to_owned(), current.clone());
            }
            record.insert("spans".to_owned(), Value::Array(spans));
        }

        let line = serde_json::to_string(&record).map_err(|_| fmt::Error)?;
        writeln!(writer, "{line}")
    }
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

struct JsonVisitor<'a>(&'a mut Map<String, Value>);

impl Visit for JsonVisitor<'_> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_owned(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .insert(field.name().to_owned(), Value::from(format!("{value:?}")));
    }
}

pub fn development_layer<S, W>(writer: W, ansi: bool) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_timer(ChronoUtc::rfc_3339())
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_ansi(ansi)
        .with_writer(writer)
}

pub fn production_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .fmt_fields(JsonFields::new())
        .event_format(EpochJson)
        .with_writer(writer)
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
/// Fails if a global subscriber is already set.
pub fn init_tracing(format: LogFormat, settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .wrap_err_with(|| format!("Invalid log level {:?}", settings.level))?;

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    match format {
        LogFormat::Development => registry
            .with(development_layer(std::io::stdout, true))
            .try_init(),
        LogFormat::Production => registry.with(production_layer(std::io::stdout)).try_init(),
    }
    .wrap_err("Failed to install tracing subscriber")?;

    tracing::debug!(?format, "Tracing initialised");
    Ok(())
}
