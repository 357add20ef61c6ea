use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::LogConfig;
use crate::util::dates;
use crate::Error;

const DIRECTIVES: [&str; 5] = [
    "sqlx=warn",
    "sea_orm=warn",
    "hyper=warn",
    "tower_http=debug",
    "tetris_scores=trace",
];

pub fn init(config: &LogConfig) -> Result<(), Error> {
    let timer = tracing_subscriber::fmt::time::OffsetTime::local_rfc_3339()?;

    let mut env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    for directive in DIRECTIVES {
        if let Ok(parsed) = directive.parse::<Directive>() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    let stdout_layer = default_layer()
        .with_writer(std::io::stdout)
        .with_timer(timer.clone());

    let text_file_layer = match &config.path {
        Some(path) => Some(
            default_layer()
                .pretty()
                .with_writer(Arc::new(open_append(path)?))
                .with_timer(timer.clone())
                .with_ansi(false),
        ),
        None => None,
    };

    let json_file_layer = match &config.json_path {
        Some(path) => Some(
            default_layer()
                .json()
                .with_writer(Arc::new(open_append(path)?))
                .with_timer(timer)
                .with_ansi(false),
        ),
        None => None,
    };

    let seq_layer = config.seq_endpoint.clone().map(|endpoint| SeqLayer { endpoint });

    Registry::default()
        .with(env_filter)
        .with(stdout_layer)
        .with(text_file_layer)
        .with(json_file_layer)
        .with(seq_layer)
        .try_init()?;

    Ok(())
}

fn open_append(path: &Path) -> Result<File, Error> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}

fn default_layer<S>() -> tracing_subscriber::fmt::Layer<S>
where
    S: Subscriber,
{
    tracing_subscriber::fmt::layer()
        .with_level(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
}

/// Ships events to a Seq server in its compact JSON (CLEF) format.
struct SeqLayer {
    endpoint: String,
}

#[derive(Default)]
struct FieldCollector {
    fields: Map<String, Value>,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields
            .insert(field.name().to_string(), json!(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }
}

fn seq_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "Verbose",
        Level::DEBUG => "Debug",
        Level::INFO => "Information",
        Level::WARN => "Warning",
        Level::ERROR => "Error",
    }
}

struct ClefSource<'a> {
    level: &'a Level,
    name: &'a str,
    target: &'a str,
    file: Option<&'a str>,
    line: Option<u32>,
}

fn clef_payload(source: ClefSource<'_>, mut fields: Map<String, Value>) -> Value {
    let message_template = fields
        .remove("message")
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| source.name.to_string());

    let mut payload = Map::new();
    payload.insert("@t".into(), json!(dates::rfc3339_micros(Utc::now())));
    payload.insert("@mt".into(), json!(message_template));
    payload.insert("@l".into(), json!(seq_level(source.level)));
    payload.insert("SourceContext".into(), json!(source.target));
    if let Some(file) = source.file {
        payload.insert("SourceFile".into(), json!(file));
    }
    if let Some(line) = source.line {
        payload.insert("SourceLine".into(), json!(line));
    }
    payload.extend(fields);

    Value::Object(payload)
}

impl<S: Subscriber> Layer<S> for SeqLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let payload = clef_payload(
            ClefSource {
                level: metadata.level(),
                name: metadata.name(),
                target: metadata.target(),
                file: metadata.file(),
                line: metadata.line(),
            },
            collector.fields,
        );

        let endpoint = self.endpoint.clone();
        let body = payload.to_string();

        std::thread::spawn(move || {
            let result = ureq::post(&endpoint)
                .set("Content-Type", "application/vnd.serilog.clef")
                .send_string(&body);
            match result {
                Ok(_) => {}
                Err(ureq::Error::Status(code, response)) => {
                    eprintln!(
                        "Seq rejected log event (HTTP {}): {}",
                        code,
                        response.into_string().unwrap_or_default()
                    );
                }
                Err(e) => eprintln!("Failed to send log to Seq: {}", e),
            }
        });
    }
}
