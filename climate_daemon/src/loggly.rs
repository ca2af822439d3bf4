//! Ships log events to loggly.com as bunyan-style JSON records.
//!
//! Events are serialised on the calling thread and handed to a background
//! task over a bounded queue. When the endpoint cannot keep up the queue
//! fills and further records are dropped and counted; a cycle never waits
//! on log delivery.

use reqwest::Url;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

const LOGGLY_HOST: &str = "https://logs-01.loggly.com";
const POST_TIMEOUT: Duration = Duration::from_secs(5);

/// Records waiting for delivery before new ones are dropped
pub const QUEUE_CAPACITY: usize = 1024;

/// Logger name carried by every record
pub const LOGGER_NAME: &str = "damage-report-client-dht";

/// HTTP client internals; shipping them would log the shipper's own requests
const SKIPPED_TARGETS: &[&str] = &["reqwest", "hyper", "h2", "rustls"];

pub fn endpoint(subdomain: &str, token: &str) -> anyhow::Result<Url> {
    let url = Url::parse(&format!("{}/inputs/{}/tag/{}/", LOGGLY_HOST, token, subdomain))?;
    Ok(url)
}

/// Bunyan numeric level
fn bunyan_level(level: &Level) -> u8 {
    match *level {
        Level::TRACE => 10,
        Level::DEBUG => 20,
        Level::INFO => 30,
        Level::WARN => 40,
        Level::ERROR => 50,
    }
}

pub struct LogglyLayer {
    tx: mpsc::Sender<Value>,
    dropped: Arc<AtomicUsize>,
    hostname: String,
    pid: u32,
}

impl LogglyLayer {
    fn new(tx: mpsc::Sender<Value>, dropped: Arc<AtomicUsize>) -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            tx,
            dropped,
            hostname,
            pid: std::process::id(),
        }
    }
}

impl<S: Subscriber> Layer<S> for LogglyLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let target = meta.target();
        if SKIPPED_TARGETS.iter().any(|t| target.starts_with(t)) {
            return;
        }

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        let msg = visitor
            .fields
            .remove("message")
            .map(|m| match m {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_default();

        let mut record = json!({
            "name": LOGGER_NAME,
            "hostname": self.hostname,
            "pid": self.pid,
            "level": bunyan_level(meta.level()),
            "msg": msg,
            "time": chrono::Utc::now().to_rfc3339(),
            "v": 0,
            "target": target,
        });
        if let Value::Object(base) = &mut record {
            for (key, value) in visitor.fields {
                base.entry(key).or_insert(value);
            }
        }

        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // Shipper already flushed
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[derive(Default)]
struct JsonVisitor {
    fields: Map<String, Value>,
}

impl Visit for JsonVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
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

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.fields
            .insert(field.name().to_string(), json!(format!("{:?}", value)));
    }
}

/// Background task that POSTs records, one request per record
pub struct LogglyShipper {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<usize>,
    dropped: Arc<AtomicUsize>,
}

/// Create the layer and spawn its shipper. Must be called inside a runtime.
pub fn spawn(endpoint: Url) -> anyhow::Result<(LogglyLayer, LogglyShipper)> {
    spawn_with_capacity(endpoint, QUEUE_CAPACITY)
}

fn spawn_with_capacity(
    endpoint: Url,
    capacity: usize,
) -> anyhow::Result<(LogglyLayer, LogglyShipper)> {
    let client = reqwest::Client::builder().timeout(POST_TIMEOUT).build()?;
    let (tx, rx) = mpsc::channel(capacity);
    let (stop_tx, stop_rx) = oneshot::channel();
    let dropped = Arc::new(AtomicUsize::new(0));

    let layer = LogglyLayer::new(tx, dropped.clone());
    let task = tokio::spawn(ship(client, endpoint, rx, stop_rx));

    Ok((
        layer,
        LogglyShipper {
            stop: Some(stop_tx),
            task,
            dropped,
        },
    ))
}

async fn ship(
    client: reqwest::Client,
    endpoint: Url,
    mut rx: mpsc::Receiver<Value>,
    mut stop: oneshot::Receiver<()>,
) -> usize {
    let mut failed = 0;

    loop {
        tokio::select! {
            biased;
            Some(record) = rx.recv() => {
                if !post(&client, &endpoint, &record).await {
                    failed += 1;
                }
            }
            _ = &mut stop => break,
            else => break,
        }
    }

    // Drain whatever was logged before the stop
    rx.close();
    while let Some(record) = rx.recv().await {
        if !post(&client, &endpoint, &record).await {
            failed += 1;
        }
    }
    failed
}

async fn post(client: &reqwest::Client, endpoint: &Url, record: &Value) -> bool {
    match client.post(endpoint.clone()).json(record).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

impl LogglyShipper {
    /// Records dropped so far because the queue was full
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting new records and deliver the backlog within `deadline`.
    /// Returns how many records were dropped or could not be delivered, if
    /// it finished.
    pub async fn flush(mut self, deadline: Duration) -> Option<usize> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match tokio::time::timeout(deadline, &mut self.task).await {
            Ok(Ok(failed)) => Some(failed + self.dropped()),
            Ok(Err(_)) => None,
            Err(_) => {
                self.task.abort();
                None
            }
        }
    }
}
