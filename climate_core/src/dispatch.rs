//! Report dispatch to the remote API.

use crate::error::{ClimateError, ClimateResult};
use crate::reading::{Command, Location, Reading, Report};
use futures::future::BoxFuture;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

/// Default request timeout for the API client
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers a command envelope. No retries: one attempt per call.
pub trait Transport: Send + Sync {
    fn post_command(&self, command: Command) -> BoxFuture<'static, ClimateResult<()>>;
}

/// Resolve `{api_url}/command`, tolerating a trailing slash on the base URL
pub fn command_endpoint(api_url: &str) -> ClimateResult<Url> {
    let base = api_url.trim().trim_end_matches('/');
    let url = Url::parse(&format!("{}/command", base))
        .map_err(|e| ClimateError::config(format!("invalid API URL '{}': {}", api_url, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClimateError::config(format!(
            "unsupported API URL scheme '{}' in '{}'",
            other, api_url
        ))),
    }
}

/// JSON-over-HTTP transport
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(api_url: &str, timeout: Duration) -> ClimateResult<Self> {
        let endpoint = command_endpoint(api_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClimateError::internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn post_command(&self, command: Command) -> BoxFuture<'static, ClimateResult<()>> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        Box::pin(async move {
            tracing::debug!(
                url = %endpoint,
                body = %serde_json::to_string(&command).unwrap_or_default(),
                "Sending command"
            );

            let response = client
                .post(endpoint)
                .json(&command)
                .send()
                .await
                .map_err(ClimateError::send)?;

            response.error_for_status().map_err(ClimateError::send)?;
            Ok(())
        })
    }
}

/// Turns readings into reports for one location and hands them to a transport
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    location: Location,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, location: Location) -> Self {
        Self {
            transport,
            location,
        }
    }

    /// Build the report for `reading` and send it once
    pub async fn dispatch(&self, reading: &Reading) -> ClimateResult<Report> {
        let report = Report::from_reading(reading, &self.location);
        tracing::info!(
            location = %report.location_id,
            temperature = %report.temperature,
            humidity = %report.humidity,
            "Sending report"
        );

        self.transport
            .post_command(Command::update_data(report.clone()))
            .await?;
        Ok(report)
    }
}
