use crate::config::LogglySettings;
use crate::loggly::{self, LogglyShipper};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "climate_daemon=info,climate_core=info";
const FLUSH_DEADLINE: Duration = Duration::from_secs(3);

/// Keeps the log shipper alive; flush it before exiting
pub struct LogGuard {
    loggly: Option<LogglyShipper>,
}

impl LogGuard {
    pub async fn flush(self) {
        let Some(shipper) = self.loggly else {
            return;
        };
        match shipper.flush(FLUSH_DEADLINE).await {
            Some(0) => {}
            Some(failed) => eprintln!("{} log records could not be delivered to loggly", failed),
            None => eprintln!("Log shipping did not finish within {:?}", FLUSH_DEADLINE),
        }
    }
}

/// Install the global subscriber: stdout (plain or JSON) plus loggly when configured
pub fn init(json: bool, loggly: Option<&LogglySettings>) -> anyhow::Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (loggly_layer, shipper) = match loggly {
        Some(settings) => {
            let endpoint = loggly::endpoint(&settings.subdomain, &settings.token)?;
            let (layer, shipper) = loggly::spawn(endpoint)?;
            (Some(layer), Some(shipper))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .with(loggly_layer)
        .try_init()?;

    if let Some(settings) = loggly {
        tracing::info!(subdomain = %settings.subdomain, "Shipping logs to loggly");
    }

    Ok(LogGuard { loggly: shipper })
}
