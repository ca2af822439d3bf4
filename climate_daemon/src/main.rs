mod config;
mod loggly;
mod logging;
mod supervisor;

use clap::Parser;
use config::Config;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(e) => {
            // --help and --version land here too
            let code = if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let logs = match logging::init(config.log_json, config.loggly().as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialise logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        sensor = %config.kind,
        pin = config.pin,
        location = %config.location_id,
        "Starting climate daemon"
    );

    let code = match supervisor::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = format!("{:#}", e), "Terminating");
            ExitCode::FAILURE
        }
    };

    logs.flush().await;
    code
}
