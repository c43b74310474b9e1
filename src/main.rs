use std::error::Error as _;
use std::process::ExitCode;

use tracing::error;

use applink_bulk::config::AppConfig;
use applink_bulk::observability::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("applink-bulk: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(config.log_format);

    if let Err(e) = applink_bulk::run(config).await {
        match e.source() {
            Some(cause) => error!("Startup failed: {}: {}", e, cause),
            None => error!("Startup failed: {}", e),
        }
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
